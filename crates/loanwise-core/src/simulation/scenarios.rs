//! What-if scenarios: accelerated installments, lump-sum prepayment and
//! refinancing.
//!
//! Every scenario starts from the loan's current position. Installments
//! already recorded are carried over from the baseline schedule, the
//! scenario path is amortized from the next unpaid month, and the totals are
//! diffed against the immutable baseline captured when the loan was created.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::amortization::math::{self, emi_for_monthly_rate};
use crate::amortization::schedule::{
    amortize, amortize_until_paid, dated_schedule, Period, Schedule,
};
use crate::error::LoanEngineError;
use crate::loan::model::Loan;
use crate::types::*;
use crate::LoanEngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A what-if request against a single loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScenarioRequest {
    /// Pay a fixed, higher installment from the next unpaid month.
    IncreasedEmi { new_emi: Money },
    /// Inject a one-off payment at the start of `apply_at_month`.
    LumpSum { amount: Money, apply_at_month: u32 },
    /// Re-amortize the outstanding balance at a new annual rate.
    Refinance { new_annual_rate_pct: Percent },
}

impl ScenarioRequest {
    pub fn name(&self) -> String {
        match self {
            Self::IncreasedEmi { new_emi } => {
                format!("Increased EMI to {}", round_currency(*new_emi))
            }
            Self::LumpSum {
                amount,
                apply_at_month,
            } => format!(
                "Lump sum of {} at month {apply_at_month}",
                round_currency(*amount)
            ),
            Self::Refinance {
                new_annual_rate_pct,
            } => format!("Refinance at {new_annual_rate_pct}%"),
        }
    }
}

/// Savings relative to the baseline schedule. Negative values mean the
/// scenario is worse than the baseline and are reported as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Savings {
    pub interest_saved: Money,
    pub time_saved: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub scenario_name: String,
    pub monthly_emi: Money,
    pub total_interest: Money,
    pub total_payable: Money,
    /// Month in which the balance reaches zero.
    pub time_to_payoff: u32,
    pub savings: Savings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lump_sum_applied: Option<Money>,
    /// Portion of a lump sum above the outstanding balance that could not
    /// be applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lump_sum_excess: Option<Money>,
    pub schedule: Schedule,
}

impl RoundCurrency for SimulationResult {
    fn rounded(&self) -> Self {
        SimulationResult {
            scenario_name: self.scenario_name.clone(),
            monthly_emi: round_currency(self.monthly_emi),
            total_interest: round_currency(self.total_interest),
            total_payable: round_currency(self.total_payable),
            time_to_payoff: self.time_to_payoff,
            savings: Savings {
                interest_saved: round_currency(self.savings.interest_saved),
                time_saved: self.savings.time_saved,
            },
            lump_sum_applied: self.lump_sum_applied.map(round_currency),
            lump_sum_excess: self.lump_sum_excess.map(round_currency),
            schedule: self.schedule.rounded(),
        }
    }
}

/// Input for a single scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationInput {
    pub loan: Loan,
    pub scenario: ScenarioRequest,
}

/// Input for running several scenarios against one loan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioComparisonInput {
    pub loan: Loan,
    pub scenarios: Vec<ScenarioRequest>,
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

/// Pay `new_emi` every month until the balance is cleared. The last payment
/// may be smaller than `new_emi`.
pub fn simulate_increased_emi(loan: &Loan, new_emi: Money) -> LoanEngineResult<SimulationResult> {
    ensure_open(loan)?;
    if new_emi <= loan.monthly_installment() {
        return Err(LoanEngineError::scenario(
            "new_emi",
            format!(
                "New EMI {} must exceed the current EMI {}",
                new_emi,
                loan.monthly_installment()
            ),
        ));
    }

    let first_month = loan.paid_installments() + 1;
    let periods = amortize_until_paid(
        loan.remaining_amount(),
        loan.monthly_rate(),
        new_emi,
        first_month,
        loan.remaining_installments(),
    );

    let request = ScenarioRequest::IncreasedEmi { new_emi };
    assemble(loan, request.name(), new_emi, loan.paid_installments(), periods, None)
}

/// Apply a one-off payment at the start of `apply_at_month`, then keep
/// paying the original EMI until the balance is cleared.
///
/// An amount larger than the balance outstanding at that month is clamped;
/// the clamped excess is reported in `lump_sum_excess`.
pub fn simulate_lump_sum(
    loan: &Loan,
    amount: Money,
    apply_at_month: u32,
) -> LoanEngineResult<SimulationResult> {
    ensure_open(loan)?;
    if amount <= Decimal::ZERO {
        return Err(LoanEngineError::scenario(
            "amount",
            format!("Lump sum must be positive, got {amount}"),
        ));
    }
    if apply_at_month == 0 || apply_at_month > loan.tenure_months() {
        return Err(LoanEngineError::scenario(
            "apply_at_month",
            format!(
                "Month {apply_at_month} is outside the loan tenure [1, {}]",
                loan.tenure_months()
            ),
        ));
    }
    if apply_at_month <= loan.paid_installments() {
        return Err(LoanEngineError::scenario(
            "apply_at_month",
            format!(
                "Month {apply_at_month} has already been paid ({} installments recorded)",
                loan.paid_installments()
            ),
        ));
    }

    let opening = loan.balance_after(apply_at_month - 1);
    let applied = amount.min(opening);
    let excess = amount - applied;
    if excess > Decimal::ZERO {
        log::warn!(
            "lump sum {} exceeds balance {} of loan {} at month {}; excess {} not applied",
            amount,
            opening,
            loan.id(),
            apply_at_month,
            excess
        );
    }

    let balance = opening - applied;
    let mut periods = if balance.is_zero() {
        vec![Period {
            month: apply_at_month,
            interest: Decimal::ZERO,
            principal: Decimal::ZERO,
            balance: Decimal::ZERO,
        }]
    } else {
        amortize_until_paid(
            balance,
            loan.monthly_rate(),
            loan.monthly_installment(),
            apply_at_month,
            loan.tenure_months() - apply_at_month + 1,
        )
    };
    // The lump sum is part of the principal repaid in its month.
    if let Some(first) = periods.first_mut() {
        first.principal += applied;
    }

    let request = ScenarioRequest::LumpSum {
        amount,
        apply_at_month,
    };
    let mut result = assemble(
        loan,
        request.name(),
        loan.monthly_installment(),
        apply_at_month - 1,
        periods,
        Some(applied),
    )?;
    if excess > Decimal::ZERO {
        result.lump_sum_excess = Some(excess);
    }
    Ok(result)
}

/// Re-amortize the outstanding balance over the remaining tenure at
/// `new_annual_rate_pct`, with a freshly computed EMI.
pub fn simulate_refinance(
    loan: &Loan,
    new_annual_rate_pct: Percent,
) -> LoanEngineResult<SimulationResult> {
    if new_annual_rate_pct < Decimal::ZERO {
        return Err(LoanEngineError::scenario(
            "new_annual_rate_pct",
            format!("Refinance rate cannot be negative, got {new_annual_rate_pct}"),
        ));
    }
    ensure_open(loan)?;

    let balance = loan.remaining_amount();
    let months = loan.remaining_installments();
    math::validate_terms(balance, new_annual_rate_pct, months)?;
    let r = math::monthly_rate(new_annual_rate_pct);
    let new_emi = emi_for_monthly_rate(balance, r, months)?;

    let offset = loan.paid_installments();
    let periods = amortize(balance, r, new_emi, months)
        .into_iter()
        .map(|p| Period {
            month: p.month + offset,
            ..p
        })
        .collect();

    let request = ScenarioRequest::Refinance {
        new_annual_rate_pct,
    };
    assemble(loan, request.name(), new_emi, offset, periods, None)
}

/// Dispatch a scenario request.
pub fn simulate(loan: &Loan, request: &ScenarioRequest) -> LoanEngineResult<SimulationResult> {
    match request {
        ScenarioRequest::IncreasedEmi { new_emi } => simulate_increased_emi(loan, *new_emi),
        ScenarioRequest::LumpSum {
            amount,
            apply_at_month,
        } => simulate_lump_sum(loan, *amount, *apply_at_month),
        ScenarioRequest::Refinance {
            new_annual_rate_pct,
        } => simulate_refinance(loan, *new_annual_rate_pct),
    }
}

/// Single scenario wrapped in the standard output envelope.
pub fn run_scenario(
    input: &SimulationInput,
) -> LoanEngineResult<ComputationOutput<SimulationResult>> {
    let start = Instant::now();
    let result = simulate(&input.loan, &input.scenario)?;
    let warnings = scenario_warnings(&result);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "What-if simulation against baseline schedule",
        &baseline_assumptions(&input.loan),
        warnings,
        elapsed,
        result,
    ))
}

/// Run every requested scenario and rank them by interest saved, best
/// first. Any invalid scenario fails the whole batch.
pub fn compare_scenarios(
    input: &ScenarioComparisonInput,
) -> LoanEngineResult<ComputationOutput<Vec<SimulationResult>>> {
    let start = Instant::now();

    if input.scenarios.is_empty() {
        return Err(LoanEngineError::scenario(
            "scenarios",
            "At least one scenario is required",
        ));
    }

    let mut results = input
        .scenarios
        .iter()
        .map(|s| simulate(&input.loan, s))
        .collect::<LoanEngineResult<Vec<_>>>()?;
    results.sort_by(|a, b| {
        b.savings
            .interest_saved
            .cmp(&a.savings.interest_saved)
            .then(b.savings.time_saved.cmp(&a.savings.time_saved))
    });

    let warnings = results.iter().flat_map(scenario_warnings).collect();

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "What-if scenario comparison ranked by interest saved",
        &baseline_assumptions(&input.loan),
        warnings,
        elapsed,
        results,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn ensure_open(loan: &Loan) -> LoanEngineResult<()> {
    if loan.is_closed() {
        return Err(LoanEngineError::scenario(
            "loan",
            format!("Loan {} is closed; nothing left to simulate", loan.id()),
        ));
    }
    Ok(())
}

/// Join the first `prefix_months` baseline installments with the scenario
/// path and diff the totals against the baseline.
fn assemble(
    loan: &Loan,
    scenario_name: String,
    monthly_emi: Money,
    prefix_months: u32,
    periods: Vec<Period>,
    lump_sum_applied: Option<Money>,
) -> LoanEngineResult<SimulationResult> {
    let history = loan.schedule();
    let tail = dated_schedule(&periods, loan.start_date())?;

    let items: Vec<_> = history
        .items()
        .iter()
        .take(prefix_months as usize)
        .chain(tail.items())
        .cloned()
        .collect();
    let schedule = Schedule::from_items(items);

    let total_interest = schedule.total_interest();
    let time_to_payoff = schedule.last().map(|i| i.month).unwrap_or(0);
    let savings = Savings {
        interest_saved: loan.total_interest() - total_interest,
        time_saved: i64::from(loan.tenure_months()) - i64::from(time_to_payoff),
    };

    log::debug!(
        "scenario '{}' on loan {}: payoff month {}, interest saved {}",
        scenario_name,
        loan.id(),
        time_to_payoff,
        savings.interest_saved
    );

    Ok(SimulationResult {
        scenario_name,
        monthly_emi,
        total_interest,
        total_payable: loan.principal() + total_interest,
        time_to_payoff,
        savings,
        lump_sum_applied,
        lump_sum_excess: None,
        schedule,
    })
}

fn scenario_warnings(result: &SimulationResult) -> Vec<String> {
    let mut warnings = Vec::new();
    if let Some(excess) = result.lump_sum_excess {
        warnings.push(format!(
            "{}: {} exceeds the outstanding balance and was not applied",
            result.scenario_name,
            round_currency(excess)
        ));
    }
    if result.savings.interest_saved < Decimal::ZERO {
        warnings.push(format!(
            "{}: costs {} more interest than the current schedule",
            result.scenario_name,
            round_currency(-result.savings.interest_saved)
        ));
    }
    warnings
}

fn baseline_assumptions(loan: &Loan) -> serde_json::Value {
    serde_json::json!({
        "loan_id": loan.id(),
        "baseline_emi": loan.monthly_installment().to_string(),
        "baseline_total_interest": loan.total_interest().to_string(),
        "baseline_tenure_months": loan.tenure_months(),
        "paid_installments": loan.paid_installments(),
        "lump_sum_timing": "start of month, before that month's installment",
    })
}
