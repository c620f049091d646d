//! Multi-loan payoff planning: snowball and avalanche.
//!
//! Both methods share one cascading mechanism. The monthly budget is the sum
//! of every open loan's minimum installment plus an optional extra amount.
//! Each month all minimums are paid first, then whatever is left in the pool
//! (the extra budget plus installments freed by loans already cleared) goes
//! to the highest-priority open loan, spilling over to the next one when it
//! clears. The methods differ only in how loans are prioritised.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Instant;

use crate::error::LoanEngineError;
use crate::loan::model::{Loan, LoanStatus};
use crate::types::*;
use crate::LoanEngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoffMethod {
    /// Smallest remaining balance first.
    Snowball,
    /// Highest interest rate first.
    Avalanche,
}

impl std::fmt::Display for PayoffMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snowball => write!(f, "snowball"),
            Self::Avalanche => write!(f, "avalanche"),
        }
    }
}

/// Which loan statuses take part in a plan. Closed loans never do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InclusionPolicy {
    ActiveOnly,
    #[default]
    ActiveAndOverdue,
}

impl InclusionPolicy {
    fn admits(self, status: LoanStatus) -> bool {
        match (self, status) {
            (_, LoanStatus::Closed) => false,
            (Self::ActiveOnly, LoanStatus::Overdue) => false,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInput {
    pub loans: Vec<Loan>,
    /// Amount available each month on top of the minimum installments.
    #[serde(default)]
    pub extra_budget: Money,
    #[serde(default)]
    pub inclusion: InclusionPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanPayment {
    pub loan_id: String,
    pub payment_amount: Money,
}

/// Payments made in one month, in priority order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAllocation {
    pub month: u32,
    pub payments: Vec<LoanPayment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanPayoff {
    pub loan_id: String,
    pub payoff_month: u32,
    pub interest_paid: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPlan {
    pub method: PayoffMethod,
    /// Loan ids from first to last targeted.
    pub payoff_order: Vec<String>,
    pub monthly_budget: Money,
    pub schedule: Vec<MonthlyAllocation>,
    pub total_interest: Money,
    /// Interest still due if every loan simply follows its own schedule.
    pub baseline_total_interest: Money,
    pub total_interest_saved: Money,
    /// Months until the last loan clears.
    pub time_to_payoff: u32,
    pub baseline_time_to_payoff: u32,
    pub loan_payoffs: Vec<LoanPayoff>,
}

impl StrategyPlan {
    fn empty(method: PayoffMethod) -> Self {
        StrategyPlan {
            method,
            payoff_order: Vec::new(),
            monthly_budget: Decimal::ZERO,
            schedule: Vec::new(),
            total_interest: Decimal::ZERO,
            baseline_total_interest: Decimal::ZERO,
            total_interest_saved: Decimal::ZERO,
            time_to_payoff: 0,
            baseline_time_to_payoff: 0,
            loan_payoffs: Vec::new(),
        }
    }
}

impl RoundCurrency for StrategyPlan {
    fn rounded(&self) -> Self {
        StrategyPlan {
            monthly_budget: round_currency(self.monthly_budget),
            schedule: self
                .schedule
                .iter()
                .map(|m| MonthlyAllocation {
                    month: m.month,
                    payments: m
                        .payments
                        .iter()
                        .map(|p| LoanPayment {
                            loan_id: p.loan_id.clone(),
                            payment_amount: round_currency(p.payment_amount),
                        })
                        .collect(),
                })
                .collect(),
            total_interest: round_currency(self.total_interest),
            baseline_total_interest: round_currency(self.baseline_total_interest),
            total_interest_saved: round_currency(self.total_interest_saved),
            loan_payoffs: self
                .loan_payoffs
                .iter()
                .map(|p| LoanPayoff {
                    interest_paid: round_currency(p.interest_paid),
                    ..p.clone()
                })
                .collect(),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build a snowball and an avalanche plan for the admitted loans.
pub fn optimize_strategies(
    input: &StrategyInput,
) -> LoanEngineResult<ComputationOutput<Vec<StrategyPlan>>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let (included, excluded): (Vec<&Loan>, Vec<&Loan>) = input
        .loans
        .iter()
        .partition(|l| input.inclusion.admits(l.status()));
    for loan in &excluded {
        warnings.push(format!(
            "Loan {} excluded from payoff planning (status {})",
            loan.id(),
            loan.status()
        ));
    }

    let plans = [PayoffMethod::Snowball, PayoffMethod::Avalanche]
        .into_iter()
        .map(|method| plan_for(&included, input.extra_budget, method))
        .collect::<LoanEngineResult<Vec<_>>>()?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Cascading debt payoff (snowball / avalanche)",
        &serde_json::json!({
            "extra_budget": input.extra_budget.to_string(),
            "inclusion": input.inclusion,
            "loans_planned": included.len(),
            "allocation": "minimums first, remaining pool to highest-priority open loan",
        }),
        warnings,
        elapsed,
        plans,
    ))
}

/// Plan a single method over the given loans. Closed loans are skipped;
/// whether overdue loans take part is the caller's decision.
pub fn plan_payoff(
    loans: &[Loan],
    extra_budget: Money,
    method: PayoffMethod,
) -> LoanEngineResult<StrategyPlan> {
    let refs: Vec<&Loan> = loans.iter().filter(|l| !l.is_closed()).collect();
    plan_for(&refs, extra_budget, method)
}

/// Priority ordering for `method`, with deterministic tie-breaks.
pub fn priority(method: PayoffMethod, a: &Loan, b: &Loan) -> Ordering {
    let by_rate_desc = b.annual_rate_pct().cmp(&a.annual_rate_pct());
    let by_balance_asc = a.remaining_amount().cmp(&b.remaining_amount());
    let primary = match method {
        PayoffMethod::Avalanche => by_rate_desc.then(by_balance_asc),
        PayoffMethod::Snowball => by_balance_asc.then(by_rate_desc),
    };
    primary.then_with(|| a.id().cmp(b.id()))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

struct Position<'a> {
    loan: &'a Loan,
    balance: Money,
    rate: Rate,
    months_left: u32,
    interest_paid: Money,
    payoff_month: Option<u32>,
}

impl Position<'_> {
    fn is_open(&self) -> bool {
        self.balance > Decimal::ZERO
    }
}

fn plan_for(
    loans: &[&Loan],
    extra_budget: Money,
    method: PayoffMethod,
) -> LoanEngineResult<StrategyPlan> {
    if extra_budget < Decimal::ZERO {
        return Err(LoanEngineError::scenario(
            "extra_budget",
            format!("Extra monthly budget cannot be negative, got {extra_budget}"),
        ));
    }
    if loans.is_empty() {
        return Ok(StrategyPlan::empty(method));
    }

    let mut ordered: Vec<&Loan> = loans.to_vec();
    ordered.sort_by(|a, b| priority(method, a, b));

    let mut positions: Vec<Position> = ordered
        .iter()
        .map(|&loan| Position {
            loan,
            balance: loan.remaining_amount(),
            rate: loan.monthly_rate(),
            months_left: loan.remaining_installments(),
            interest_paid: Decimal::ZERO,
            payoff_month: None,
        })
        .collect();

    let monthly_budget = checked_sum(
        ordered
            .iter()
            .map(|l| l.monthly_installment())
            .chain(std::iter::once(extra_budget)),
        "monthly_budget",
    )?;
    let baseline_total_interest = checked_sum(
        ordered.iter().map(|l| l.interest_remaining()),
        "baseline_total_interest",
    )?;
    let horizon = ordered
        .iter()
        .map(|l| l.remaining_installments())
        .max()
        .unwrap_or(0);

    let mut schedule = Vec::new();
    for month in 1..=horizon {
        if !positions.iter().any(Position::is_open) {
            break;
        }

        let mut paid = vec![Decimal::ZERO; positions.len()];
        let mut pool = monthly_budget;

        for pos in positions.iter_mut().filter(|p| p.is_open()) {
            let interest = pos.balance * pos.rate;
            pos.balance += interest;
            pos.interest_paid += interest;
        }

        // Minimum installments. A loan's final scheduled month repays the
        // whole balance, as the schedule builder does.
        for (idx, pos) in positions.iter_mut().enumerate().filter(|(_, p)| p.is_open()) {
            let due = if pos.months_left <= 1 {
                pos.balance
            } else {
                pos.loan.monthly_installment().min(pos.balance)
            };
            pos.balance -= due;
            pos.months_left = pos.months_left.saturating_sub(1);
            pool -= due;
            paid[idx] += due;
        }

        // Cascade the remaining pool in priority order.
        for (idx, pos) in positions.iter_mut().enumerate().filter(|(_, p)| p.is_open()) {
            if pool <= Decimal::ZERO {
                break;
            }
            let extra = pool.min(pos.balance);
            pos.balance -= extra;
            pool -= extra;
            paid[idx] += extra;
        }

        for pos in positions.iter_mut() {
            if pos.payoff_month.is_none() && !pos.is_open() {
                pos.payoff_month = Some(month);
            }
        }

        let payments = positions
            .iter()
            .zip(&paid)
            .filter(|(_, amount)| **amount > Decimal::ZERO)
            .map(|(pos, amount)| LoanPayment {
                loan_id: pos.loan.id().to_string(),
                payment_amount: *amount,
            })
            .collect();
        schedule.push(MonthlyAllocation { month, payments });
    }

    let total_interest = checked_sum(positions.iter().map(|p| p.interest_paid), "total_interest")?;
    let time_to_payoff = schedule.len() as u32;

    log::debug!(
        "{} plan over {} loans: payoff in {} months, interest {} vs baseline {}",
        method,
        positions.len(),
        time_to_payoff,
        total_interest,
        baseline_total_interest
    );

    Ok(StrategyPlan {
        method,
        payoff_order: ordered.iter().map(|l| l.id().to_string()).collect(),
        monthly_budget,
        schedule,
        total_interest,
        baseline_total_interest,
        total_interest_saved: baseline_total_interest - total_interest,
        time_to_payoff,
        baseline_time_to_payoff: horizon,
        loan_payoffs: positions
            .iter()
            .map(|p| LoanPayoff {
                loan_id: p.loan.id().to_string(),
                payoff_month: p.payoff_month.unwrap_or(time_to_payoff),
                interest_paid: p.interest_paid,
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::model::LoanInput;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn loan(id: &str, principal: Money, rate: Percent, tenure: u32) -> Loan {
        Loan::new(LoanInput::new(
            id,
            principal,
            rate,
            tenure,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        ))
        .unwrap()
    }

    fn payment_to(alloc: &MonthlyAllocation, id: &str) -> Money {
        alloc
            .payments
            .iter()
            .find(|p| p.loan_id == id)
            .map(|p| p.payment_amount)
            .unwrap_or(Decimal::ZERO)
    }

    #[test]
    fn test_avalanche_orders_by_rate() {
        let loans = vec![
            loan("low", dec!(10000), dec!(6), 24),
            loan("high", dec!(20000), dec!(18), 24),
            loan("mid", dec!(5000), dec!(12), 24),
        ];
        let plan = plan_payoff(&loans, dec!(500), PayoffMethod::Avalanche).unwrap();
        assert_eq!(plan.payoff_order, vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_snowball_orders_by_balance() {
        let loans = vec![
            loan("big", dec!(90000), dec!(6), 60),
            loan("small", dec!(3000), dec!(4), 12),
            loan("medium", dec!(15000), dec!(20), 36),
        ];
        let plan = plan_payoff(&loans, dec!(500), PayoffMethod::Snowball).unwrap();
        assert_eq!(plan.payoff_order, vec!["small", "medium", "big"]);
    }

    #[test]
    fn test_tie_breaks() {
        let loans = vec![
            loan("b", dec!(8000), dec!(10), 24),
            loan("a", dec!(5000), dec!(10), 24),
        ];
        // equal rates: smaller balance first
        let av = plan_payoff(&loans, Decimal::ZERO, PayoffMethod::Avalanche).unwrap();
        assert_eq!(av.payoff_order, vec!["a", "b"]);

        let same_balance = vec![
            loan("x", dec!(5000), dec!(8), 24),
            loan("y", dec!(5000), dec!(14), 24),
        ];
        // equal balances: higher rate first
        let sb = plan_payoff(&same_balance, Decimal::ZERO, PayoffMethod::Snowball).unwrap();
        assert_eq!(sb.payoff_order, vec!["y", "x"]);
    }

    #[test]
    fn test_avalanche_directs_all_extra_to_highest_rate() {
        let loans = vec![
            loan("card", dec!(50000), dec!(18), 60),
            loan("auto", dec!(100000), dec!(12), 60),
        ];
        let extra = dec!(3000);
        let plan = plan_payoff(&loans, extra, PayoffMethod::Avalanche).unwrap();
        let card_payoff = plan
            .loan_payoffs
            .iter()
            .find(|p| p.loan_id == "card")
            .unwrap()
            .payoff_month;
        assert!(card_payoff > 1);

        for alloc in plan.schedule.iter().take(card_payoff as usize - 1) {
            assert_eq!(payment_to(alloc, "auto"), loans[1].monthly_installment());
            let to_card = payment_to(alloc, "card");
            assert!((to_card - (loans[0].monthly_installment() + extra)).abs() < dec!(0.0000001));
        }
    }

    #[test]
    fn test_freed_installment_cascades() {
        let loans = vec![
            loan("first", dec!(2000), dec!(10), 12),
            loan("second", dec!(20000), dec!(8), 48),
        ];
        let plan = plan_payoff(&loans, dec!(200), PayoffMethod::Snowball).unwrap();
        let first_payoff = plan.loan_payoffs[0].payoff_month;
        let after = &plan.schedule[first_payoff as usize];
        // whole budget now flows to the second loan
        assert_eq!(after.payments.len(), 1);
        assert_eq!(after.payments[0].loan_id, "second");
        assert!((after.payments[0].payment_amount - plan.monthly_budget).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_extra_budget_saves_interest_and_time() {
        let loans = vec![
            loan("a", dec!(40000), dec!(14), 48),
            loan("b", dec!(60000), dec!(9), 60),
        ];
        let plan = plan_payoff(&loans, dec!(1000), PayoffMethod::Avalanche).unwrap();
        assert!(plan.total_interest_saved > Decimal::ZERO);
        assert!(plan.time_to_payoff < plan.baseline_time_to_payoff);
        assert!(plan.loan_payoffs.iter().all(|p| p.payoff_month <= plan.time_to_payoff));
    }

    #[test]
    fn test_no_extra_matches_baseline() {
        let loans = vec![loan("only", dec!(12000), dec!(10), 24)];
        let plan = plan_payoff(&loans, Decimal::ZERO, PayoffMethod::Avalanche).unwrap();
        assert_eq!(plan.time_to_payoff, 24);
        assert!(plan.total_interest_saved.abs() < dec!(0.000001));
    }

    #[test]
    fn test_zero_loans_gives_empty_plans() {
        let input = StrategyInput {
            loans: Vec::new(),
            extra_budget: dec!(1000),
            inclusion: InclusionPolicy::default(),
        };
        let plans = optimize_strategies(&input).unwrap().result;
        assert_eq!(plans.len(), 2);
        assert!(plans.iter().all(|p| p.schedule.is_empty() && p.time_to_payoff == 0));
    }

    #[test]
    fn test_negative_extra_budget_rejected() {
        let loans = vec![loan("a", dec!(1000), dec!(5), 12)];
        assert!(matches!(
            plan_payoff(&loans, dec!(-1), PayoffMethod::Snowball),
            Err(LoanEngineError::InvalidScenario { .. })
        ));
    }

    #[test]
    fn test_budget_beyond_decimal_range_is_rejected() {
        let loans = vec![loan("a", dec!(1000), dec!(5), 12)];
        assert!(matches!(
            plan_payoff(&loans, Decimal::MAX, PayoffMethod::Avalanche),
            Err(LoanEngineError::InvalidLoanParameters { field, .. }) if field == "monthly_budget"
        ));
    }

    #[test]
    fn test_inclusion_policy() {
        let mut overdue = LoanInput::new(
            "late",
            dec!(5000),
            dec!(15),
            12,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        overdue.status = LoanStatus::Overdue;
        let loans = vec![loan("ok", dec!(5000), dec!(10), 12), Loan::new(overdue).unwrap()];

        let input = StrategyInput {
            loans: loans.clone(),
            extra_budget: dec!(100),
            inclusion: InclusionPolicy::ActiveOnly,
        };
        let out = optimize_strategies(&input).unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert!(out.result.iter().all(|p| p.payoff_order == vec!["ok"]));

        let input = StrategyInput {
            loans,
            extra_budget: dec!(100),
            inclusion: InclusionPolicy::ActiveAndOverdue,
        };
        let out = optimize_strategies(&input).unwrap();
        assert!(out.warnings.is_empty());
        assert!(out.result.iter().all(|p| p.payoff_order.len() == 2));
    }
}
