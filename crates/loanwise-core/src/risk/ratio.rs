use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::LoanEngineError;
use crate::loan::model::Loan;
use crate::types::*;
use crate::LoanEngineResult;

const MEDIUM_RISK_FROM: Percent = dec!(20);
const HIGH_RISK_FROM: Percent = dec!(35);
const CRITICAL_RISK_FROM: Percent = dec!(50);

/// Debt-burden band of an EMI-to-income ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// `<20` low, `[20,35)` medium, `[35,50)` high, `>=50` critical.
    pub fn from_ratio(ratio_pct: Percent) -> Self {
        match ratio_pct {
            r if r < MEDIUM_RISK_FROM => Self::Low,
            r if r < HIGH_RISK_FROM => Self::Medium,
            r if r < CRITICAL_RISK_FROM => Self::High,
            _ => Self::Critical,
        }
    }

    pub fn recommendation(self) -> &'static str {
        match self {
            Self::Low => {
                "Debt load is comfortable. Consider directing surplus income to \
                 prepayments or savings."
            }
            Self::Medium => {
                "Debt load is manageable. Avoid taking on new loans and keep an \
                 emergency buffer of at least three months of EMIs."
            }
            Self::High => {
                "Debt load is heavy. Prioritise paying down high-interest loans and \
                 postpone new borrowing."
            }
            Self::Critical => {
                "Debt load is unsustainable. Consider refinancing or consolidating loans \
                 and review essential expenses immediately."
            }
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanToIncomeInput {
    pub loans: Vec<Loan>,
    pub monthly_income: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanToIncomeReport {
    pub total_monthly_emi: Money,
    pub monthly_income: Money,
    /// EMI burden as a percentage of income.
    pub ratio: Percent,
    pub risk_level: RiskLevel,
    pub recommendation: String,
}

impl RoundCurrency for LoanToIncomeReport {
    fn rounded(&self) -> Self {
        LoanToIncomeReport {
            total_monthly_emi: round_currency(self.total_monthly_emi),
            monthly_income: round_currency(self.monthly_income),
            ratio: round_currency(self.ratio),
            ..self.clone()
        }
    }
}

/// Classify an EMI total against monthly income.
pub fn assess_ratio(
    total_monthly_emi: Money,
    monthly_income: Money,
) -> LoanEngineResult<LoanToIncomeReport> {
    if total_monthly_emi < Decimal::ZERO {
        return Err(LoanEngineError::loan_params(
            "total_monthly_emi",
            format!("Total monthly EMI cannot be negative, got {total_monthly_emi}"),
        ));
    }

    let ratio = emi_share_pct(total_monthly_emi, monthly_income)?;
    let risk_level = RiskLevel::from_ratio(ratio);
    Ok(LoanToIncomeReport {
        total_monthly_emi,
        monthly_income,
        ratio,
        risk_level,
        recommendation: risk_level.recommendation().to_string(),
    })
}

/// Ratio of the installments of every open loan to monthly income.
pub fn loan_to_income_ratio(
    loans: &[Loan],
    monthly_income: Money,
) -> LoanEngineResult<LoanToIncomeReport> {
    let total = checked_sum(
        loans
            .iter()
            .filter(|l| !l.is_closed())
            .map(|l| l.monthly_installment()),
        "total_monthly_emi",
    )?;
    assess_ratio(total, monthly_income)
}

/// AssessLoanToIncome wrapped in the standard output envelope.
pub fn assess_loan_to_income(
    input: &LoanToIncomeInput,
) -> LoanEngineResult<ComputationOutput<LoanToIncomeReport>> {
    let start = Instant::now();
    let report = loan_to_income_ratio(&input.loans, input.monthly_income)?;

    let closed = input.loans.iter().filter(|l| l.is_closed()).count();
    let mut warnings = Vec::new();
    if closed > 0 {
        warnings.push(format!("{closed} closed loan(s) excluded from the EMI total"));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Loan-to-income (EMI burden) ratio",
        &serde_json::json!({
            "bands_pct": {"low": "<20", "medium": "20-35", "high": "35-50", "critical": ">=50"},
            "loans": input.loans.len(),
        }),
        warnings,
        elapsed,
        report,
    ))
}

pub(crate) fn ensure_income(monthly_income: Money) -> LoanEngineResult<()> {
    if monthly_income <= Decimal::ZERO {
        return Err(LoanEngineError::InvalidIncome {
            field: "monthly_income".into(),
            reason: format!("Monthly income must be positive, got {monthly_income}"),
        });
    }
    Ok(())
}

/// `emi` as a percentage of `monthly_income`. An income so small that the
/// share leaves the decimal range is rejected as invalid income.
pub(crate) fn emi_share_pct(emi: Money, monthly_income: Money) -> LoanEngineResult<Percent> {
    ensure_income(monthly_income)?;
    emi.checked_div(monthly_income)
        .and_then(|share| share.checked_mul(dec!(100)))
        .ok_or_else(|| LoanEngineError::InvalidIncome {
            field: "monthly_income".into(),
            reason: format!(
                "Monthly income {monthly_income} is too small to compare against {emi}"
            ),
        })
}
