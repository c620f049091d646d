//! Core installment arithmetic: EMI formula, monthly rate conversion and the
//! per-period interest/principal split.
//!
//! Everything here runs at full `Decimal` precision. Rounding to currency
//! precision happens only when a result is presented (see
//! [`crate::types::RoundCurrency`]).

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::amortization::schedule;
use crate::error::LoanEngineError;
use crate::types::*;
use crate::LoanEngineResult;

/// Longest tenure accepted at the validation boundary (50 years).
pub const MAX_TENURE_MONTHS: u32 = 600;

const MONTHS_PER_YEAR: Decimal = dec!(12);
const PERCENT: Decimal = dec!(100);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for a standalone EMI calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmiInput {
    pub principal: Money,
    /// Annual interest rate in percent (8.5 = 8.5%).
    pub annual_rate_pct: Percent,
    pub tenure_months: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmiOutput {
    pub monthly_emi: Money,
    pub total_interest: Money,
    pub total_payable: Money,
}

impl RoundCurrency for EmiOutput {
    fn rounded(&self) -> Self {
        EmiOutput {
            monthly_emi: round_currency(self.monthly_emi),
            total_interest: round_currency(self.total_interest),
            total_payable: round_currency(self.total_payable),
        }
    }
}

/// Result of applying one installment to an outstanding balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSplit {
    pub interest_payment: Money,
    pub principal_payment: Money,
    pub new_balance: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Convert an annual percentage rate into a monthly decimal rate.
pub fn monthly_rate(annual_rate_pct: Percent) -> Rate {
    annual_rate_pct / MONTHS_PER_YEAR / PERCENT
}

/// Reject loan terms the engine cannot amortize.
pub fn validate_terms(
    principal: Money,
    annual_rate_pct: Percent,
    tenure_months: u32,
) -> LoanEngineResult<()> {
    if principal <= Decimal::ZERO {
        return Err(LoanEngineError::loan_params(
            "principal",
            format!("Principal must be positive, got {principal}"),
        ));
    }
    if annual_rate_pct < Decimal::ZERO {
        return Err(LoanEngineError::loan_params(
            "annual_rate_pct",
            format!("Annual interest rate cannot be negative, got {annual_rate_pct}"),
        ));
    }
    if tenure_months == 0 {
        return Err(LoanEngineError::loan_params(
            "tenure_months",
            "Tenure must be at least 1 month",
        ));
    }
    if tenure_months > MAX_TENURE_MONTHS {
        return Err(LoanEngineError::loan_params(
            "tenure_months",
            format!("Tenure of {tenure_months} months exceeds the {MAX_TENURE_MONTHS}-month limit"),
        ));
    }
    Ok(())
}

/// Equated monthly installment:
/// `P * r * (1+r)^n / ((1+r)^n - 1)`, or `P / n` when the rate is zero.
pub fn compute_emi(
    principal: Money,
    annual_rate_pct: Percent,
    tenure_months: u32,
) -> LoanEngineResult<Money> {
    validate_terms(principal, annual_rate_pct, tenure_months)?;
    let r = monthly_rate(annual_rate_pct);
    emi_for_monthly_rate(principal, r, tenure_months)
}

/// Apply one installment: interest accrues on the opening balance, the rest
/// of the installment reduces principal. The principal portion never exceeds
/// the outstanding balance, so the new balance is floored at zero.
pub fn split_payment(remaining_balance: Money, monthly_rate: Rate, emi: Money) -> PaymentSplit {
    let interest_payment = remaining_balance * monthly_rate;
    let principal_payment = (emi - interest_payment).min(remaining_balance);
    let new_balance = (remaining_balance - principal_payment).max(Decimal::ZERO);
    PaymentSplit {
        interest_payment,
        principal_payment,
        new_balance,
    }
}

/// ComputeEMI request: installment plus lifetime totals. Totals come from
/// the amortized path so they include the final-month correction.
pub fn calculate_emi(input: &EmiInput) -> LoanEngineResult<ComputationOutput<EmiOutput>> {
    let start = Instant::now();

    let monthly_emi = compute_emi(input.principal, input.annual_rate_pct, input.tenure_months)?;
    let r = monthly_rate(input.annual_rate_pct);
    let periods = schedule::amortize(input.principal, r, monthly_emi, input.tenure_months);

    let total_interest: Money = periods.iter().map(|p| p.interest).sum();
    let output = EmiOutput {
        monthly_emi,
        total_interest,
        total_payable: input.principal + total_interest,
    };

    log::debug!(
        "emi computed: principal={} rate={}% tenure={} emi={}",
        input.principal,
        input.annual_rate_pct,
        input.tenure_months,
        monthly_emi
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Equated Monthly Installment (reducing balance)",
        &serde_json::json!({
            "principal": input.principal.to_string(),
            "annual_rate_pct": input.annual_rate_pct.to_string(),
            "monthly_rate": r.to_string(),
            "tenure_months": input.tenure_months,
        }),
        Vec::new(),
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// EMI for an already-converted monthly rate. Callers validate the terms.
pub(crate) fn emi_for_monthly_rate(
    principal: Money,
    r: Rate,
    tenure_months: u32,
) -> LoanEngineResult<Money> {
    if r.is_zero() {
        return Ok(principal / Decimal::from(tenure_months));
    }

    let factor = (Decimal::ONE + r)
        .checked_powu(u64::from(tenure_months))
        .ok_or_else(|| overflow_error(tenure_months))?;
    let denominator = factor - Decimal::ONE;
    if denominator <= Decimal::ZERO {
        return Err(LoanEngineError::loan_params(
            "annual_rate_pct",
            "Monthly rate is too small to amortize at decimal precision",
        ));
    }

    let emi = principal
        .checked_mul(r)
        .and_then(|v| v.checked_mul(factor))
        .and_then(|v| v.checked_div(denominator))
        .ok_or_else(|| overflow_error(tenure_months))?;
    // Lifetime totals are summed from the installments.
    emi.checked_mul(Decimal::from(tenure_months))
        .ok_or_else(|| overflow_error(tenure_months))?;
    Ok(emi)
}

fn overflow_error(tenure_months: u32) -> LoanEngineError {
    LoanEngineError::loan_params(
        "annual_rate_pct",
        format!("Rate compounded over {tenure_months} months exceeds decimal range"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emi_reference_loan() {
        // Exact annuity value; 2052.55 only comes out with the rate rounded to 0.0071.
        let emi = compute_emi(dec!(100000), dec!(8.5), 60).unwrap();
        assert!(
            (emi - dec!(2051.65)).abs() < dec!(0.01),
            "Expected EMI ~2051.65, got {emi}"
        );
    }

    #[test]
    fn test_emi_zero_rate_is_straight_division() {
        let emi = compute_emi(dec!(120000), Decimal::ZERO, 48).unwrap();
        assert_eq!(emi, dec!(2500));
    }

    #[test]
    fn test_emi_single_month() {
        // One month at 12% p.a.: principal plus one month of interest
        let emi = compute_emi(dec!(1000), dec!(12), 1).unwrap();
        assert!((emi - dec!(1010)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_invalid_principal_rejected() {
        let err = compute_emi(Decimal::ZERO, dec!(10), 12).unwrap_err();
        match err {
            LoanEngineError::InvalidLoanParameters { field, .. } => assert_eq!(field, "principal"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_negative_rate_rejected() {
        assert!(matches!(
            compute_emi(dec!(1000), dec!(-1), 12),
            Err(LoanEngineError::InvalidLoanParameters { .. })
        ));
    }

    #[test]
    fn test_tenure_bounds() {
        assert!(compute_emi(dec!(1000), dec!(5), 0).is_err());
        assert!(compute_emi(dec!(1000), dec!(5), MAX_TENURE_MONTHS).is_ok());
        assert!(compute_emi(dec!(1000), dec!(5), MAX_TENURE_MONTHS + 1).is_err());
    }

    #[test]
    fn test_extreme_rate_reports_overflow_instead_of_panicking() {
        let result = compute_emi(dec!(1000000), dec!(100000), 600);
        assert!(matches!(
            result,
            Err(LoanEngineError::InvalidLoanParameters { .. })
        ));
    }

    #[test]
    fn test_lifetime_total_overflow_is_rejected() {
        use std::str::FromStr;
        let principal = Decimal::from_str("70000000000000000000000000000").unwrap();
        assert!(matches!(
            compute_emi(principal, dec!(120), 12),
            Err(LoanEngineError::InvalidLoanParameters { .. })
        ));
        assert!(compute_emi(principal, Decimal::ZERO, 12).is_ok());
    }

    #[test]
    fn test_split_payment() {
        let split = split_payment(dec!(10000), dec!(0.01), dec!(500));
        assert_eq!(split.interest_payment, dec!(100));
        assert_eq!(split.principal_payment, dec!(400));
        assert_eq!(split.new_balance, dec!(9600));
    }

    #[test]
    fn test_split_payment_floors_at_zero() {
        let split = split_payment(dec!(100), dec!(0.01), dec!(500));
        assert_eq!(split.principal_payment, dec!(100));
        assert_eq!(split.new_balance, Decimal::ZERO);
    }

    #[test]
    fn test_calculate_emi_totals() {
        let input = EmiInput {
            principal: dec!(100000),
            annual_rate_pct: dec!(8.5),
            tenure_months: 60,
        };
        let out = calculate_emi(&input).unwrap().result;
        assert_eq!(out.total_payable, dec!(100000) + out.total_interest);
        // 60 installments of ~2051.65 less the principal
        let approx_interest = out.monthly_emi * dec!(60) - dec!(100000);
        assert!((out.total_interest - approx_interest).abs() < dec!(0.01));

        let shown = out.rounded();
        assert_eq!(shown.monthly_emi.scale(), 2);
    }
}
