use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::loan::model::{Loan, LoanStatus};
use crate::types::*;
use crate::LoanEngineResult;

/// Input for a portfolio summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioInput {
    pub loans: Vec<Loan>,
    /// Reference date used to derive statuses.
    pub as_of: NaiveDate,
}

/// The earliest upcoming installment across the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextDue {
    pub loan_id: String,
    pub month: u32,
    pub due_date: NaiveDate,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_loans: usize,
    pub active_loans: usize,
    pub overdue_loans: usize,
    pub closed_loans: usize,
    pub total_principal: Money,
    pub total_outstanding: Money,
    /// Sum of installments on loans that are still open.
    pub total_monthly_emi: Money,
    pub total_interest: Money,
    pub interest_remaining: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due: Option<NextDue>,
}

impl RoundCurrency for PortfolioSummary {
    fn rounded(&self) -> Self {
        PortfolioSummary {
            total_principal: round_currency(self.total_principal),
            total_outstanding: round_currency(self.total_outstanding),
            total_monthly_emi: round_currency(self.total_monthly_emi),
            total_interest: round_currency(self.total_interest),
            interest_remaining: round_currency(self.interest_remaining),
            next_due: self.next_due.as_ref().map(|n| NextDue {
                amount: round_currency(n.amount),
                ..n.clone()
            }),
            ..self.clone()
        }
    }
}

/// Dashboard aggregates over a set of loans.
pub fn summarize_portfolio(
    input: &PortfolioInput,
) -> LoanEngineResult<ComputationOutput<PortfolioSummary>> {
    let start = Instant::now();

    let loans = &input.loans;
    let open = || loans.iter().filter(|l| l.next_installment().is_some());
    let mut summary = PortfolioSummary {
        total_loans: loans.len(),
        active_loans: 0,
        overdue_loans: 0,
        closed_loans: 0,
        total_principal: checked_sum(loans.iter().map(Loan::principal), "total_principal")?,
        total_outstanding: checked_sum(
            loans.iter().map(Loan::remaining_amount),
            "total_outstanding",
        )?,
        total_monthly_emi: checked_sum(open().map(Loan::monthly_installment), "total_monthly_emi")?,
        total_interest: checked_sum(loans.iter().map(Loan::total_interest), "total_interest")?,
        interest_remaining: checked_sum(
            loans.iter().map(Loan::interest_remaining),
            "interest_remaining",
        )?,
        next_due: None,
    };

    for loan in loans {
        match loan.derived_status(input.as_of) {
            LoanStatus::Active => summary.active_loans += 1,
            LoanStatus::Overdue => summary.overdue_loans += 1,
            LoanStatus::Closed => summary.closed_loans += 1,
        }

        let Some(next) = loan.next_installment() else {
            continue;
        };
        let earlier = summary
            .next_due
            .as_ref()
            .map_or(true, |current| next.due_date < current.due_date);
        if earlier {
            summary.next_due = Some(NextDue {
                loan_id: loan.id().to_string(),
                month: next.month,
                due_date: next.due_date,
                amount: next.total_payment,
            });
        }
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Loan portfolio summary",
        &serde_json::json!({
            "as_of": input.as_of,
            "loans": input.loans.len(),
        }),
        Vec::new(),
        elapsed,
        summary,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::model::LoanInput;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_summary_counts_and_next_due() {
        let home =
            Loan::new(LoanInput::new("home", dec!(300000), dec!(7), 240, date(2024, 1, 10)))
                .unwrap();
        let car =
            Loan::new(LoanInput::new("car", dec!(50000), dec!(9), 36, date(2024, 1, 5))).unwrap();
        let mut paid = LoanInput::new("phone", dec!(1200), dec!(0), 12, date(2023, 1, 1));
        paid.paid_installments = 12;
        let phone = Loan::new(paid).unwrap();

        let input = PortfolioInput {
            loans: vec![home.clone(), car.clone(), phone],
            as_of: date(2024, 1, 20),
        };
        let out = summarize_portfolio(&input).unwrap().result;

        assert_eq!(out.total_loans, 3);
        assert_eq!(out.active_loans, 2);
        assert_eq!(out.closed_loans, 1);
        assert_eq!(out.total_outstanding, dec!(350000));
        assert_eq!(
            out.total_monthly_emi,
            home.monthly_installment() + car.monthly_installment()
        );
        let next = out.next_due.unwrap();
        assert_eq!(next.loan_id, "car");
        assert_eq!(next.due_date, date(2024, 2, 5));
    }

    #[test]
    fn test_empty_portfolio() {
        let input = PortfolioInput {
            loans: Vec::new(),
            as_of: date(2024, 1, 1),
        };
        let out = summarize_portfolio(&input).unwrap().result;
        assert_eq!(out.total_loans, 0);
        assert_eq!(out.total_outstanding, Decimal::ZERO);
        assert!(out.next_due.is_none());
    }

    #[test]
    fn test_totals_beyond_decimal_range_are_rejected() {
        let huge = Decimal::from_str("50000000000000000000000000000").unwrap();
        let loans = ["a", "b"]
            .iter()
            .map(|id| Loan::new(LoanInput::new(*id, huge, dec!(0), 1, date(2024, 1, 1))).unwrap())
            .collect();
        let input = PortfolioInput {
            loans,
            as_of: date(2024, 1, 1),
        };
        assert!(matches!(
            summarize_portfolio(&input),
            Err(crate::LoanEngineError::InvalidLoanParameters { field, .. })
                if field == "total_principal"
        ));
    }
}
