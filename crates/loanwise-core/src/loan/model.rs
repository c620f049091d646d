use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::amortization::math::{self, validate_terms};
use crate::amortization::schedule::{build_schedule, Schedule, ScheduleItem};
use crate::error::LoanEngineError;
use crate::types::*;
use crate::LoanEngineResult;

/// Lifecycle status of a loan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanStatus {
    #[default]
    Active,
    Closed,
    Overdue,
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "Active",
            Self::Closed => "Closed",
            Self::Overdue => "Overdue",
        };
        write!(f, "{}", s)
    }
}

/// Raw loan record as supplied by callers. Only required terms plus the
/// payment progress; every derived figure is computed by [`Loan::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanInput {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lender: Option<String>,
    pub principal: Money,
    /// Annual interest rate in percent (8.5 = 8.5%).
    pub annual_rate_pct: Percent,
    pub tenure_months: u32,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub status: LoanStatus,
    /// Number of installments already paid, counted from month 1.
    #[serde(default)]
    pub paid_installments: u32,
}

impl LoanInput {
    pub fn new(
        id: impl Into<String>,
        principal: Money,
        annual_rate_pct: Percent,
        tenure_months: u32,
        start_date: NaiveDate,
    ) -> Self {
        LoanInput {
            id: id.into(),
            name: None,
            lender: None,
            principal,
            annual_rate_pct,
            tenure_months,
            start_date,
            status: LoanStatus::Active,
            paid_installments: 0,
        }
    }
}

/// A validated loan with its derived installment, totals and an immutable
/// snapshot of the schedule generated at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "LoanInput")]
pub struct Loan {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lender: Option<String>,
    principal: Money,
    annual_rate_pct: Percent,
    tenure_months: u32,
    start_date: NaiveDate,
    status: LoanStatus,
    paid_installments: u32,
    monthly_installment: Money,
    remaining_amount: Money,
    total_interest: Money,
    #[serde(skip_serializing)]
    baseline: Arc<Schedule>,
}

impl TryFrom<LoanInput> for Loan {
    type Error = LoanEngineError;

    fn try_from(input: LoanInput) -> Result<Self, Self::Error> {
        Loan::new(input)
    }
}

impl Loan {
    pub fn new(input: LoanInput) -> LoanEngineResult<Loan> {
        if input.id.trim().is_empty() {
            return Err(LoanEngineError::loan_params("id", "Loan id must not be empty"));
        }
        validate_terms(input.principal, input.annual_rate_pct, input.tenure_months)?;
        if input.paid_installments > input.tenure_months {
            return Err(LoanEngineError::loan_params(
                "paid_installments",
                format!(
                    "{} installments paid exceeds tenure of {} months",
                    input.paid_installments, input.tenure_months
                ),
            ));
        }

        let monthly_installment =
            math::compute_emi(input.principal, input.annual_rate_pct, input.tenure_months)?;
        let baseline = build_schedule(
            input.principal,
            input.annual_rate_pct,
            input.tenure_months,
            input.start_date,
        )?;

        let fully_paid = input.paid_installments == input.tenure_months;
        let status = if fully_paid {
            LoanStatus::Closed
        } else {
            input.status
        };
        let remaining_amount = match (status, input.paid_installments) {
            (LoanStatus::Closed, _) => Decimal::ZERO,
            (_, 0) => input.principal,
            (_, paid) => baseline.balance_after(paid),
        };

        Ok(Loan {
            id: input.id,
            name: input.name,
            lender: input.lender,
            principal: input.principal,
            annual_rate_pct: input.annual_rate_pct,
            tenure_months: input.tenure_months,
            start_date: input.start_date,
            status,
            paid_installments: input.paid_installments,
            monthly_installment,
            remaining_amount,
            total_interest: baseline.total_interest(),
            baseline: Arc::new(baseline),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn lender(&self) -> Option<&str> {
        self.lender.as_deref()
    }

    pub fn principal(&self) -> Money {
        self.principal
    }

    pub fn annual_rate_pct(&self) -> Percent {
        self.annual_rate_pct
    }

    pub fn monthly_rate(&self) -> Rate {
        math::monthly_rate(self.annual_rate_pct)
    }

    pub fn tenure_months(&self) -> u32 {
        self.tenure_months
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn status(&self) -> LoanStatus {
        self.status
    }

    pub fn paid_installments(&self) -> u32 {
        self.paid_installments
    }

    pub fn monthly_installment(&self) -> Money {
        self.monthly_installment
    }

    pub fn remaining_amount(&self) -> Money {
        self.remaining_amount
    }

    /// Lifetime interest of the original schedule.
    pub fn total_interest(&self) -> Money {
        self.total_interest
    }

    pub fn is_closed(&self) -> bool {
        self.status == LoanStatus::Closed
    }

    pub fn remaining_installments(&self) -> u32 {
        if self.is_closed() {
            0
        } else {
            self.tenure_months - self.paid_installments
        }
    }

    /// The schedule generated when the loan was created. What-if scenarios
    /// diff against this snapshot; it is never modified.
    pub fn baseline(&self) -> &Schedule {
        &self.baseline
    }

    /// The baseline schedule with recorded installments flagged as paid.
    pub fn schedule(&self) -> Schedule {
        let paid_through = if self.is_closed() {
            self.tenure_months
        } else {
            self.paid_installments
        };
        self.baseline.with_paid_through(paid_through)
    }

    /// Scheduled balance once `months` installments are paid.
    pub fn balance_after(&self, months: u32) -> Money {
        match months {
            0 => self.principal,
            m => self.baseline.balance_after(m),
        }
    }

    pub fn next_installment(&self) -> Option<&ScheduleItem> {
        if self.is_closed() {
            return None;
        }
        self.baseline.get(self.paid_installments + 1)
    }

    pub fn interest_paid(&self) -> Money {
        self.baseline.interest_through(self.paid_installments)
    }

    pub fn interest_remaining(&self) -> Money {
        if self.is_closed() {
            return Decimal::ZERO;
        }
        self.total_interest - self.interest_paid()
    }

    /// Record the next scheduled installment as paid. Paying the last
    /// installment closes the loan.
    pub fn record_installment(&mut self) -> LoanEngineResult<ScheduleItem> {
        let item = self
            .next_installment()
            .cloned()
            .ok_or_else(|| {
                LoanEngineError::loan_params(
                    "paid_installments",
                    format!("Loan {} is closed; no installment is due", self.id),
                )
            })?;

        self.paid_installments = item.month;
        self.remaining_amount = item.remaining_balance;
        if self.paid_installments == self.tenure_months {
            self.status = LoanStatus::Closed;
        } else if self.status == LoanStatus::Overdue {
            self.status = LoanStatus::Active;
        }

        log::debug!(
            "installment {} recorded for loan {}: remaining={}",
            item.month,
            self.id,
            self.remaining_amount
        );
        Ok(ScheduleItem { paid: true, ..item })
    }

    /// Record the next `count` installments. Nothing is recorded unless all
    /// of them are still outstanding.
    pub fn record_installments(&mut self, count: u32) -> LoanEngineResult<Vec<ScheduleItem>> {
        let remaining = self.remaining_installments();
        if count == 0 || count > remaining {
            return Err(LoanEngineError::loan_params(
                "count",
                format!(
                    "Cannot record {count} installment(s) on loan {}; {remaining} outstanding",
                    self.id
                ),
            ));
        }
        (0..count).map(|_| self.record_installment()).collect()
    }

    /// Status as of `now`: closed when fully paid, overdue when the next
    /// unpaid installment is past due, active otherwise.
    pub fn derived_status(&self, now: NaiveDate) -> LoanStatus {
        match self.next_installment() {
            None => LoanStatus::Closed,
            Some(item) if item.due_date < now => LoanStatus::Overdue,
            Some(_) => LoanStatus::Active,
        }
    }

    /// A new loan state refinancing the outstanding balance over the
    /// remaining tenure at `new_annual_rate_pct`. The receiver is untouched.
    pub fn refinanced(&self, new_annual_rate_pct: Percent) -> LoanEngineResult<Loan> {
        if new_annual_rate_pct < Decimal::ZERO {
            return Err(LoanEngineError::scenario(
                "new_annual_rate_pct",
                format!("Refinance rate cannot be negative, got {new_annual_rate_pct}"),
            ));
        }
        if self.is_closed() {
            return Err(LoanEngineError::scenario(
                "loan",
                format!("Loan {} is closed and cannot be refinanced", self.id),
            ));
        }

        let start_date = self
            .baseline
            .get(self.paid_installments)
            .map(|i| i.due_date)
            .unwrap_or(self.start_date);

        Loan::new(LoanInput {
            id: self.id.clone(),
            name: self.name.clone(),
            lender: self.lender.clone(),
            principal: self.remaining_amount,
            annual_rate_pct: new_annual_rate_pct,
            tenure_months: self.remaining_installments(),
            start_date,
            status: LoanStatus::Active,
            paid_installments: 0,
        })
    }

    pub fn to_input(&self) -> LoanInput {
        LoanInput {
            id: self.id.clone(),
            name: self.name.clone(),
            lender: self.lender.clone(),
            principal: self.principal,
            annual_rate_pct: self.annual_rate_pct,
            tenure_months: self.tenure_months,
            start_date: self.start_date,
            status: self.status,
            paid_installments: self.paid_installments,
        }
    }
}

/// Presentation view of a loan: terms and derived figures at currency
/// precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lender: Option<String>,
    pub principal: Money,
    pub annual_rate_pct: Percent,
    pub tenure_months: u32,
    pub start_date: NaiveDate,
    pub status: LoanStatus,
    pub paid_installments: u32,
    pub monthly_installment: Money,
    pub remaining_amount: Money,
    pub total_interest: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due_date: Option<NaiveDate>,
}

impl From<&Loan> for LoanView {
    fn from(loan: &Loan) -> Self {
        LoanView {
            id: loan.id.clone(),
            name: loan.name.clone(),
            lender: loan.lender.clone(),
            principal: loan.principal,
            annual_rate_pct: loan.annual_rate_pct,
            tenure_months: loan.tenure_months,
            start_date: loan.start_date,
            status: loan.status,
            paid_installments: loan.paid_installments,
            monthly_installment: loan.monthly_installment,
            remaining_amount: loan.remaining_amount,
            total_interest: loan.total_interest,
            next_due_date: loan.next_installment().map(|i| i.due_date),
        }
    }
}

impl RoundCurrency for LoanView {
    fn rounded(&self) -> Self {
        LoanView {
            principal: round_currency(self.principal),
            monthly_installment: round_currency(self.monthly_installment),
            remaining_amount: round_currency(self.remaining_amount),
            total_interest: round_currency(self.total_interest),
            ..self.clone()
        }
    }
}
