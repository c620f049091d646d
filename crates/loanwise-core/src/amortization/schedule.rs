use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::amortization::math::{self, split_payment};
use crate::error::LoanEngineError;
use crate::types::*;
use crate::LoanEngineResult;

/// One installment of a repayment schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleItem {
    /// 1-based installment number.
    pub month: u32,
    pub due_date: NaiveDate,
    pub principal_payment: Money,
    pub interest_payment: Money,
    pub total_payment: Money,
    pub remaining_balance: Money,
    pub paid: bool,
}

impl RoundCurrency for ScheduleItem {
    fn rounded(&self) -> Self {
        ScheduleItem {
            principal_payment: round_currency(self.principal_payment),
            interest_payment: round_currency(self.interest_payment),
            total_payment: round_currency(self.total_payment),
            remaining_balance: round_currency(self.remaining_balance),
            ..self.clone()
        }
    }
}

/// Ordered repayment schedule. Regenerated whenever loan terms change,
/// never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule {
    items: Vec<ScheduleItem>,
}

impl Schedule {
    pub(crate) fn from_items(items: Vec<ScheduleItem>) -> Self {
        Schedule { items }
    }

    pub fn items(&self) -> &[ScheduleItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScheduleItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, month: u32) -> Option<&ScheduleItem> {
        month
            .checked_sub(1)
            .and_then(|idx| self.items.get(idx as usize))
    }

    pub fn last(&self) -> Option<&ScheduleItem> {
        self.items.last()
    }

    pub fn total_interest(&self) -> Money {
        self.items.iter().map(|i| i.interest_payment).sum()
    }

    pub fn total_principal(&self) -> Money {
        self.items.iter().map(|i| i.principal_payment).sum()
    }

    pub fn total_payable(&self) -> Money {
        self.items.iter().map(|i| i.total_payment).sum()
    }

    /// Interest carried by the first `months` installments.
    pub fn interest_through(&self, months: u32) -> Money {
        self.items
            .iter()
            .take(months as usize)
            .map(|i| i.interest_payment)
            .sum()
    }

    /// Outstanding balance once `months` installments have been paid.
    /// `months == 0` reconstructs the opening principal from the first row.
    pub fn balance_after(&self, months: u32) -> Money {
        match months {
            0 => self
                .items
                .first()
                .map(|i| i.remaining_balance + i.principal_payment)
                .unwrap_or(Decimal::ZERO),
            m => self
                .get(m)
                .or_else(|| self.items.last())
                .map(|i| i.remaining_balance)
                .unwrap_or(Decimal::ZERO),
        }
    }

    pub fn next_unpaid(&self) -> Option<&ScheduleItem> {
        self.items.iter().find(|i| !i.paid)
    }

    pub fn paid_count(&self) -> u32 {
        self.items.iter().filter(|i| i.paid).count() as u32
    }

    /// Copy of the schedule with the first `months` installments marked paid.
    pub fn with_paid_through(&self, months: u32) -> Schedule {
        let items = self
            .items
            .iter()
            .map(|i| ScheduleItem {
                paid: i.month <= months,
                ..i.clone()
            })
            .collect();
        Schedule { items }
    }
}

impl<'a> IntoIterator for &'a Schedule {
    type Item = &'a ScheduleItem;
    type IntoIter = std::slice::Iter<'a, ScheduleItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl RoundCurrency for Schedule {
    fn rounded(&self) -> Self {
        Schedule {
            items: self.items.rounded(),
        }
    }
}

/// BuildSchedule request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub principal: Money,
    pub annual_rate_pct: Percent,
    pub tenure_months: u32,
    pub start_date: NaiveDate,
}

/// A dateless amortization period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Period {
    pub month: u32,
    pub interest: Money,
    pub principal: Money,
    pub balance: Money,
}

/// Generate the full repayment schedule for a loan.
///
/// The final installment repays whatever balance remains, so the schedule
/// always terminates at exactly zero regardless of accumulated drift.
pub fn build_schedule(
    principal: Money,
    annual_rate_pct: Percent,
    tenure_months: u32,
    start_date: NaiveDate,
) -> LoanEngineResult<Schedule> {
    let emi = math::compute_emi(principal, annual_rate_pct, tenure_months)?;
    let r = math::monthly_rate(annual_rate_pct);
    let periods = amortize(principal, r, emi, tenure_months);
    let schedule = dated_schedule(&periods, start_date)?;

    log::debug!(
        "schedule built: principal={} rate={}% tenure={} start={}",
        principal,
        annual_rate_pct,
        tenure_months,
        start_date
    );
    Ok(schedule)
}

/// BuildSchedule wrapped in the standard output envelope.
pub fn generate_schedule(input: &ScheduleInput) -> LoanEngineResult<ComputationOutput<Schedule>> {
    let start = Instant::now();
    let schedule = build_schedule(
        input.principal,
        input.annual_rate_pct,
        input.tenure_months,
        input.start_date,
    )?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Reducing-balance amortization schedule",
        &serde_json::json!({
            "principal": input.principal.to_string(),
            "annual_rate_pct": input.annual_rate_pct.to_string(),
            "tenure_months": input.tenure_months,
            "start_date": input.start_date,
            "final_installment": "absorbs residual balance",
        }),
        Vec::new(),
        elapsed,
        schedule,
    ))
}

/// Due date of installment `month`: the start date plus that many calendar
/// months, clamped to the end of shorter months.
pub fn due_date(start_date: NaiveDate, month: u32) -> LoanEngineResult<NaiveDate> {
    start_date
        .checked_add_months(Months::new(month))
        .ok_or_else(|| {
            LoanEngineError::DateError(format!(
                "{start_date} plus {month} months is out of range"
            ))
        })
}

/// Fixed-tenure amortization at a constant installment; the last period
/// repays the residual balance exactly.
pub(crate) fn amortize(principal: Money, r: Rate, emi: Money, tenure_months: u32) -> Vec<Period> {
    let mut periods = Vec::with_capacity(tenure_months as usize);
    let mut balance = principal;

    for month in 1..=tenure_months {
        let (interest, principal_paid, closing) = if month == tenure_months {
            (balance * r, balance, Decimal::ZERO)
        } else {
            let split = split_payment(balance, r, emi);
            (split.interest_payment, split.principal_payment, split.new_balance)
        };
        balance = closing;
        periods.push(Period {
            month,
            interest,
            principal: principal_paid,
            balance,
        });
    }

    periods
}

/// Amortize an opening balance at a constant installment until it is
/// repaid. Numbering starts at `first_month`. The loop is bounded by
/// `max_months`; the period at that bound repays the remaining balance.
pub(crate) fn amortize_until_paid(
    opening_balance: Money,
    r: Rate,
    emi: Money,
    first_month: u32,
    max_months: u32,
) -> Vec<Period> {
    let mut periods = Vec::new();
    let mut balance = opening_balance;
    let mut month = first_month;

    while balance > Decimal::ZERO && periods.len() < max_months as usize {
        let interest = balance * r;
        let is_last = balance + interest <= emi || periods.len() + 1 == max_months as usize;
        let principal_paid = if is_last {
            balance
        } else {
            split_payment(balance, r, emi).principal_payment
        };
        balance = if is_last {
            Decimal::ZERO
        } else {
            balance - principal_paid
        };
        periods.push(Period {
            month,
            interest,
            principal: principal_paid,
            balance,
        });
        month += 1;
    }

    periods
}

pub(crate) fn dated_schedule(
    periods: &[Period],
    start_date: NaiveDate,
) -> LoanEngineResult<Schedule> {
    let items = periods
        .iter()
        .map(|p| {
            Ok(ScheduleItem {
                month: p.month,
                due_date: due_date(start_date, p.month)?,
                principal_payment: p.principal,
                interest_payment: p.interest,
                total_payment: p.principal + p.interest,
                remaining_balance: p.balance,
                paid: false,
            })
        })
        .collect::<LoanEngineResult<Vec<_>>>()?;
    Ok(Schedule::from_items(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_reference_schedule() {
        let sched = build_schedule(dec!(100000), dec!(8.5), 60, date(2024, 1, 1)).unwrap();
        assert_eq!(sched.len(), 60);
        assert_eq!(sched.last().unwrap().remaining_balance, Decimal::ZERO);
        assert!((sched.total_principal() - dec!(100000)).abs() <= dec!(0.01));
        assert_eq!(sched.items()[0].due_date, date(2024, 2, 1));
        assert_eq!(sched.last().unwrap().due_date, date(2029, 1, 1));
    }

    #[test]
    fn test_balance_strictly_decreasing() {
        let sched = build_schedule(dec!(25000), dec!(11.25), 36, date(2023, 6, 15)).unwrap();
        let mut prev = dec!(25000);
        for item in &sched {
            assert!(item.remaining_balance < prev, "month {}", item.month);
            prev = item.remaining_balance;
        }
    }

    #[test]
    fn test_zero_rate_schedule_has_no_interest() {
        let sched = build_schedule(dec!(1200), Decimal::ZERO, 12, date(2024, 1, 1)).unwrap();
        assert_eq!(sched.total_interest(), Decimal::ZERO);
        assert!(sched.iter().all(|i| i.principal_payment == dec!(100)));
    }

    #[test]
    fn test_month_end_due_dates_clamp() {
        let sched = build_schedule(dec!(3000), dec!(6), 3, date(2024, 1, 31)).unwrap();
        let dates: Vec<NaiveDate> = sched.iter().map(|i| i.due_date).collect();
        assert_eq!(dates, vec![date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]);
    }

    #[test]
    fn test_balance_after() {
        let sched = build_schedule(dec!(10000), dec!(12), 10, date(2024, 1, 1)).unwrap();
        assert!((sched.balance_after(0) - dec!(10000)).abs() < dec!(0.000001));
        assert_eq!(sched.balance_after(10), Decimal::ZERO);
        assert_eq!(sched.balance_after(3), sched.items()[2].remaining_balance);
    }

    #[test]
    fn test_with_paid_through() {
        let sched = build_schedule(dec!(10000), dec!(12), 10, date(2024, 1, 1)).unwrap();
        let marked = sched.with_paid_through(4);
        assert_eq!(marked.paid_count(), 4);
        assert_eq!(marked.next_unpaid().unwrap().month, 5);
        // the source schedule is untouched
        assert_eq!(sched.paid_count(), 0);
    }

    #[test]
    fn test_amortize_until_paid_partial_last_payment() {
        let periods = amortize_until_paid(dec!(1000), dec!(0.01), dec!(300), 1, 600);
        assert_eq!(periods.len(), 4);
        let last = periods.last().unwrap();
        assert_eq!(last.balance, Decimal::ZERO);
        assert!(last.principal + last.interest < dec!(300));
        let principal: Money = periods.iter().map(|p| p.principal).sum();
        assert_eq!(principal, dec!(1000));
    }

    #[test]
    fn test_invalid_terms_propagate() {
        assert!(matches!(
            build_schedule(dec!(-5), dec!(5), 12, date(2024, 1, 1)),
            Err(LoanEngineError::InvalidLoanParameters { .. })
        ));
    }
}
