use chrono::NaiveDate;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::amortization::schedule::Schedule;
use crate::loan::model::Loan;
use crate::risk::ratio::{emi_share_pct, ensure_income, RiskLevel};
use crate::types::*;
use crate::LoanEngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertType {
    Overdue,
    DueSoon,
    HighEmiRatio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub loan_id: String,
    pub action_required: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

/// Alert thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// An installment due within this many days raises a due-soon alert.
    pub due_soon_days: i64,
    /// A single loan whose EMI exceeds this share of income (percent)
    /// raises a high-emi-ratio alert.
    pub emi_ratio_threshold_pct: Percent,
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            due_soon_days: 7,
            emi_ratio_threshold_pct: dec!(20),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertInput {
    pub loan: Loan,
    /// Schedule with paid flags; the loan's own schedule when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    pub now: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_income: Option<Money>,
    #[serde(default)]
    pub config: AlertConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioAlertInput {
    pub loans: Vec<Loan>,
    pub now: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_income: Option<Money>,
    #[serde(default)]
    pub config: AlertConfig,
}

/// Alerts for one loan, ordered overdue, due-soon, high-emi-ratio.
///
/// The next unpaid installment of `schedule` drives the date alerts; the
/// EMI burden alert needs `monthly_income`. Closed loans raise nothing.
pub fn alerts_for_loan(
    loan: &Loan,
    schedule: &Schedule,
    now: NaiveDate,
    monthly_income: Option<Money>,
    config: &AlertConfig,
) -> LoanEngineResult<Vec<Alert>> {
    if let Some(income) = monthly_income {
        ensure_income(income)?;
    }
    let mut alerts = Vec::new();
    if loan.is_closed() {
        return Ok(alerts);
    }

    if let Some(next) = schedule.next_unpaid() {
        let days_until = (next.due_date - now).num_days();
        if days_until < 0 {
            alerts.push(Alert {
                alert_type: AlertType::Overdue,
                severity: Severity::High,
                loan_id: loan.id().to_string(),
                action_required: true,
                message: format!(
                    "Installment {} of {} was due on {} and is {} day(s) overdue",
                    next.month,
                    round_currency(next.total_payment),
                    next.due_date,
                    -days_until
                ),
                due_date: Some(next.due_date),
            });
        } else if days_until <= config.due_soon_days {
            alerts.push(Alert {
                alert_type: AlertType::DueSoon,
                severity: Severity::Medium,
                loan_id: loan.id().to_string(),
                action_required: false,
                message: format!(
                    "Installment {} of {} is due on {} (in {} day(s))",
                    next.month,
                    round_currency(next.total_payment),
                    next.due_date,
                    days_until
                ),
                due_date: Some(next.due_date),
            });
        }
    }

    if let Some(income) = monthly_income {
        let ratio = emi_share_pct(loan.monthly_installment(), income)?;
        if ratio > config.emi_ratio_threshold_pct {
            let severity = emi_ratio_severity(RiskLevel::from_ratio(ratio));
            alerts.push(Alert {
                alert_type: AlertType::HighEmiRatio,
                severity,
                loan_id: loan.id().to_string(),
                action_required: severity == Severity::High,
                message: format!(
                    "EMI of {} is {}% of monthly income",
                    round_currency(loan.monthly_installment()),
                    ratio.round_dp(1)
                ),
                due_date: None,
            });
        }
    }

    Ok(alerts)
}

/// ComputeAlerts wrapped in the standard output envelope.
pub fn compute_alerts(input: &AlertInput) -> LoanEngineResult<ComputationOutput<Vec<Alert>>> {
    let start = Instant::now();
    let owned;
    let schedule = match &input.schedule {
        Some(s) => s,
        None => {
            owned = input.loan.schedule();
            &owned
        }
    };
    let alerts = alerts_for_loan(
        &input.loan,
        schedule,
        input.now,
        input.monthly_income,
        &input.config,
    )?;

    let mut warnings = Vec::new();
    if input.monthly_income.is_none() {
        warnings.push("No monthly income supplied; EMI burden not assessed".to_string());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Loan due-date and EMI burden alerts",
        &serde_json::json!({
            "now": input.now,
            "config": input.config,
        }),
        warnings,
        elapsed,
        alerts,
    ))
}

/// Alerts across every loan, most severe first, then by due date.
pub fn portfolio_alerts(
    input: &PortfolioAlertInput,
) -> LoanEngineResult<ComputationOutput<Vec<Alert>>> {
    let start = Instant::now();

    let mut alerts = Vec::new();
    for loan in &input.loans {
        alerts.extend(alerts_for_loan(
            loan,
            &loan.schedule(),
            input.now,
            input.monthly_income,
            &input.config,
        )?);
    }
    alerts.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(a.due_date.cmp(&b.due_date))
            .then_with(|| a.loan_id.cmp(&b.loan_id))
    });

    let action_count = alerts.iter().filter(|a| a.action_required).count();
    log::debug!(
        "{} alerts across {} loans ({} need action)",
        alerts.len(),
        input.loans.len(),
        action_count
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Portfolio alerts ranked by severity",
        &serde_json::json!({
            "now": input.now,
            "loans": input.loans.len(),
            "action_required": action_count,
        }),
        Vec::new(),
        elapsed,
        alerts,
    ))
}

/// Severity of a single loan's EMI burden, one step below its ratio band.
fn emi_ratio_severity(level: RiskLevel) -> Severity {
    match level {
        RiskLevel::Low | RiskLevel::Medium => Severity::Low,
        RiskLevel::High => Severity::Medium,
        RiskLevel::Critical => Severity::High,
    }
}
