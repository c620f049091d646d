use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use loanwise_core::risk::alerts::{self, AlertInput, PortfolioAlertInput};
use loanwise_core::risk::ratio::{self, LoanToIncomeInput};

use crate::input;

/// Arguments for the loan-to-income assessment
#[derive(Args)]
pub struct LoanToIncomeArgs {
    #[arg(long)]
    pub input: Option<String>,

    /// Override the monthly income from the input file
    #[arg(long)]
    pub monthly_income: Option<Decimal>,
}

/// Arguments for single-loan alerts
#[derive(Args)]
pub struct AlertsArgs {
    #[arg(long)]
    pub input: Option<String>,

    /// Evaluate as of this date instead of the one in the input (YYYY-MM-DD)
    #[arg(long)]
    pub now: Option<NaiveDate>,
}

/// Arguments for alerts across a set of loans
#[derive(Args)]
pub struct PortfolioAlertsArgs {
    #[arg(long)]
    pub input: Option<String>,

    /// Evaluate as of this date instead of the one in the input (YYYY-MM-DD)
    #[arg(long)]
    pub now: Option<NaiveDate>,
}

pub fn run_loan_to_income(args: LoanToIncomeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut lti_input: LoanToIncomeInput =
        input::load(args.input.as_deref(), "loan-to-income assessment")?;
    if let Some(income) = args.monthly_income {
        lti_input.monthly_income = income;
    }
    let result = ratio::assess_loan_to_income(&lti_input)?;
    Ok(serde_json::to_value(result.rounded())?)
}

pub fn run_alerts(args: AlertsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut alert_input: AlertInput = input::load(args.input.as_deref(), "loan alerts")?;
    if let Some(now) = args.now {
        alert_input.now = now;
    }
    let result = alerts::compute_alerts(&alert_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_portfolio_alerts(
    args: PortfolioAlertsArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut alert_input: PortfolioAlertInput =
        input::load(args.input.as_deref(), "portfolio alerts")?;
    if let Some(now) = args.now {
        alert_input.now = now;
    }
    let result = alerts::portfolio_alerts(&alert_input)?;
    Ok(serde_json::to_value(result)?)
}
