use clap::Args;
use serde_json::{json, Value};

use loanwise_core::loan::portfolio::{self, PortfolioInput};
use loanwise_core::loan::{Loan, LoanView};
use loanwise_core::RoundCurrency;

use crate::input;

#[derive(Args)]
pub struct PortfolioArgs {
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for recording paid installments against a loan
#[derive(Args)]
pub struct RecordInstallmentArgs {
    /// Path to a JSON/YAML loan record
    #[arg(long)]
    pub input: Option<String>,

    /// Number of consecutive installments to record
    #[arg(long, default_value_t = 1)]
    pub count: u32,
}

pub fn run_portfolio(args: PortfolioArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let portfolio_input: PortfolioInput = input::load(args.input.as_deref(), "portfolio summary")?;
    let result = portfolio::summarize_portfolio(&portfolio_input)?;
    Ok(serde_json::to_value(result.rounded())?)
}

pub fn run_record_installment(
    args: RecordInstallmentArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut loan: Loan = input::load(args.input.as_deref(), "installment recording")?;
    let recorded = loan.record_installments(args.count)?.rounded();

    Ok(json!({
        "result": {
            "loan": LoanView::from(&loan).rounded(),
            "recorded": recorded,
        },
        "methodology": "Scheduled installments marked paid in order",
        "warnings": [],
    }))
}
