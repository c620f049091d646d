use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use loanwise_core::strategy::payoff::{self, StrategyInput};

use crate::input;

/// Arguments for snowball / avalanche payoff planning
#[derive(Args)]
pub struct StrategiesArgs {
    /// Loans and optional extra budget (JSON/YAML)
    #[arg(long)]
    pub input: Option<String>,

    /// Override the extra monthly budget from the input file
    #[arg(long)]
    pub extra_budget: Option<Decimal>,
}

pub fn run_strategies(args: StrategiesArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut strategy_input: StrategyInput =
        input::load(args.input.as_deref(), "payoff strategies")?;
    if let Some(extra) = args.extra_budget {
        strategy_input.extra_budget = extra;
    }
    let result = payoff::optimize_strategies(&strategy_input)?;
    Ok(serde_json::to_value(result.rounded())?)
}
