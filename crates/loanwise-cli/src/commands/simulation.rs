use clap::Args;
use serde_json::Value;

use loanwise_core::simulation::scenarios::{self, ScenarioComparisonInput, SimulationInput};

use crate::input;

#[derive(Args)]
pub struct SimulateArgs {
    /// Loan plus a single scenario (JSON/YAML)
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Args)]
pub struct CompareScenariosArgs {
    /// Loan plus a list of scenarios (JSON/YAML)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_simulate(args: SimulateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let sim_input: SimulationInput = input::load(args.input.as_deref(), "scenario simulation")?;
    let result = scenarios::run_scenario(&sim_input)?;
    Ok(serde_json::to_value(result.rounded())?)
}

pub fn run_compare_scenarios(
    args: CompareScenariosArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let cmp_input: ScenarioComparisonInput =
        input::load(args.input.as_deref(), "scenario comparison")?;
    let result = scenarios::compare_scenarios(&cmp_input)?;
    Ok(serde_json::to_value(result.rounded())?)
}
