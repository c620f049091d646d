pub mod scenarios;

pub use scenarios::{
    simulate_increased_emi, simulate_lump_sum, simulate_refinance, ScenarioRequest,
    SimulationResult,
};
