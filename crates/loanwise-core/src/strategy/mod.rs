pub mod payoff;

pub use payoff::{optimize_strategies, plan_payoff, PayoffMethod, StrategyPlan};
