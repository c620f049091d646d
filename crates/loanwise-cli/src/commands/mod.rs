pub mod amortization;
pub mod loan;
pub mod risk;
pub mod simulation;
pub mod strategy;
