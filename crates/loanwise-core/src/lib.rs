pub mod amortization;
pub mod error;
pub mod loan;
pub mod types;

#[cfg(feature = "simulation")]
pub mod simulation;

#[cfg(feature = "strategy")]
pub mod strategy;

#[cfg(feature = "risk")]
pub mod risk;

pub use error::LoanEngineError;
pub use types::*;

/// Standard result type for all loan engine operations
pub type LoanEngineResult<T> = Result<T, LoanEngineError>;
