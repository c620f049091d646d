pub mod model;
pub mod portfolio;

pub use model::{Loan, LoanInput, LoanStatus, LoanView};
