pub mod alerts;
pub mod ratio;

pub use alerts::{alerts_for_loan, Alert, AlertConfig, AlertType, Severity};
pub use ratio::{assess_ratio, loan_to_income_ratio, LoanToIncomeReport, RiskLevel};
