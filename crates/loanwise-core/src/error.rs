use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoanEngineError {
    #[error("Invalid loan parameters: {field} — {reason}")]
    InvalidLoanParameters { field: String, reason: String },

    #[error("Invalid scenario: {field} — {reason}")]
    InvalidScenario { field: String, reason: String },

    #[error("Invalid income: {field} — {reason}")]
    InvalidIncome { field: String, reason: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LoanEngineError {
    pub(crate) fn loan_params(field: &str, reason: impl Into<String>) -> Self {
        LoanEngineError::InvalidLoanParameters {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn scenario(field: &str, reason: impl Into<String>) -> Self {
        LoanEngineError::InvalidScenario {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for LoanEngineError {
    fn from(e: serde_json::Error) -> Self {
        LoanEngineError::SerializationError(e.to_string())
    }
}
