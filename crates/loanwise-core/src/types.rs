use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::LoanEngineError;
use crate::LoanEngineResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Periodic rates expressed as decimals (0.0075 = 0.75% per month).
pub type Rate = Decimal;

/// Annual rates and ratios expressed as percentages (8.5 = 8.5%).
pub type Percent = Decimal;

/// Decimal places used when presenting currency amounts.
pub const CURRENCY_DP: u32 = 2;

/// Round a monetary amount for presentation (half away from zero).
pub fn round_currency(amount: Money) -> Money {
    amount.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Sum amounts across loans, failing with `InvalidLoanParameters` on
/// `field` when the total leaves the decimal range.
pub(crate) fn checked_sum<I>(amounts: I, field: &str) -> LoanEngineResult<Money>
where
    I: IntoIterator<Item = Money>,
{
    amounts.into_iter().try_fold(Decimal::ZERO, |total, amount| {
        total.checked_add(amount).ok_or_else(|| {
            LoanEngineError::loan_params(field, "Total exceeds the supported decimal range")
        })
    })
}

/// Output types that can be rounded to currency precision at the
/// presentation boundary. Engine internals never call this.
pub trait RoundCurrency {
    fn rounded(&self) -> Self;
}

impl<T: RoundCurrency> RoundCurrency for Vec<T> {
    fn rounded(&self) -> Self {
        self.iter().map(RoundCurrency::rounded).collect()
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

impl<T: Serialize + RoundCurrency> ComputationOutput<T> {
    /// Copy of the envelope with the result rounded for display.
    pub fn rounded(&self) -> Self {
        ComputationOutput {
            result: self.result.rounded(),
            methodology: self.methodology.clone(),
            assumptions: self.assumptions.clone(),
            warnings: self.warnings.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
