use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use std::str::FromStr;

use loanwise_core::RoundCurrency;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse_decimal(field: &str, raw: &str) -> NapiResult<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|e| to_napi_error(format!("{field}: '{raw}' is not a decimal ({e})")))
}

// ---------------------------------------------------------------------------
// Amortization
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_emi(input_json: String) -> NapiResult<String> {
    let input: loanwise_core::amortization::math::EmiInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        loanwise_core::amortization::math::calculate_emi(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output.rounded()).map_err(to_napi_error)
}

/// Bare installment amount, for form previews that only need one number.
#[napi]
pub fn compute_emi(
    principal: String,
    annual_rate_pct: String,
    tenure_months: u32,
) -> NapiResult<String> {
    let principal = parse_decimal("principal", &principal)?;
    let rate = parse_decimal("annual_rate_pct", &annual_rate_pct)?;
    let emi = loanwise_core::amortization::compute_emi(principal, rate, tenure_months)
        .map_err(to_napi_error)?;
    Ok(loanwise_core::round_currency(emi).to_string())
}

#[napi]
pub fn build_schedule(input_json: String) -> NapiResult<String> {
    let input: loanwise_core::amortization::schedule::ScheduleInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = loanwise_core::amortization::schedule::generate_schedule(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output.rounded()).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Loans
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct RecordInstallmentBindingInput {
    loan: loanwise_core::loan::Loan,
    #[serde(default = "one")]
    count: u32,
}

fn one() -> u32 {
    1
}

/// Record `count` installments and return the updated loan record, ready to
/// be persisted by the caller.
#[napi]
pub fn record_installment(input_json: String) -> NapiResult<String> {
    let mut binding_input: RecordInstallmentBindingInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let recorded = binding_input
        .loan
        .record_installments(binding_input.count)
        .map_err(to_napi_error)?
        .rounded();
    let output = serde_json::json!({
        "loan": loanwise_core::loan::LoanView::from(&binding_input.loan).rounded(),
        "record": binding_input.loan.to_input(),
        "recorded": recorded,
    });
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn summarize_portfolio(input_json: String) -> NapiResult<String> {
    let input: loanwise_core::loan::portfolio::PortfolioInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        loanwise_core::loan::portfolio::summarize_portfolio(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output.rounded()).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[napi]
pub fn run_scenario(input_json: String) -> NapiResult<String> {
    let input: loanwise_core::simulation::scenarios::SimulationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        loanwise_core::simulation::scenarios::run_scenario(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output.rounded()).map_err(to_napi_error)
}

#[napi]
pub fn compare_scenarios(input_json: String) -> NapiResult<String> {
    let input: loanwise_core::simulation::scenarios::ScenarioComparisonInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = loanwise_core::simulation::scenarios::compare_scenarios(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output.rounded()).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

#[napi]
pub fn optimize_strategies(input_json: String) -> NapiResult<String> {
    let input: loanwise_core::strategy::payoff::StrategyInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        loanwise_core::strategy::payoff::optimize_strategies(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output.rounded()).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

#[napi]
pub fn assess_loan_to_income(input_json: String) -> NapiResult<String> {
    let input: loanwise_core::risk::ratio::LoanToIncomeInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        loanwise_core::risk::ratio::assess_loan_to_income(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output.rounded()).map_err(to_napi_error)
}

#[napi]
pub fn compute_alerts(input_json: String) -> NapiResult<String> {
    let input: loanwise_core::risk::alerts::AlertInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = loanwise_core::risk::alerts::compute_alerts(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn portfolio_alerts(input_json: String) -> NapiResult<String> {
    let input: loanwise_core::risk::alerts::PortfolioAlertInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        loanwise_core::risk::alerts::portfolio_alerts(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
