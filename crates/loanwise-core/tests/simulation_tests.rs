use chrono::NaiveDate;
use loanwise_core::loan::{Loan, LoanInput};
use loanwise_core::simulation::scenarios::{
    self, ScenarioComparisonInput, ScenarioRequest, SimulationInput,
};
use loanwise_core::{LoanEngineError, RoundCurrency};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn reference_loan() -> Loan {
    Loan::new(LoanInput::new(
        "home",
        dec!(100000),
        dec!(8.5),
        60,
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    ))
    .unwrap()
}

fn part_paid(paid: u32) -> Loan {
    let mut input = reference_loan().to_input();
    input.paid_installments = paid;
    Loan::new(input).unwrap()
}

// ===========================================================================
// Increased EMI
// ===========================================================================

#[test]
fn test_double_emi_roughly_halves_tenure() {
    let loan = reference_loan();
    let result =
        scenarios::simulate_increased_emi(&loan, loan.monthly_installment() * dec!(2)).unwrap();
    assert!(
        result.time_to_payoff > 25 && result.time_to_payoff < 32,
        "unexpected payoff month {}",
        result.time_to_payoff
    );
    assert_eq!(result.savings.time_saved, 60 - result.time_to_payoff as i64);
    assert!(result.total_interest < loan.total_interest());
}

#[test]
fn test_increased_emi_keeps_paid_prefix() {
    let loan = part_paid(10);
    let result = scenarios::simulate_increased_emi(&loan, dec!(3000)).unwrap();
    assert_eq!(result.schedule.paid_count(), 10);
    assert_eq!(result.schedule.items()[10].month, 11);
    assert!(result.time_to_payoff < 60);
    assert_eq!(result.schedule.last().unwrap().remaining_balance, Decimal::ZERO);
}

#[test]
fn test_smaller_emi_is_rejected() {
    let loan = reference_loan();
    assert!(matches!(
        scenarios::simulate_increased_emi(&loan, dec!(1500)),
        Err(LoanEngineError::InvalidScenario { .. })
    ));
}

// ===========================================================================
// Lump sum
// ===========================================================================

#[test]
fn test_lump_sum_clearing_balance_at_month_one() {
    let loan = reference_loan();
    let result = scenarios::simulate_lump_sum(&loan, dec!(100000), 1).unwrap();
    assert_eq!(result.time_to_payoff, 1);
    assert_eq!(result.total_interest, Decimal::ZERO);
    assert_eq!(result.lump_sum_applied, Some(dec!(100000)));
    assert_eq!(result.schedule.len(), 1);
}

#[test]
fn test_later_lump_sum_saves_less() {
    let loan = reference_loan();
    let early = scenarios::simulate_lump_sum(&loan, dec!(10000), 6).unwrap();
    let late = scenarios::simulate_lump_sum(&loan, dec!(10000), 48).unwrap();
    assert!(early.savings.interest_saved > late.savings.interest_saved);
    assert!(late.savings.interest_saved > Decimal::ZERO);
}

#[test]
fn test_lump_sum_excess_relative_to_current_balance() {
    let loan = part_paid(30);
    let outstanding = loan.balance_after(30);
    let result = scenarios::simulate_lump_sum(&loan, outstanding + dec!(1000), 31).unwrap();
    assert_eq!(result.time_to_payoff, 31);
    let excess = result.lump_sum_excess.unwrap();
    assert!((excess - dec!(1000)).abs() < dec!(0.0000001));
}

// ===========================================================================
// Refinance and comparison
// ===========================================================================

#[test]
fn test_refinance_after_two_years() {
    let loan = part_paid(24);
    let result = scenarios::simulate_refinance(&loan, dec!(7)).unwrap();
    assert_eq!(result.time_to_payoff, 60);
    assert!(result.savings.interest_saved > Decimal::ZERO);

    let refinanced = loan.refinanced(dec!(7)).unwrap();
    assert!((refinanced.monthly_installment() - result.monthly_emi).abs() < dec!(0.0000001));
    assert_eq!(refinanced.tenure_months(), 36);
}

#[test]
fn test_run_scenario_warns_on_negative_savings() {
    let out = scenarios::run_scenario(&SimulationInput {
        loan: reference_loan(),
        scenario: ScenarioRequest::Refinance {
            new_annual_rate_pct: dec!(11),
        },
    })
    .unwrap();
    assert!(out.result.savings.interest_saved < Decimal::ZERO);
    assert!(!out.warnings.is_empty());
}

#[test]
fn test_compare_scenarios_rejects_empty_and_rounds() {
    let empty = ScenarioComparisonInput {
        loan: reference_loan(),
        scenarios: Vec::new(),
    };
    assert!(scenarios::compare_scenarios(&empty).is_err());

    let input = ScenarioComparisonInput {
        loan: reference_loan(),
        scenarios: vec![
            ScenarioRequest::LumpSum {
                amount: dec!(25000),
                apply_at_month: 2,
            },
            ScenarioRequest::IncreasedEmi { new_emi: dec!(2200) },
        ],
    };
    let out = scenarios::compare_scenarios(&input).unwrap().rounded();
    assert_eq!(out.result.len(), 2);
    assert!(out.result[0].scenario_name.starts_with("Lump sum"));
    assert!(out.result.iter().all(|r| r.total_interest.scale() <= 2));
}

#[test]
fn test_scenario_request_json_shape() {
    let json = r#"{"LumpSum":{"amount":"5000","apply_at_month":12}}"#;
    let request: ScenarioRequest = serde_json::from_str(json).unwrap();
    assert_eq!(
        request,
        ScenarioRequest::LumpSum {
            amount: dec!(5000),
            apply_at_month: 12
        }
    );
}
