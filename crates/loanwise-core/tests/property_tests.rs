use chrono::NaiveDate;
use loanwise_core::amortization::math::compute_emi;
use loanwise_core::amortization::schedule::build_schedule;
use loanwise_core::loan::{Loan, LoanInput};
use loanwise_core::simulation::scenarios::{simulate_increased_emi, simulate_lump_sum};
use loanwise_core::strategy::payoff::{plan_payoff, PayoffMethod};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Principal between 1,000 and 5,000,000 in whole currency units.
fn arb_principal() -> impl Strategy<Value = Decimal> {
    (1_000u64..5_000_000u64).prop_map(Decimal::from)
}

/// Annual rate between 0% and 36% in steps of 0.05%.
fn arb_rate() -> impl Strategy<Value = Decimal> {
    (0u32..=720u32).prop_map(|bp| Decimal::new(i64::from(bp) * 5, 2))
}

fn arb_tenure() -> impl Strategy<Value = u32> {
    1u32..=360u32
}

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn tolerance() -> Decimal {
    Decimal::new(1, 6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // ===================================================================
    // Schedules repay exactly the principal and end at zero.
    // ===================================================================
    #[test]
    fn schedule_repays_principal(
        principal in arb_principal(),
        rate in arb_rate(),
        tenure in arb_tenure(),
    ) {
        let schedule = build_schedule(principal, rate, tenure, start()).unwrap();
        prop_assert_eq!(schedule.len(), tenure as usize);
        prop_assert_eq!(schedule.last().unwrap().remaining_balance, Decimal::ZERO);
        prop_assert!((schedule.total_principal() - principal).abs() < tolerance());
        prop_assert!(schedule.iter().all(|i| i.remaining_balance >= Decimal::ZERO));
    }

    // ===================================================================
    // Building twice yields the same schedule.
    // ===================================================================
    #[test]
    fn schedule_is_deterministic(
        principal in arb_principal(),
        rate in arb_rate(),
        tenure in arb_tenure(),
    ) {
        let a = build_schedule(principal, rate, tenure, start()).unwrap();
        let b = build_schedule(principal, rate, tenure, start()).unwrap();
        prop_assert_eq!(a, b);
    }

    // ===================================================================
    // A zero rate divides the principal evenly.
    // ===================================================================
    #[test]
    fn zero_rate_emi_is_even_split(principal in arb_principal(), tenure in arb_tenure()) {
        let emi = compute_emi(principal, Decimal::ZERO, tenure).unwrap();
        prop_assert_eq!(emi, principal / Decimal::from(tenure));
    }

    // ===================================================================
    // Paying the current EMI is not an acceleration; any faster payment
    // never takes longer than the original tenure.
    // ===================================================================
    #[test]
    fn increased_emi_never_extends_tenure(
        principal in arb_principal(),
        rate in arb_rate(),
        tenure in 2u32..=360u32,
        bump in 1u64..10_000u64,
    ) {
        let loan = Loan::new(LoanInput::new("p", principal, rate, tenure, start())).unwrap();
        prop_assert!(simulate_increased_emi(&loan, loan.monthly_installment()).is_err());

        let faster = loan.monthly_installment() + Decimal::from(bump);
        let result = simulate_increased_emi(&loan, faster).unwrap();
        prop_assert!(result.time_to_payoff <= tenure);
        prop_assert!(result.savings.interest_saved >= -tolerance());
        prop_assert_eq!(result.schedule.last().unwrap().remaining_balance, Decimal::ZERO);
    }

    // ===================================================================
    // Paying one extra installment's worth spread over the tenure always
    // clears the loan early.
    // ===================================================================
    #[test]
    fn substantial_increase_shortens_tenure(
        principal in arb_principal(),
        rate in arb_rate(),
        tenure in 2u32..=360u32,
    ) {
        let loan = Loan::new(LoanInput::new("p", principal, rate, tenure, start())).unwrap();
        let emi = loan.monthly_installment();
        let faster = emi + emi / Decimal::from(tenure - 1) + Decimal::ONE;
        let result = simulate_increased_emi(&loan, faster).unwrap();
        prop_assert!(result.time_to_payoff < tenure);
        prop_assert!(result.savings.time_saved > 0);
    }

    // ===================================================================
    // Lump sums never increase total interest.
    // ===================================================================
    #[test]
    fn lump_sum_never_costs_interest(
        principal in arb_principal(),
        rate in arb_rate(),
        tenure in arb_tenure(),
        fraction in 1u32..=100u32,
        month_seed in any::<u32>(),
    ) {
        let loan = Loan::new(LoanInput::new("p", principal, rate, tenure, start())).unwrap();
        let month = month_seed % tenure + 1;
        let amount = principal * Decimal::from(fraction) / Decimal::from(100u32);
        let result = simulate_lump_sum(&loan, amount, month).unwrap();
        prop_assert!(result.total_interest <= loan.total_interest() + tolerance());
        prop_assert!(result.time_to_payoff <= tenure);
    }

    // ===================================================================
    // Cascading freed installments never costs more than the baseline.
    // ===================================================================
    #[test]
    fn zero_extra_budget_never_worse_than_baseline(
        p1 in arb_principal(),
        p2 in arb_principal(),
        r1 in arb_rate(),
        r2 in arb_rate(),
        t1 in arb_tenure(),
        t2 in arb_tenure(),
    ) {
        let loans = vec![
            Loan::new(LoanInput::new("a", p1, r1, t1, start())).unwrap(),
            Loan::new(LoanInput::new("b", p2, r2, t2, start())).unwrap(),
        ];
        let plan = plan_payoff(&loans, Decimal::ZERO, PayoffMethod::Avalanche).unwrap();
        prop_assert!(plan.total_interest_saved > -Decimal::new(1, 4));
        prop_assert!(plan.time_to_payoff <= plan.baseline_time_to_payoff);
    }
}
