mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::amortization::{EmiArgs, ScheduleArgs};
use commands::loan::{PortfolioArgs, RecordInstallmentArgs};
use commands::risk::{AlertsArgs, LoanToIncomeArgs, PortfolioAlertsArgs};
use commands::simulation::{CompareScenariosArgs, SimulateArgs};
use commands::strategy::StrategiesArgs;

/// Loan amortization, what-if simulation and payoff planning
#[derive(Parser)]
#[command(
    name = "loanwise",
    version,
    about = "Loan amortization, what-if simulation and payoff planning",
    long_about = "A CLI for loan calculations with decimal precision. Computes EMIs and \
                  repayment schedules, simulates prepayment and refinancing scenarios, \
                  plans snowball/avalanche payoffs and flags debt-burden risks."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log engine decisions to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the equated monthly installment and lifetime totals
    Emi(EmiArgs),
    /// Build the full repayment schedule
    Schedule(ScheduleArgs),
    /// Run one what-if scenario against a loan
    Simulate(SimulateArgs),
    /// Run several scenarios and rank them by interest saved
    CompareScenarios(CompareScenariosArgs),
    /// Snowball and avalanche payoff plans for a set of loans
    Strategies(StrategiesArgs),
    /// EMI burden as a share of monthly income
    LoanToIncome(LoanToIncomeArgs),
    /// Due-soon, overdue and EMI burden alerts for one loan
    Alerts(AlertsArgs),
    /// Alerts across a set of loans, most severe first
    PortfolioAlerts(PortfolioAlertsArgs),
    /// Aggregate figures for a set of loans
    Portfolio(PortfolioArgs),
    /// Mark the next scheduled installment(s) of a loan as paid
    RecordInstallment(RecordInstallmentArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Emi(args) => commands::amortization::run_emi(args),
        Commands::Schedule(args) => commands::amortization::run_schedule(args),
        Commands::Simulate(args) => commands::simulation::run_simulate(args),
        Commands::CompareScenarios(args) => commands::simulation::run_compare_scenarios(args),
        Commands::Strategies(args) => commands::strategy::run_strategies(args),
        Commands::LoanToIncome(args) => commands::risk::run_loan_to_income(args),
        Commands::Alerts(args) => commands::risk::run_alerts(args),
        Commands::PortfolioAlerts(args) => commands::risk::run_portfolio_alerts(args),
        Commands::Portfolio(args) => commands::loan::run_portfolio(args),
        Commands::RecordInstallment(args) => commands::loan::run_record_installment(args),
        Commands::Version => {
            println!("loanwise {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            log::debug!("command failed: {e:?}");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
