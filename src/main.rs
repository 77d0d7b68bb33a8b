//! gcp-budget-csv - create Cloud Billing budgets from CSV or JSON files.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gcp_budget_csv::Config;

mod commands;
mod output;

use commands::{budget_class, budget_client, create, list, parser};

#[derive(Parser)]
#[command(name = "gcp-budget-csv")]
#[command(about = "Create Cloud Billing budgets from CSV or JSON files")]
#[command(version)]
struct Cli {
    /// Config file (default: ./budget-csv.json if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Diagnostics for the parser, the budget assembler and the API client
    Test {
        #[command(subcommand)]
        action: TestAction,
    },
    /// Create budgets from a CSV or JSON file
    Create {
        /// Path to the budgets file
        file: PathBuf,
        /// Billing account to create budgets under
        #[arg(long)]
        billing_account: Option<String>,
        /// Global thresholds file (CSV or JSON array)
        #[arg(long)]
        thresholds: Option<PathBuf>,
        /// Output results as JSON
        #[arg(long)]
        json: bool,
        /// Assemble and print the budgets without calling the API
        #[arg(long)]
        dry_run: bool,
    },
    /// List budgets under a billing account
    List {
        /// Billing account to list
        #[arg(long)]
        billing_account: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum TestAction {
    /// Parse a CSV file and show the resulting rows and parse errors
    Parser {
        /// Path to the file
        file: PathBuf,
    },
    /// Assemble one budget in debug mode from sample or supplied JSON
    BudgetClass {
        /// Budget JSON (name, amount, scopes, notification_channels, options)
        budget_json: Option<String>,
        /// Thresholds JSON array
        threshold_json: Option<String>,
    },
    /// Check that API credentials are available
    BudgetClient {
        /// Also list budgets under the configured billing account
        #[arg(long)]
        list: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Test {
            action: TestAction::Parser { file },
        } => parser::run(&file),
        Commands::Test {
            action:
                TestAction::BudgetClass {
                    budget_json,
                    threshold_json,
                },
        } => budget_class::run(budget_json.as_deref(), threshold_json.as_deref()),
        Commands::Test {
            action: TestAction::BudgetClient { list },
        } => {
            let config = Config::load(cli.config.as_deref())?;
            budget_client::run(&config, list).await
        }
        Commands::Create {
            file,
            billing_account,
            thresholds,
            json,
            dry_run,
        } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if billing_account.is_some() {
                config.billing_account = billing_account;
            }
            if thresholds.is_some() {
                config.thresholds_file = thresholds;
            }
            create::run(&config, &file, json, dry_run).await
        }
        Commands::List {
            billing_account,
            json,
        } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if billing_account.is_some() {
                config.billing_account = billing_account;
            }
            list::run(&config, json).await
        }
    }
}
