//! `test budget-client` - check credentials, optionally with a live list call.

use gcp_budget_csv::client::BillingClient;
use gcp_budget_csv::Config;

use crate::commands::list::budget_rows;
use crate::output;

pub async fn run(config: &Config, list: bool) -> anyhow::Result<()> {
    output::print_title("Result from Budget Client test:");
    let Some(credentials) = config.credentials()? else {
        println!("no credentials available for Google Cloud authentication");
        return Ok(());
    };
    println!("Google Cloud credentials provided ({})", credentials.describe());
    println!("endpoint: {}", config.endpoint);

    if list {
        let client = config.client()?;
        let budgets = client.list(None).await?;
        println!("{} budget(s) found", budgets.len());
        println!("{}", output::format_indexed_table(&budget_rows(&budgets)));
    }
    Ok(())
}
