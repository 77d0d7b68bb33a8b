//! `list` - budgets under a billing account.

use anyhow::Context;
use serde_json::{json, Value};

use gcp_budget_csv::client::{BillingClient, RemoteBudget};
use gcp_budget_csv::Config;

use crate::output;

pub async fn run(config: &Config, json: bool) -> anyhow::Result<()> {
    let account = config
        .billing_account
        .as_deref()
        .context("no billing account: pass --billing-account or set BILLING_ACCOUNT_ID")?;
    let client = config.client()?;
    let budgets = client.list(Some(account)).await?;

    if json {
        println!("{}", output::format_json(&budgets));
        return Ok(());
    }
    output::print_title(&format!("{} budget(s)", budgets.len()));
    println!("{}", output::format_indexed_table(&budget_rows(&budgets)));
    Ok(())
}

/// One table row per budget: resource name and display name.
pub fn budget_rows(budgets: &[RemoteBudget]) -> Vec<Value> {
    budgets
        .iter()
        .map(|b| {
            json!({
                "name": b.name,
                "displayName": b.display_name.as_deref().unwrap_or_default(),
            })
        })
        .collect()
}
