//! `create` - assemble budgets from a file and submit them.

use std::path::Path;

use anyhow::Context;
use serde_json::{json, Value};

use gcp_budget_csv::batch::{build_budgets, create_budgets, BatchBuild, BatchInput, CreateReport};
use gcp_budget_csv::resolve::GlobalThresholds;
use gcp_budget_csv::{BudgetError, Config};

use crate::output;

pub async fn run(config: &Config, file: &Path, json: bool, dry_run: bool) -> anyhow::Result<()> {
    let input = BatchInput::load(file)?;
    let (global, global_error) = GlobalThresholds::load(config.thresholds_file.as_deref());

    let mut prior_errors = input.errors;
    prior_errors.extend(global_error);
    let build = build_budgets(&input.rows, &global, prior_errors)?;
    let warnings = build.warnings();

    if dry_run {
        print_dry_run(&build, &warnings, json);
        return Ok(());
    }

    let account = config
        .billing_account
        .as_deref()
        .context("no billing account: pass --billing-account or set BILLING_ACCOUNT_ID")?;
    let client = config.client()?;

    match create_budgets(&client, account, build).await {
        Ok(report) => {
            print_report(&report, &warnings, json);
            Ok(())
        }
        Err(BudgetError::NoBudgetsCreated(errors)) => {
            if json {
                println!("{}", output::format_json(&json!({"created": [], "errors": errors})));
            } else {
                output::print_title("No budgets were created");
                output::print_errors(&errors);
            }
            anyhow::bail!("no budgets were created ({} error(s))", errors.len())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_dry_run(build: &BatchBuild, warnings: &[String], json: bool) {
    let budgets: Vec<_> = build.budgets().collect();
    let errors: Vec<String> = build.errors.iter().map(ToString::to_string).collect();
    if json {
        println!(
            "{}",
            output::format_json(&json!({"budgets": budgets, "warnings": warnings, "errors": errors}))
        );
        return;
    }
    output::print_title(&format!("Dry run: {} budget(s) assembled", budgets.len()));
    for budget in &budgets {
        println!("{}", output::format_json(budget));
    }
    print_warnings(warnings);
    println!();
    println!("errors:");
    output::print_errors(&errors);
}

fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!();
    println!("warnings:");
    output::print_errors(warnings);
}

fn print_report(report: &CreateReport, warnings: &[String], json: bool) {
    let created: Vec<Value> = report
        .created
        .iter()
        .map(|c| {
            json!({
                "row": (c.row + 1).to_string(),
                "name": c.budget.name,
                "displayName": c.budget.display_name.as_deref().unwrap_or_default(),
            })
        })
        .collect();
    let errors: Vec<String> = report.errors.iter().map(ToString::to_string).collect();

    if json {
        println!(
            "{}",
            output::format_json(&json!({"created": created, "warnings": warnings, "errors": errors}))
        );
        return;
    }
    output::print_title(&format!("Created {} budget(s)", created.len()));
    println!("{}", output::format_indexed_table(&created));
    print_warnings(warnings);
    println!();
    println!("errors:");
    output::print_errors(&errors);
}
