//! `test budget-class` - assemble one budget in debug mode.

use anyhow::Context;

use gcp_budget_csv::budget::{
    assemble_debug, BudgetOptions, BudgetSpec, NotificationChannels, RawThreshold,
    ScopeDescriptor,
};

use crate::output;

/// Used when no budget JSON is given.
fn sample_spec() -> BudgetSpec {
    BudgetSpec {
        name: Some("Sample project budget".to_string()),
        amount: Some("1250.75".to_string()),
        scopes: vec![
            ScopeDescriptor::project("sample-project"),
            ScopeDescriptor::label_value("env", "prod"),
        ],
        thresholds: vec![RawThreshold::new(50, false), RawThreshold::new(100, true)],
        notification_channels: NotificationChannels::single(
            "projects/sample-project/notificationChannels/123",
        ),
        options: BudgetOptions {
            currency: Some("usd".to_string()),
            ..BudgetOptions::default()
        },
    }
}

pub fn run(budget_json: Option<&str>, threshold_json: Option<&str>) -> anyhow::Result<()> {
    let mut spec = match budget_json.filter(|s| !s.trim().is_empty()) {
        Some(text) => serde_json::from_str::<BudgetSpec>(text).context("Invalid budget JSON")?,
        None => sample_spec(),
    };
    if let Some(text) = threshold_json.filter(|s| !s.trim().is_empty()) {
        spec.thresholds =
            serde_json::from_str::<Vec<RawThreshold>>(text).context("Invalid threshold JSON")?;
    }

    let debug = assemble_debug(&spec)?;

    output::print_title("Result from Budget Class test:");
    println!("resolved arguments:");
    println!("{}", output::format_json(&debug.resolved));
    println!();
    println!("budget:");
    println!("{}", output::format_json(&debug.assembly.budget));
    if !debug.assembly.warnings.is_empty() {
        println!();
        println!("warnings:");
        output::print_errors(&debug.assembly.warnings);
    }
    Ok(())
}
