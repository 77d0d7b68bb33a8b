//! `test parser` - show how a budgets file is tokenized.

use std::path::Path;

use serde_json::Value;

use gcp_budget_csv::error::FileKind;
use gcp_budget_csv::input::{parse_table, read_input};

use crate::output;

pub fn run(file: &Path) -> anyhow::Result<()> {
    let text = read_input(file, FileKind::Budgets)?;
    let table = parse_table(&text);

    output::print_title(&format!("Result from parsing file '{}':", file.display()));
    println!("headers: {}", table.headers.join(", "));
    let rows: Vec<Value> = table
        .data
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()?;
    println!("{}", output::format_indexed_table(&rows));
    println!();
    println!("errors:");
    output::print_errors(&table.errors);
    Ok(())
}
