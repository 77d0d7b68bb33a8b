//! Output formatting utilities.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;

const PADDING: usize = 4;
const INDEX_WIDTH: usize = 7;

/// Formats a title framed by asterisks.
pub fn title_block(title: &str) -> String {
    let title = title.to_uppercase();
    let frame = "*".repeat(title.chars().count() + 6);
    format!("{}\n*  {}  *\n{}", frame, title, frame)
}

pub fn print_title(title: &str) {
    println!("{}", title_block(title));
}

/// Formats a value as pretty JSON.
pub fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats objects as a right-aligned table with a leading index column.
///
/// Columns are the union of all keys in first-seen order. Non-string cells are
/// rendered as compact JSON.
pub fn format_indexed_table(rows: &[Value]) -> String {
    let mut columns: Vec<String> = Vec::new();
    let mut seen = BTreeSet::new();
    for row in rows {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if seen.insert(key.clone()) {
                    columns.push(key.clone());
                }
            }
        }
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|col| cell_text(row.get(col))).collect())
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(col.chars().count()))
                .max()
                .unwrap_or(0)
                + PADDING
        })
        .collect();

    let mut header = format!("{:>width$}", "index", width = INDEX_WIDTH);
    for (col, width) in columns.iter().zip(&widths) {
        header.push_str(&format!("{:>width$}", col, width = *width));
    }
    let divider = "-".repeat(INDEX_WIDTH + widths.iter().sum::<usize>());

    let mut lines = vec![header, divider];
    for (i, row) in cells.iter().enumerate() {
        let mut line = format!("{:>width$}", i, width = INDEX_WIDTH);
        for (cell, width) in row.iter().zip(&widths) {
            line.push_str(&format!("{:>width$}", cell, width = *width));
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Prints a numbered error list, or a placeholder when there are none.
pub fn print_errors<E: std::fmt::Display>(errors: &[E]) {
    if errors.is_empty() {
        println!("(no errors)");
        return;
    }
    for (i, error) in errors.iter().enumerate() {
        println!("{:>3}. {}", i + 1, error);
    }
}
