//! Batch orchestration: input rows to budgets, and budgets to the remote API.
//!
//! The only all-or-nothing step is the structural check in [`validate_rows`].
//! After it passes, every problem is tied to a row and collected.

use std::path::Path;

use futures::future::join_all;
use serde_json::Value;

use crate::budget::Budget;
use crate::client::{BillingClient, RemoteBudget};
use crate::error::{BudgetError, FileKind, Result};
use crate::input::{parse_table, read_input, RawRow};
use crate::resolve::{columns, resolve_row, GlobalThresholds, RowError, RowResult};

/// Rows loaded from a budgets file, plus any non-fatal tokenizer problems.
#[derive(Debug, Clone, Default)]
pub struct BatchInput {
    pub rows: Vec<RawRow>,
    pub errors: Vec<BudgetError>,
}

impl BatchInput {
    /// Tabular text; tokenizer issues are kept as parse errors.
    pub fn from_csv(text: &str) -> Self {
        let table = parse_table(text);
        Self {
            rows: table.data,
            errors: table.errors.into_iter().map(BudgetError::from).collect(),
        }
    }

    /// A JSON array of row objects.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(BudgetError::InvalidBatch("input must be an array of rows".into()));
        };
        let rows = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                RawRow::from_value(item).ok_or_else(|| {
                    BudgetError::InvalidBatch(format!("row {} is not an object", i + 1))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rows,
            errors: Vec::new(),
        })
    }

    /// Read a budgets file; JSON if it looks like JSON, tabular otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_input(path, FileKind::Budgets)?;
        let looks_like_json = path.extension().is_some_and(|ext| ext == "json")
            || text.trim_start().starts_with('[');
        if looks_like_json {
            let value: Value = serde_json::from_str(&text)
                .map_err(|e| BudgetError::InvalidBatch(format!("budgets file is not valid JSON: {}", e)))?;
            Self::from_json(value)
        } else {
            Ok(Self::from_csv(&text))
        }
    }
}

/// Structural pre-check of the whole input. Any failure rejects the batch.
pub fn validate_rows(rows: &[RawRow]) -> Result<()> {
    if rows.is_empty() {
        return Err(BudgetError::InvalidBatch("input contains no rows".into()));
    }
    for (i, row) in rows.iter().enumerate() {
        let missing = |field: &str| {
            BudgetError::InvalidBatch(format!("row {} is missing required field '{}'", i + 1, field))
        };
        let scope_type = row
            .text(columns::SCOPE_TYPE)
            .ok_or_else(|| missing(columns::SCOPE_TYPE))?;
        if scope_type.eq_ignore_ascii_case("label") {
            for field in [columns::SCOPE_KEY, columns::SCOPE_VALUE] {
                if !row.has_text(field) {
                    return Err(missing(field));
                }
            }
        } else if !row.has_text(columns::SCOPE_ID) {
            return Err(missing(columns::SCOPE_ID));
        }
    }
    Ok(())
}

/// Every row's outcome plus the combined error list.
#[derive(Debug, Clone, Default)]
pub struct BatchBuild {
    pub rows: Vec<RowResult>,
    /// Batch-level errors first, then row errors in row order.
    pub errors: Vec<RowError>,
}

impl BatchBuild {
    pub fn budgets(&self) -> impl Iterator<Item = &Budget> {
        self.rows.iter().filter_map(|r| r.budget.as_ref())
    }

    pub fn budget_count(&self) -> usize {
        self.budgets().count()
    }

    /// Assembly warnings as `row N: ...` lines, in row order.
    pub fn warnings(&self) -> Vec<String> {
        self.rows
            .iter()
            .flat_map(|r| {
                r.warnings
                    .iter()
                    .map(move |w| format!("row {}: {}", r.row + 1, w))
            })
            .collect()
    }
}

/// Validate, then resolve every row independently.
///
/// `prior_errors` are batch-level problems found earlier (tokenizer issues, an
/// unusable global thresholds file); they lead the combined error list.
pub fn build_budgets(
    rows: &[RawRow],
    global: &GlobalThresholds,
    prior_errors: Vec<BudgetError>,
) -> Result<BatchBuild> {
    validate_rows(rows)?;

    let mut errors: Vec<RowError> = prior_errors
        .into_iter()
        .map(|error| RowError { row: None, error })
        .collect();
    let mut results = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        let result = resolve_row(index, row, global);
        errors.extend(result.errors.iter().cloned().map(|error| RowError {
            row: Some(index),
            error,
        }));
        results.push(result);
    }

    let build = BatchBuild {
        rows: results,
        errors,
    };
    tracing::info!(
        "Assembled {} of {} budgets ({} errors)",
        build.budget_count(),
        rows.len(),
        build.errors.len()
    );
    Ok(build)
}

/// One successful creation.
#[derive(Debug, Clone)]
pub struct CreatedBudget {
    pub row: usize,
    pub budget: RemoteBudget,
}

/// Outcome of a create run with at least one success.
#[derive(Debug, Clone, Default)]
pub struct CreateReport {
    pub created: Vec<CreatedBudget>,
    /// Build errors followed by submission failures.
    pub errors: Vec<RowError>,
}

/// Submit every assembled budget concurrently and collect every outcome.
///
/// Submissions are not retried, and one failure does not cancel the others.
pub async fn create_budgets(
    client: &dyn BillingClient,
    parent: &str,
    build: BatchBuild,
) -> Result<CreateReport> {
    let BatchBuild { rows, mut errors } = build;

    let submissions = rows
        .into_iter()
        .filter_map(|result| result.budget.map(|budget| (result.row, budget)))
        .map(|(row, budget)| async move {
            let outcome = client.create(parent, &budget).await;
            (row, budget, outcome)
        });
    let outcomes = join_all(submissions).await;

    let mut created = Vec::new();
    for (row, budget, outcome) in outcomes {
        match outcome {
            Ok(remote) => {
                tracing::info!("Created budget '{}' as {}", budget.display_name, remote.name);
                created.push(CreatedBudget { row, budget: remote });
            }
            Err(source) => {
                tracing::error!("Failed to create budget '{}': {}", budget.display_name, source);
                errors.push(RowError {
                    row: Some(row),
                    error: BudgetError::RemoteFailure {
                        display_name: budget.display_name,
                        source,
                    },
                });
            }
        }
    }

    if created.is_empty() {
        return Err(BudgetError::NoBudgetsCreated(
            errors.iter().map(ToString::to_string).collect(),
        ));
    }
    Ok(CreateReport { created, errors })
}
