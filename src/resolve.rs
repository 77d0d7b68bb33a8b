//! Row resolution: one raw input row to one budget, never aborting the batch.
//!
//! Threshold precedence for a row, highest first:
//! 1. the row's inline `thresholds` JSON
//! 2. the row's `thresholds_filepath`
//! 3. the batch-wide global thresholds (a global file, or the built-in set)
//!
//! A broken inline value or override file is recorded against the row and the
//! global thresholds are used instead.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::budget::{
    assemble, AssemblyWarning, Budget, BudgetOptions, BudgetSpec, NotificationChannels,
    RawThreshold, ScopeDescriptor, MAX_CHANNELS,
};
use crate::error::{BudgetError, FileKind, Result};
use crate::input::{parse_table, read_input, RawRow};

/// Column names understood in an input row.
pub mod columns {
    pub const NAME: &[&str] = &["budget_name", "name", "display_name"];
    pub const AMOUNT: &[&str] = &["budget_amt", "amount"];
    pub const CURRENCY: &str = "currency";
    pub const SCOPE_TYPE: &str = "scope_type";
    pub const SCOPE_ID: &str = "scope_id";
    pub const SCOPE_KEY: &str = "scope_key";
    pub const SCOPE_VALUE: &str = "scope_value";
    pub const SCOPES: &str = "scopes";
    pub const THRESHOLDS: &str = "thresholds";
    pub const THRESHOLDS_FILEPATH: &str = "thresholds_filepath";
    pub const CHANNELS: &str = "notification_channels";
    pub const CHANNEL_PREFIX: &str = "notification_channel_";
    pub const PUB_SUB: &[&str] = &["pubsub_topic", "pub_sub"];
    pub const DISABLE_DEFAULT: &[&str] = &["disable_default_recipients", "disable_default"];
    pub const EXCLUDE_CREDITS: &str = "exclude_credits";
    pub const PERCENTAGE: &[&str] = &["percentage", "percent"];
    pub const USE_FORECASTED: &[&str] = &["use_forecasted", "useForecasted"];
}

/// Batch-wide thresholds; empty means the built-in default set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalThresholds(Vec<RawThreshold>);

impl GlobalThresholds {
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn new(thresholds: Vec<RawThreshold>) -> Self {
        Self(thresholds)
    }

    /// Load the optional global thresholds file.
    ///
    /// A file that cannot be used is reported and the built-in set is used.
    pub fn load(path: Option<&Path>) -> (Self, Option<BudgetError>) {
        let Some(path) = path else {
            return (Self::builtin(), None);
        };
        match load_threshold_file(path, FileKind::GlobalThresholds) {
            Ok(thresholds) => {
                tracing::info!("Loaded {} global thresholds from {}", thresholds.len(), path.display());
                (Self(thresholds), None)
            }
            Err(e) => {
                tracing::warn!("{}, using built-in thresholds", e);
                (Self::builtin(), Some(e))
            }
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.0.is_empty()
    }

    pub fn thresholds(&self) -> &[RawThreshold] {
        &self.0
    }
}

/// Read a thresholds file: tabular `percentage,use_forecasted` rows, or a JSON array.
pub fn load_threshold_file(path: &Path, kind: FileKind) -> Result<Vec<RawThreshold>> {
    let text = read_input(path, kind)?;
    let thresholds = if text.trim_start().starts_with('[') {
        parse_threshold_json(&Value::String(text))?
    } else {
        let table = parse_table(&text);
        if let Some(issue) = table.errors.first() {
            return Err(BudgetError::parse(format!(
                "{} '{}' {}",
                kind,
                path.display(),
                issue
            )));
        }
        table
            .data
            .iter()
            .map(|row| RawThreshold {
                percentage: first_value(row, columns::PERCENTAGE),
                use_forecasted: first_value(row, columns::USE_FORECASTED),
            })
            .collect()
    };

    if thresholds.is_empty() {
        return Err(BudgetError::parse(format!(
            "{} '{}' contains no thresholds",
            kind,
            path.display()
        )));
    }
    Ok(thresholds)
}

fn first_value(row: &RawRow, keys: &[&str]) -> Option<Value> {
    keys.iter().find_map(|key| row.get(key)).cloned()
}

/// Parse inline thresholds: JSON text, or an already-parsed JSON array.
fn parse_threshold_json(value: &Value) -> Result<Vec<RawThreshold>> {
    let parsed;
    let array = match value {
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text)
                .map_err(|e| BudgetError::parse(format!("thresholds are not valid JSON: {}", e)))?;
            &parsed
        }
        other => other,
    };
    let thresholds: Vec<RawThreshold> = match array {
        Value::Array(_) => serde_json::from_value(array.clone())
            .map_err(|e| BudgetError::parse(format!("thresholds are malformed: {}", e)))?,
        _ => return Err(BudgetError::parse("thresholds must be a JSON array")),
    };
    if thresholds.is_empty() {
        return Err(BudgetError::parse("thresholds array is empty"));
    }
    Ok(thresholds)
}

/// Where a row takes its thresholds from.
#[derive(Debug, Clone, PartialEq)]
pub enum ThresholdSource {
    Inline(Value),
    File(PathBuf),
    Global,
}

impl ThresholdSource {
    fn from_row(row: &RawRow) -> Self {
        match row.get(columns::THRESHOLDS) {
            None | Some(Value::Null) => {}
            Some(Value::String(text)) if text.trim().is_empty() => {}
            Some(value) => return Self::Inline(value.clone()),
        }
        match row.text(columns::THRESHOLDS_FILEPATH) {
            Some(path) => Self::File(PathBuf::from(path)),
            None => Self::Global,
        }
    }

    /// Resolve to raw thresholds; an error means the caller should fall back.
    pub fn resolve(&self, global: &GlobalThresholds) -> Result<Vec<RawThreshold>> {
        match self {
            Self::Inline(value) => parse_threshold_json(value),
            Self::File(path) => load_threshold_file(path, FileKind::RowThresholds),
            Self::Global => Ok(global.thresholds().to_vec()),
        }
    }
}

/// A raw row after eager validation, before threshold resolution and assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetRow {
    pub spec: BudgetSpec,
    pub thresholds: ThresholdSource,
}

impl BudgetRow {
    pub fn from_raw(row: &RawRow) -> Result<Self> {
        let name = name_from_row(row)?;

        let mut scopes = Vec::new();
        if let Some(kind) = row.text(columns::SCOPE_TYPE) {
            scopes.push(ScopeDescriptor::from_fields(
                &kind,
                row.text(columns::SCOPE_ID).as_deref(),
                row.text(columns::SCOPE_KEY).as_deref(),
                row.text(columns::SCOPE_VALUE).as_deref(),
            ));
        }
        scopes.extend(extra_scopes(row));

        Ok(Self {
            spec: BudgetSpec {
                name: Some(name),
                amount: row.text_any(columns::AMOUNT),
                scopes,
                thresholds: Vec::new(),
                notification_channels: channels_from_row(row)?,
                options: BudgetOptions {
                    currency: row.text(columns::CURRENCY),
                    disable_default: flag(row, columns::DISABLE_DEFAULT)?,
                    exclude_credits: flag(row, &[columns::EXCLUDE_CREDITS])?,
                    pub_sub: row.text_any(columns::PUB_SUB),
                },
            },
            thresholds: ThresholdSource::from_row(row),
        })
    }
}

/// The display name must be text; numbers and other values are not coerced.
fn name_from_row(row: &RawRow) -> Result<String> {
    for key in columns::NAME {
        match row.get(key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(name)) if name.trim().is_empty() => continue,
            Some(Value::String(name)) => return Ok(name.trim().to_string()),
            Some(other) => {
                return Err(BudgetError::invalid_argument(format!(
                    "{} must be a string, got {}",
                    key, other
                )))
            }
        }
    }
    Err(BudgetError::invalid_argument("budget_name is required"))
}

/// Descriptors from a JSON `scopes` array. Malformed entries are skipped.
fn extra_scopes(row: &RawRow) -> Vec<ScopeDescriptor> {
    let items = match row.get(columns::SCOPES) {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            tracing::warn!("Ignoring scopes that are not an array: {}", other);
            return Vec::new();
        }
    };
    items
        .iter()
        .filter_map(|item| match ScopeDescriptor::deserialize(item) {
            Ok(scope) => Some(scope),
            Err(e) => {
                tracing::warn!("Skipping malformed scope {}: {}", item, e);
                None
            }
        })
        .collect()
}

fn flag(row: &RawRow, keys: &[&str]) -> Result<bool> {
    let Some((key, text)) = keys.iter().find_map(|k| row.text(k).map(|t| (*k, t))) else {
        return Ok(false);
    };
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Ok(true),
        "false" | "no" | "n" | "0" => Ok(false),
        _ => Err(BudgetError::invalid_argument(format!(
            "{} must be true or false, got '{}'",
            key, text
        ))),
    }
}

fn channels_from_row(row: &RawRow) -> Result<NotificationChannels> {
    let mut channels: Vec<String> = match row.get(columns::CHANNELS) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    };
    for n in 1..=MAX_CHANNELS {
        if let Some(channel) = row.text(&format!("{}{}", columns::CHANNEL_PREFIX, n)) {
            channels.push(channel);
        }
    }
    NotificationChannels::new(channels)
}

/// Outcome of resolving one row.
#[derive(Debug, Clone)]
pub struct RowResult {
    /// 0-based position in the input.
    pub row: usize,
    pub budget: Option<Budget>,
    pub warnings: Vec<AssemblyWarning>,
    pub errors: Vec<BudgetError>,
}

impl RowResult {
    fn failed(row: usize, error: BudgetError) -> Self {
        Self {
            row,
            budget: None,
            warnings: Vec::new(),
            errors: vec![error],
        }
    }
}

/// An error tagged with the row it belongs to, if any.
#[derive(Debug, Clone)]
pub struct RowError {
    pub row: Option<usize>,
    pub error: BudgetError,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "row {}: {}", row + 1, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Resolve and assemble one row. Failures are captured in the result.
pub fn resolve_row(index: usize, row: &RawRow, global: &GlobalThresholds) -> RowResult {
    let mut parsed = match BudgetRow::from_raw(row) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Row {} rejected: {}", index + 1, e);
            return RowResult::failed(index, e);
        }
    };

    let mut errors = Vec::new();
    parsed.spec.thresholds = match parsed.thresholds.resolve(global) {
        Ok(thresholds) => thresholds,
        Err(e) => {
            tracing::warn!("Row {}: {}, using global thresholds", index + 1, e);
            errors.push(e);
            global.thresholds().to_vec()
        }
    };

    match assemble(&parsed.spec) {
        Ok(assembly) => {
            tracing::debug!(
                "Row {} assembled '{}' with {} threshold rules",
                index + 1,
                assembly.budget.display_name,
                assembly.budget.threshold_rules.len()
            );
            RowResult {
                row: index,
                budget: Some(assembly.budget),
                warnings: assembly.warnings,
                errors,
            }
        }
        Err(e) => {
            errors.push(e);
            RowResult {
                row: index,
                budget: None,
                warnings: Vec::new(),
                errors,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::{default_thresholds, ThresholdSpec};
    use serde_json::json;

    fn row(fields: &[(&str, &str)]) -> RawRow {
        fields.iter().copied().collect()
    }

    fn project_row(extra: &[(&str, &str)]) -> RawRow {
        let mut r = row(&[
            ("budget_name", "Ops"),
            ("budget_amt", "1000.00"),
            ("scope_type", "project"),
            ("scope_id", "p1"),
        ]);
        for (k, v) in extra {
            r.insert(*k, *v);
        }
        r
    }

    #[test]
    fn test_plain_row_uses_builtin_defaults() {
        let result = resolve_row(0, &project_row(&[]), &GlobalThresholds::builtin());
        assert!(result.errors.is_empty());
        let budget = result.budget.unwrap();
        assert_eq!(budget.threshold_rules, default_thresholds());
        assert_eq!(budget.budget_filter.unwrap().projects, vec!["projects/p1"]);
    }

    #[test]
    fn test_inline_thresholds_win() {
        let r = project_row(&[
            ("thresholds", r#"[{"percentage": 75, "use_forecasted": "true"}]"#),
            ("thresholds_filepath", "/does/not/matter.csv"),
        ]);
        let global = GlobalThresholds::new(vec![RawThreshold::new(10, false)]);
        let result = resolve_row(0, &r, &global);
        assert!(result.errors.is_empty());
        assert_eq!(result.budget.unwrap().threshold_rules, vec![ThresholdSpec::new(75.0, true)]);
    }

    #[test]
    fn test_malformed_inline_thresholds_fall_back_to_global() {
        let r = project_row(&[("thresholds", "[{percentage: 75")]);
        let global = GlobalThresholds::new(vec![RawThreshold::new(10, false)]);
        let result = resolve_row(3, &r, &global);
        assert_eq!(result.errors.len(), 1);
        assert!(matches!(result.errors[0], BudgetError::Parse(_)));
        assert_eq!(result.budget.unwrap().threshold_rules, vec![ThresholdSpec::new(10.0, false)]);
    }

    #[test]
    fn test_row_threshold_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "percentage,use_forecasted\n50,false\n120,true\n").unwrap();
        let r = project_row(&[("thresholds_filepath", path.to_str().unwrap())]);
        let result = resolve_row(0, &r, &GlobalThresholds::builtin());
        assert!(result.errors.is_empty());
        assert_eq!(
            result.budget.unwrap().threshold_rules,
            vec![ThresholdSpec::new(50.0, false), ThresholdSpec::new(120.0, true)]
        );
    }

    #[test]
    fn test_missing_row_threshold_file_is_io_error_with_fallback() {
        let r = project_row(&[("thresholds_filepath", "/no/such/thresholds.csv")]);
        let result = resolve_row(0, &r, &GlobalThresholds::builtin());
        assert_eq!(result.errors.len(), 1);
        assert!(matches!(
            result.errors[0],
            BudgetError::Io {
                kind: FileKind::RowThresholds,
                ..
            }
        ));
        assert_eq!(result.budget.unwrap().threshold_rules.len(), 16);
    }

    #[test]
    fn test_empty_threshold_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "percentage,use_forecasted\n").unwrap();
        assert!(matches!(
            load_threshold_file(&path, FileKind::RowThresholds),
            Err(BudgetError::Parse(_))
        ));
    }

    #[test]
    fn test_global_file_loads_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("global.json");
        std::fs::write(&path, r#"[{"percent": 90, "useForecasted": false}]"#).unwrap();
        let (global, error) = GlobalThresholds::load(Some(path.as_path()));
        assert!(error.is_none());
        assert_eq!(global.thresholds().len(), 1);
    }

    #[test]
    fn test_unreadable_global_file_uses_builtin() {
        let (global, error) = GlobalThresholds::load(Some(Path::new("/no/such/global.csv")));
        assert!(global.is_builtin());
        assert!(error.unwrap().to_string().contains("global thresholds file"));
    }

    #[test]
    fn test_missing_name_fails_row_only() {
        let r = row(&[("scope_type", "project"), ("scope_id", "p1")]);
        let result = resolve_row(1, &r, &GlobalThresholds::builtin());
        assert!(result.budget.is_none());
        assert!(matches!(result.errors[0], BudgetError::InvalidArgument(_)));
    }

    #[test]
    fn test_bad_flag_is_rejected() {
        let r = project_row(&[("exclude_credits", "maybe")]);
        let result = resolve_row(0, &r, &GlobalThresholds::builtin());
        assert!(result.budget.is_none());
        assert!(result.errors[0].to_string().contains("exclude_credits"));
    }

    #[test]
    fn test_options_and_channels_from_columns() {
        let r = project_row(&[
            ("currency", "cad"),
            ("exclude_credits", "TRUE"),
            ("disable_default_recipients", "yes"),
            ("pubsub_topic", "projects/p1/topics/t"),
            ("notification_channel_1", "c1"),
            ("notification_channel_3", "c3"),
        ]);
        let parsed = BudgetRow::from_raw(&r).unwrap();
        assert_eq!(parsed.spec.options.currency.as_deref(), Some("cad"));
        assert!(parsed.spec.options.exclude_credits);
        assert!(parsed.spec.options.disable_default);
        assert_eq!(parsed.spec.notification_channels.as_slice(), &["c1", "c3"]);
        assert_eq!(parsed.thresholds, ThresholdSource::Global);
    }

    #[test]
    fn test_json_row_with_extra_scopes_and_channel_list() {
        let r = RawRow::from_value(json!({
            "budget_name": "Labels",
            "scope_type": "label",
            "scope_key": "env",
            "scope_value": "prod",
            "scopes": [{"type": "service", "id": "6F81-5844-456A"}],
            "notification_channels": ["c1", "c2"],
            "thresholds": [{"percentage": 50}]
        }))
        .unwrap();
        let result = resolve_row(0, &r, &GlobalThresholds::builtin());
        assert!(result.errors.is_empty());
        let budget = result.budget.unwrap();
        let filter = budget.budget_filter.unwrap();
        assert_eq!(filter.labels.get("env").unwrap(), &["prod"]);
        assert_eq!(filter.services, vec!["services/6F81-5844-456A"]);
        assert_eq!(budget.threshold_rules, vec![ThresholdSpec::new(50.0, false)]);
        assert_eq!(
            budget.all_updates_rule.unwrap().monitoring_notification_channels.len(),
            2
        );
    }

    #[test]
    fn test_non_array_inline_thresholds_are_recorded() {
        for thresholds in [json!({"percentage": 50}), json!(75), json!([])] {
            let r = RawRow::from_value(json!({
                "budget_name": "Ops",
                "scope_type": "project",
                "scope_id": "p1",
                "thresholds": thresholds
            }))
            .unwrap();
            let result = resolve_row(0, &r, &GlobalThresholds::builtin());
            assert_eq!(result.errors.len(), 1, "thresholds {}", thresholds);
            assert!(matches!(result.errors[0], BudgetError::Parse(_)));
            assert_eq!(result.budget.unwrap().threshold_rules, default_thresholds());
        }
    }

    #[test]
    fn test_null_inline_thresholds_mean_global() {
        let r = RawRow::from_value(json!({
            "budget_name": "Ops",
            "scope_type": "project",
            "scope_id": "p1",
            "thresholds": null
        }))
        .unwrap();
        assert_eq!(BudgetRow::from_raw(&r).unwrap().thresholds, ThresholdSource::Global);
    }

    #[test]
    fn test_malformed_extra_scope_is_skipped() {
        let r = RawRow::from_value(json!({
            "budget_name": "Ops",
            "scope_type": "project",
            "scope_id": "p1",
            "scopes": [{"type": "service"}, {"type": "subaccount", "id": "0000-SUB"}]
        }))
        .unwrap();
        let result = resolve_row(0, &r, &GlobalThresholds::builtin());
        assert!(result.errors.is_empty());
        let filter = result.budget.unwrap().budget_filter.unwrap();
        assert_eq!(filter.projects, vec!["projects/p1"]);
        assert!(filter.services.is_empty());
        assert_eq!(filter.subaccounts, vec!["billingAccounts/0000-SUB"]);
    }

    #[test]
    fn test_non_string_name_is_rejected() {
        let r = RawRow::from_value(json!({
            "budget_name": 42,
            "scope_type": "project",
            "scope_id": "p1"
        }))
        .unwrap();
        let result = resolve_row(0, &r, &GlobalThresholds::builtin());
        assert!(result.budget.is_none());
        assert!(matches!(result.errors[0], BudgetError::InvalidArgument(_)));
        assert!(result.errors[0].to_string().contains("must be a string"));
    }
}
