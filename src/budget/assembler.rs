//! Budget assembly: composes money, filter, thresholds and notifications.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::filter::{BudgetFilter, ScopeDescriptor};
use super::money::{MoneyAmount, DEFAULT_CURRENCY};
use super::notify::{NotificationChannels, NotificationOptions, NotificationRule};
use super::threshold::{build_threshold_rules, default_thresholds, RawThreshold, ThresholdSpec};
use crate::error::{BudgetError, Result};

/// Display names longer than this are truncated.
pub const MAX_DISPLAY_NAME: usize = 60;
const TRUNCATED_DISPLAY_NAME: usize = MAX_DISPLAY_NAME - 1;

/// Budgeted amount: a fixed sum or "whatever was spent last period".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BudgetAmount {
    SpecifiedAmount(MoneyAmount),
    LastPeriodAmount(LastPeriod),
}

/// Serializes as the empty object the API expects for `lastPeriodAmount`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LastPeriod {}

impl BudgetAmount {
    pub fn last_period() -> Self {
        Self::LastPeriodAmount(LastPeriod {})
    }

    pub fn is_last_period(&self) -> bool {
        matches!(self, Self::LastPeriodAmount(_))
    }
}

/// A normalized budget, ready to be sent as the body of a create call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_filter: Option<BudgetFilter>,
    pub amount: BudgetAmount,
    pub threshold_rules: Vec<ThresholdSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_updates_rule: Option<NotificationRule>,
}

/// Non-default options applied while assembling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetOptions {
    pub currency: Option<String>,
    pub disable_default: bool,
    pub exclude_credits: bool,
    pub pub_sub: Option<String>,
}

/// Everything needed to assemble one [`Budget`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetSpec {
    pub name: Option<String>,
    /// Decimal string; absent or non-numeric means "last period".
    #[serde(deserialize_with = "amount_text")]
    pub amount: Option<String>,
    pub scopes: Vec<ScopeDescriptor>,
    /// Empty means the built-in default set.
    pub thresholds: Vec<RawThreshold>,
    pub notification_channels: NotificationChannels,
    pub options: BudgetOptions,
}

impl BudgetSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Accept the amount as JSON text or a JSON number.
fn amount_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Something worth telling the user about that did not stop assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyWarning {
    DisplayNameTruncated { original_len: usize },
}

impl std::fmt::Display for AssemblyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DisplayNameTruncated { original_len } => write!(
                f,
                "display name of {} chars exceeds the {} allowed and was truncated to {}",
                original_len, MAX_DISPLAY_NAME, TRUNCATED_DISPLAY_NAME
            ),
        }
    }
}

/// Result of a successful assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub budget: Budget,
    pub warnings: Vec<AssemblyWarning>,
}

/// Debug-mode result: the assembly plus the arguments after defaulting.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugAssembly {
    pub resolved: BudgetSpec,
    pub assembly: Assembly,
}

/// Assemble a budget from its spec.
pub fn assemble(spec: &BudgetSpec) -> Result<Assembly> {
    assemble_debug(spec).map(|debug| debug.assembly)
}

/// Assemble a budget and also return the resolved arguments, for inspection.
pub fn assemble_debug(spec: &BudgetSpec) -> Result<DebugAssembly> {
    let resolved = resolve_spec(spec);
    let mut warnings = Vec::new();

    let name = resolved
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| BudgetError::invalid_argument("budget name is required"))?;
    let name_len = name.chars().count();
    let display_name = if name_len > MAX_DISPLAY_NAME {
        let warning = AssemblyWarning::DisplayNameTruncated {
            original_len: name_len,
        };
        tracing::warn!("Budget '{}': {}", name, warning);
        warnings.push(warning);
        name.chars().take(TRUNCATED_DISPLAY_NAME).collect()
    } else {
        name.to_string()
    };

    let amount = match resolved.amount.as_deref() {
        Some(amount) if is_numeric(amount) => {
            BudgetAmount::SpecifiedAmount(MoneyAmount::from_decimal(amount, resolved.options.currency.as_deref())?)
        }
        Some(amount) => {
            tracing::debug!("Amount '{}' is not numeric, using last period amount", amount);
            BudgetAmount::last_period()
        }
        None => BudgetAmount::last_period(),
    };

    let filter = BudgetFilter::build(&resolved.scopes, resolved.options.exclude_credits);
    let all_updates_rule = NotificationRule::build(
        resolved.notification_channels.clone(),
        NotificationOptions {
            pubsub_topic: resolved.options.pub_sub.clone(),
            disable_default: resolved.options.disable_default,
        },
    );

    let budget = Budget {
        display_name,
        budget_filter: filter.is_valid().then_some(filter),
        amount,
        threshold_rules: build_threshold_rules(&resolved.thresholds),
        all_updates_rule,
    };

    Ok(DebugAssembly {
        resolved,
        assembly: Assembly { budget, warnings },
    })
}

/// Apply option and threshold defaults without validating anything.
fn resolve_spec(spec: &BudgetSpec) -> BudgetSpec {
    let mut resolved = spec.clone();
    resolved.options.currency = Some(
        spec.options
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| c.chars().take(3).collect::<String>().to_uppercase())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
    );
    resolved.options.pub_sub = spec.options.pub_sub.clone().filter(|p| !p.trim().is_empty());
    if resolved.thresholds.is_empty() {
        resolved.thresholds = default_thresholds().iter().map(RawThreshold::from).collect();
    }
    resolved
}

fn is_numeric(amount: &str) -> bool {
    amount.trim().parse::<f64>().is_ok_and(f64::is_finite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::CreditTypesTreatment;
    use serde_json::json;

    #[test]
    fn test_name_only_uses_last_period_and_defaults() {
        let assembly = assemble(&BudgetSpec::named("x")).unwrap();
        let budget = assembly.budget;
        assert_eq!(budget.display_name, "x");
        assert!(budget.amount.is_last_period());
        assert_eq!(budget.threshold_rules, default_thresholds());
        assert!(budget.budget_filter.is_none());
        assert!(budget.all_updates_rule.is_none());
        assert!(assembly.warnings.is_empty());
    }

    #[test]
    fn test_missing_name_is_invalid_argument() {
        assert!(matches!(
            assemble(&BudgetSpec::default()),
            Err(BudgetError::InvalidArgument(_))
        ));
        assert!(assemble(&BudgetSpec::named("   ")).is_err());
    }

    #[test]
    fn test_long_name_is_truncated_with_warning() {
        let long = "n".repeat(65);
        let assembly = assemble(&BudgetSpec::named(long)).unwrap();
        assert_eq!(assembly.budget.display_name.chars().count(), 59);
        assert_eq!(
            assembly.warnings,
            vec![AssemblyWarning::DisplayNameTruncated { original_len: 65 }]
        );
    }

    #[test]
    fn test_sixty_chars_after_trim_is_kept() {
        let name = format!("  {}  ", "n".repeat(60));
        let assembly = assemble(&BudgetSpec::named(name)).unwrap();
        assert_eq!(assembly.budget.display_name.len(), 60);
        assert!(assembly.warnings.is_empty());
    }

    #[test]
    fn test_full_spec_round_trips_to_api_shape() {
        let spec = BudgetSpec {
            name: Some("Team budget".into()),
            amount: Some("1000.50".into()),
            scopes: vec![ScopeDescriptor::project("p1")],
            thresholds: vec![RawThreshold::new(80, false)],
            notification_channels: NotificationChannels::new(["c1"]).unwrap(),
            options: BudgetOptions {
                currency: Some("eur".into()),
                disable_default: true,
                exclude_credits: true,
                pub_sub: Some("projects/p1/topics/t".into()),
            },
        };
        let budget = assemble(&spec).unwrap().budget;
        assert_eq!(
            serde_json::to_value(&budget).unwrap(),
            json!({
                "displayName": "Team budget",
                "budgetFilter": {
                    "creditTypesTreatment": "EXCLUDE_ALL_CREDITS",
                    "projects": ["projects/p1"]
                },
                "amount": {"specifiedAmount": {"currencyCode": "EUR", "units": "1000", "nanos": 500000000}},
                "thresholdRules": [{"thresholdPercent": 0.8, "spendBasis": "CURRENT_SPEND"}],
                "allUpdatesRule": {
                    "schemaVersion": "1.0",
                    "disableDefaultIamRecipients": true,
                    "monitoringNotificationChannels": ["c1"],
                    "pubsubTopic": "projects/p1/topics/t"
                }
            })
        );
        assert_eq!(
            budget.budget_filter.unwrap().credit_types_treatment,
            CreditTypesTreatment::ExcludeAllCredits
        );
    }

    #[test]
    fn test_non_numeric_amount_means_last_period() {
        let spec = BudgetSpec {
            amount: Some("about a grand".into()),
            ..BudgetSpec::named("x")
        };
        assert!(assemble(&spec).unwrap().budget.amount.is_last_period());
        let json = serde_json::to_value(assemble(&spec).unwrap().budget.amount).unwrap();
        assert_eq!(json, json!({"lastPeriodAmount": {}}));
    }

    #[test]
    fn test_debug_mode_returns_resolved_arguments() {
        let debug = assemble_debug(&BudgetSpec::named("x")).unwrap();
        assert_eq!(debug.resolved.options.currency.as_deref(), Some("USD"));
        assert_eq!(debug.resolved.thresholds.len(), 16);
        assert_eq!(debug.assembly.budget.threshold_rules.len(), 16);
    }

    #[test]
    fn test_unrecognized_scopes_omit_filter() {
        let spec = BudgetSpec {
            scopes: vec![ScopeDescriptor::Unrecognized],
            ..BudgetSpec::named("x")
        };
        assert!(assemble(&spec).unwrap().budget.budget_filter.is_none());
    }

    #[test]
    fn test_spec_from_json_accepts_numeric_amount() {
        let spec: BudgetSpec = serde_json::from_value(json!({
            "name": "Ops",
            "amount": 250.5,
            "scopes": [{"type": "label", "key": "env", "value": "prod"}],
            "notification_channels": "projects/p/notificationChannels/1",
            "options": {"currency": "eur"}
        }))
        .unwrap();
        assert_eq!(spec.amount.as_deref(), Some("250.5"));
        assert_eq!(spec.notification_channels.len(), 1);
        let budget = assemble(&spec).unwrap().budget;
        let amount = serde_json::to_value(&budget.amount).unwrap();
        assert_eq!(amount["specifiedAmount"]["currencyCode"], "EUR");
        assert_eq!(amount["specifiedAmount"]["nanos"], 500_000_000);
    }
}
