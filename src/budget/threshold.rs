//! Threshold rules: raw percent/forecast pairs and their normalized form.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Percent used whenever a raw percentage is missing or unusable.
pub const FALLBACK_PERCENT: f64 = 100.0;

const DEFAULT_PERCENTS: [f64; 8] = [50.0, 90.0, 100.0, 105.0, 110.0, 125.0, 150.0, 200.0];

/// Which spend figure a threshold is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpendBasis {
    CurrentSpend,
    ForecastedSpend,
}

/// A threshold pair exactly as it arrived from a row, a JSON document or a file.
///
/// Values stay untyped here; [`ThresholdSpec::from_raw`] applies the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawThreshold {
    #[serde(default, alias = "percent", skip_serializing_if = "Option::is_none")]
    pub percentage: Option<Value>,
    #[serde(default, alias = "useForecasted", skip_serializing_if = "Option::is_none")]
    pub use_forecasted: Option<Value>,
}

impl RawThreshold {
    pub fn new(percentage: impl Into<Value>, use_forecasted: impl Into<Value>) -> Self {
        Self {
            percentage: Some(percentage.into()),
            use_forecasted: Some(use_forecasted.into()),
        }
    }
}

impl From<&ThresholdSpec> for RawThreshold {
    fn from(spec: &ThresholdSpec) -> Self {
        Self::new(spec.percent, spec.use_forecasted)
    }
}

/// A normalized threshold rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSpec {
    /// Percentage of the budget amount, e.g. `90.0`.
    pub percent: f64,
    pub use_forecasted: bool,
}

impl ThresholdSpec {
    pub const fn new(percent: f64, use_forecasted: bool) -> Self {
        Self {
            percent,
            use_forecasted,
        }
    }

    /// Normalize a raw pair. Never fails: bad percentages become 100.
    pub fn from_raw(raw: &RawThreshold) -> Self {
        Self {
            percent: raw
                .percentage
                .as_ref()
                .and_then(parse_percent)
                .unwrap_or(FALLBACK_PERCENT),
            use_forecasted: raw.use_forecasted.as_ref().is_some_and(parse_forecasted),
        }
    }

    pub fn spend_basis(&self) -> SpendBasis {
        if self.use_forecasted {
            SpendBasis::ForecastedSpend
        } else {
            SpendBasis::CurrentSpend
        }
    }
}

/// The API takes thresholds as a fraction of the budget (0.9 for 90%).
impl Serialize for ThresholdSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("ThresholdRule", 2)?;
        state.serialize_field("thresholdPercent", &(self.percent / 100.0))?;
        state.serialize_field("spendBasis", &self.spend_basis())?;
        state.end()
    }
}

fn parse_percent(value: &Value) -> Option<f64> {
    let percent = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (percent.is_finite() && percent >= 0.0).then_some(percent)
}

fn parse_forecasted(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => {
            let s = s.trim();
            !s.is_empty() && !s.eq_ignore_ascii_case("false")
        }
        _ => false,
    }
}

/// Normalize raw pairs, preserving their order.
pub fn build_threshold_rules(raw: &[RawThreshold]) -> Vec<ThresholdSpec> {
    raw.iter().map(ThresholdSpec::from_raw).collect()
}

/// The built-in rule set: every default percent on actual spend, then again on forecast.
pub fn default_thresholds() -> Vec<ThresholdSpec> {
    [false, true]
        .into_iter()
        .flat_map(|forecasted| {
            DEFAULT_PERCENTS
                .into_iter()
                .map(move |percent| ThresholdSpec::new(percent, forecasted))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_set_has_sixteen_rules_in_order() {
        let defaults = default_thresholds();
        assert_eq!(defaults.len(), 16);
        let percents: Vec<f64> = defaults.iter().map(|t| t.percent).collect();
        assert_eq!(&percents[..8], &DEFAULT_PERCENTS);
        assert_eq!(&percents[8..], &DEFAULT_PERCENTS);
        assert!(defaults[..8].iter().all(|t| !t.use_forecasted));
        assert!(defaults[8..].iter().all(|t| t.use_forecasted));
    }

    #[test]
    fn test_invalid_percent_falls_back_to_hundred() {
        let cases = [
            json!(-5),
            json!("-0.5"),
            json!("ninety"),
            json!(""),
            json!(null),
            json!(true),
        ];
        for case in cases {
            let spec = ThresholdSpec::from_raw(&RawThreshold {
                percentage: Some(case.clone()),
                use_forecasted: None,
            });
            assert_eq!(spec.percent, FALLBACK_PERCENT, "{}", case);
        }
        assert_eq!(ThresholdSpec::from_raw(&RawThreshold::default()).percent, 100.0);
    }

    #[test]
    fn test_percent_accepts_numbers_and_numeric_text() {
        assert_eq!(ThresholdSpec::from_raw(&RawThreshold::new(75, false)).percent, 75.0);
        assert_eq!(ThresholdSpec::from_raw(&RawThreshold::new("12.5", false)).percent, 12.5);
        assert_eq!(ThresholdSpec::from_raw(&RawThreshold::new(0, false)).percent, 0.0);
    }

    #[test]
    fn test_forecast_flag_parsing() {
        let flag = |v: Value| {
            ThresholdSpec::from_raw(&RawThreshold {
                percentage: None,
                use_forecasted: Some(v),
            })
            .use_forecasted
        };
        assert!(flag(json!(true)));
        assert!(!flag(json!(false)));
        assert!(!flag(json!("FALSE")));
        assert!(flag(json!("True")));
        assert!(flag(json!("yes")));
        assert!(!flag(json!("")));
        assert!(!flag(json!(1)));
    }

    #[test]
    fn test_builder_preserves_order() {
        let raw = vec![RawThreshold::new(150, true), RawThreshold::new(50, false)];
        let rules = build_threshold_rules(&raw);
        assert_eq!(rules, vec![ThresholdSpec::new(150.0, true), ThresholdSpec::new(50.0, false)]);
    }

    #[test]
    fn test_raw_threshold_accepts_camel_case_keys() {
        let raw: RawThreshold =
            serde_json::from_value(json!({"percent": 90, "useForecasted": "true"})).unwrap();
        assert_eq!(ThresholdSpec::from_raw(&raw), ThresholdSpec::new(90.0, true));
    }

    #[test]
    fn test_rule_serializes_as_fraction() {
        let json = serde_json::to_value(ThresholdSpec::new(90.0, true)).unwrap();
        assert_eq!(json, json!({"thresholdPercent": 0.9, "spendBasis": "FORECASTED_SPEND"}));
    }
}
