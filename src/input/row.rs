//! Untyped input rows, as produced by the tabular reader or a JSON document.

use serde::Serialize;
use serde_json::{Map, Value};

/// One input row: field name to value.
///
/// CSV rows only ever hold strings; JSON rows may also hold numbers, booleans
/// and arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RawRow(Map<String, Value>);

impl RawRow {
    /// Wrap a JSON value; `None` if it is not an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Scalar field as trimmed text; blank values count as absent.
    pub fn text(&self, key: &str) -> Option<String> {
        let text = match self.0.get(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    /// First present field among `keys`.
    pub fn text_any(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.text(key))
    }

    pub fn has_text(&self, key: &str) -> bool {
        self.text(key).is_some()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_trims_and_drops_blanks() {
        let row: RawRow = [("a", " x "), ("b", "   ")].into_iter().collect();
        assert_eq!(row.text("a").as_deref(), Some("x"));
        assert_eq!(row.text("b"), None);
        assert_eq!(row.text("missing"), None);
    }

    #[test]
    fn test_json_scalars_become_text() {
        let row = RawRow::from_value(json!({"amt": 1000.5, "flag": true, "list": [1]})).unwrap();
        assert_eq!(row.text("amt").as_deref(), Some("1000.5"));
        assert_eq!(row.text("flag").as_deref(), Some("true"));
        assert_eq!(row.text("list"), None);
        assert!(RawRow::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn test_text_any_prefers_earlier_keys() {
        let row: RawRow = [("name", "second"), ("budget_name", "first")].into_iter().collect();
        assert_eq!(row.text_any(&["budget_name", "name"]).as_deref(), Some("first"));
        assert_eq!(row.text_any(&["display_name", "name"]).as_deref(), Some("second"));
    }
}
