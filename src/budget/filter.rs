//! Scope descriptors and the budget filter built from them.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// One dimension restricting which costs count toward a budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScopeDescriptor {
    Service {
        id: String,
    },
    Project {
        id: String,
    },
    Subaccount {
        id: String,
    },
    /// Accepts a `values` list, a single `value`, or both (merged, `values` first).
    Label {
        key: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        values: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    /// Any other scope kind; skipped when building a filter.
    #[serde(other)]
    Unrecognized,
}

impl ScopeDescriptor {
    pub fn service(id: impl Into<String>) -> Self {
        Self::Service { id: id.into() }
    }

    pub fn project(id: impl Into<String>) -> Self {
        Self::Project { id: id.into() }
    }

    pub fn subaccount(id: impl Into<String>) -> Self {
        Self::Subaccount { id: id.into() }
    }

    pub fn label(key: impl Into<String>, values: Vec<String>) -> Self {
        Self::Label {
            key: key.into(),
            values,
            value: None,
        }
    }

    pub fn label_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Label {
            key: key.into(),
            values: Vec::new(),
            value: Some(value.into()),
        }
    }

    /// Build a descriptor from the flat `scope_*` fields of an input row.
    pub fn from_fields(kind: &str, id: Option<&str>, key: Option<&str>, value: Option<&str>) -> Self {
        match (kind.trim().to_ascii_lowercase().as_str(), id, key, value) {
            ("service", Some(id), _, _) => Self::service(id),
            ("project", Some(id), _, _) => Self::project(id),
            ("subaccount", Some(id), _, _) => Self::subaccount(id),
            ("label", _, Some(key), Some(value)) => Self::label_value(key, value),
            _ => Self::Unrecognized,
        }
    }
}

/// Whether credits count against the budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditTypesTreatment {
    ExcludeAllCredits,
    #[default]
    IncludeAllCredits,
}

impl From<bool> for CreditTypesTreatment {
    fn from(exclude_credits: bool) -> Self {
        if exclude_credits {
            Self::ExcludeAllCredits
        } else {
            Self::IncludeAllCredits
        }
    }
}

/// Label filters in insertion order, serialized as one `{key: [values]}` object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilters(Vec<(String, Vec<String>)>);

impl LabelFilters {
    fn push(&mut self, key: &str, values: impl IntoIterator<Item = String>) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => existing.extend(values),
            None => self.0.push((key.to_string(), values.into_iter().collect())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }
}

impl Serialize for LabelFilters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, values) in &self.0 {
            map.serialize_entry(key, values)?;
        }
        map.end()
    }
}

/// Filter restricting which costs a budget tracks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetFilter {
    pub credit_types_treatment: CreditTypesTreatment,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subaccounts: Vec<String>,
    #[serde(skip_serializing_if = "LabelFilters::is_empty")]
    pub labels: LabelFilters,
    #[serde(skip)]
    recognized: usize,
}

impl BudgetFilter {
    /// Bucket descriptors by kind in a single pass.
    pub fn build(scopes: &[ScopeDescriptor], exclude_credits: bool) -> Self {
        let mut filter = Self {
            credit_types_treatment: exclude_credits.into(),
            services: Vec::new(),
            projects: Vec::new(),
            subaccounts: Vec::new(),
            labels: LabelFilters::default(),
            recognized: 0,
        };

        for scope in scopes {
            match scope {
                ScopeDescriptor::Service { id } => filter.services.push(format!("services/{}", id)),
                ScopeDescriptor::Project { id } => filter.projects.push(format!("projects/{}", id)),
                ScopeDescriptor::Subaccount { id } => {
                    filter.subaccounts.push(format!("billingAccounts/{}", id))
                }
                ScopeDescriptor::Label { key, values, value } => {
                    if values.is_empty() && value.is_none() {
                        tracing::debug!("Skipping label scope '{}' with no values", key);
                        continue;
                    }
                    filter
                        .labels
                        .push(key, values.iter().cloned().chain(value.clone()));
                }
                ScopeDescriptor::Unrecognized => {
                    tracing::debug!("Skipping unrecognized scope kind");
                    continue;
                }
            }
            filter.recognized += 1;
        }

        filter
    }

    /// False when no descriptor was recognized; such a filter must not be sent.
    pub fn is_valid(&self) -> bool {
        self.recognized > 0
    }
}
