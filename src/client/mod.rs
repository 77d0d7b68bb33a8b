//! Billing API client module.
//!
//! This module provides a trait-based abstraction over the budgets API, with a
//! REST client as the primary implementation. Batch code only sees the trait,
//! so tests can substitute an in-memory client.

mod auth;
mod error;
mod rest;

pub use auth::{
    sign_assertion, Credentials, ServiceAccountKey, TokenProvider, DEFAULT_METADATA_HOST,
};
pub use error::{classify_http_status, ClientError, ClientErrorKind};
pub use rest::{RestBillingClient, DEFAULT_ENDPOINT};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::budget::Budget;

const PARENT_PREFIX: &str = "billingAccounts/";

/// A budget as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBudget {
    /// Resource name, `billingAccounts/{account}/budgets/{budget}`.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Everything else the API returned, kept for display.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RemoteBudget {
    pub fn new(name: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            name: name.into(),
            display_name,
            fields: Map::new(),
        }
    }
}

/// Normalize a billing account id to `billingAccounts/{id}`.
pub fn parent_path(parent: &str) -> String {
    let parent = parent.trim().trim_matches('/');
    if parent.starts_with(PARENT_PREFIX) {
        parent.to_string()
    } else {
        format!("{}{}", PARENT_PREFIX, parent)
    }
}

/// Trait for billing budget API clients.
#[async_trait]
pub trait BillingClient: Send + Sync {
    /// List budgets under `parent`, or under the client's default billing account.
    async fn list(&self, parent: Option<&str>) -> Result<Vec<RemoteBudget>, ClientError>;

    /// Create one budget under `parent`. Not retried.
    async fn create(&self, parent: &str, budget: &Budget) -> Result<RemoteBudget, ClientError>;
}
