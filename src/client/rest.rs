//! REST implementation of [`BillingClient`] for the billing budgets API.
//!
//! Calls are made exactly once; rate limiting and retries are left to the
//! caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::auth::{Credentials, TokenProvider};
use super::error::ClientError;
use super::{parent_path, BillingClient, RemoteBudget};
use crate::budget::Budget;

pub const DEFAULT_ENDPOINT: &str = "https://billingbudgets.googleapis.com";
const API_VERSION: &str = "v1beta1";

/// Billing budgets API client over HTTPS.
pub struct RestBillingClient {
    http: Client,
    endpoint: String,
    default_parent: Option<String>,
    auth: TokenProvider,
}

impl RestBillingClient {
    pub fn new(
        endpoint: impl Into<String>,
        credentials: Credentials,
        default_parent: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gcp-budget-csv/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::network(format!("Failed to build HTTP client: {}", e)))?;

        let mut endpoint = endpoint.into();
        while endpoint.ends_with('/') {
            endpoint.pop();
        }

        Ok(Self {
            auth: TokenProvider::new(credentials, http.clone()),
            http,
            endpoint,
            default_parent,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        self.auth.credentials()
    }

    fn budgets_url(&self, parent: &str) -> String {
        format!("{}/{}/{}/budgets", self.endpoint, API_VERSION, parent_path(parent))
    }

    fn resolve_parent<'a>(&'a self, parent: Option<&'a str>) -> Result<&'a str, ClientError> {
        parent
            .or(self.default_parent.as_deref())
            .ok_or_else(|| ClientError::new(super::ClientErrorKind::InvalidRequest, "No billing account given"))
    }

    /// Send a request and return the body of a successful response.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<String, ClientError> {
        let token = self.auth.token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ClientError::from_status(status.as_u16(), extract_message(&body)));
        }
        Ok(body)
    }
}

#[async_trait]
impl BillingClient for RestBillingClient {
    async fn list(&self, parent: Option<&str>) -> Result<Vec<RemoteBudget>, ClientError> {
        let parent = self.resolve_parent(parent)?;
        let url = self.budgets_url(parent);
        let mut budgets = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(&url);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let body = self.execute(request).await?;
            let page: ListBudgetsResponse = serde_json::from_str(&body)
                .map_err(|e| ClientError::decode(format!("Failed to parse list response: {}", e)))?;

            budgets.extend(page.budgets);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        tracing::debug!("Listed {} budgets under {}", budgets.len(), parent_path(parent));
        Ok(budgets)
    }

    async fn create(&self, parent: &str, budget: &Budget) -> Result<RemoteBudget, ClientError> {
        let url = self.budgets_url(parent);
        tracing::debug!("Creating budget '{}' under {}", budget.display_name, parent_path(parent));

        let body = self
            .execute(self.http.post(&url).json(&CreateBudgetRequest { budget }))
            .await?;
        serde_json::from_str(&body)
            .map_err(|e| ClientError::decode(format!("Failed to parse created budget: {}", e)))
    }
}

#[derive(Debug, Serialize)]
struct CreateBudgetRequest<'a> {
    budget: &'a Budget,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListBudgetsResponse {
    #[serde(default)]
    budgets: Vec<RemoteBudget>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Pull `error.message` out of a Google API error body, falling back to the raw body.
fn extract_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string())
}
