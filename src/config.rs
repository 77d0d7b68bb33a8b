//! Configuration.
//!
//! Loaded from an optional JSON file (default `./budget-csv.json`), then
//! overridden by environment variables:
//! - `BILLING_ACCOUNT_ID` - billing account budgets are created under
//! - `GOOGLE_APPLICATION_CREDENTIALS` - service-account key file
//! - `GOOGLE_OAUTH_ACCESS_TOKEN` - ready-made access token (takes precedence)
//! - `BUDGET_API_ENDPOINT` - API base URL
//! - `BUDGET_THRESHOLDS_FILE` - global thresholds file
//! - `BUDGET_REQUEST_TIMEOUT_SECS` - per-request timeout
//! - `GOOGLE_CLOUD_PROJECT` - set on GCP resources; enables metadata-server credentials
//! - `GCE_METADATA_HOST` - metadata server host (also enables it)
//!
//! CLI flags are applied last by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::client::{
    ClientError, Credentials, RestBillingClient, ServiceAccountKey, DEFAULT_ENDPOINT,
    DEFAULT_METADATA_HOST,
};

pub const DEFAULT_CONFIG_FILE: &str = "budget-csv.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub billing_account: Option<String>,
    pub credentials_file: Option<PathBuf>,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub endpoint: String,
    pub thresholds_file: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub gcp_project: Option<String>,
    pub metadata_host: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            billing_account: None,
            credentials_file: None,
            access_token: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            thresholds_file: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            gcp_project: None,
            metadata_host: None,
        }
    }
}

impl Config {
    /// Load the config file, then apply environment overrides.
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load_from_path(default_path)?
                } else {
                    tracing::debug!("No config file at {}, using defaults", default_path.display());
                    Self::default()
                }
            }
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("BILLING_ACCOUNT_ID") {
            self.billing_account = Some(v);
        }
        if let Some(v) = var("GOOGLE_APPLICATION_CREDENTIALS") {
            self.credentials_file = Some(PathBuf::from(v));
        }
        if let Some(v) = var("GOOGLE_OAUTH_ACCESS_TOKEN") {
            self.access_token = Some(v);
        }
        if let Some(v) = var("BUDGET_API_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = var("BUDGET_THRESHOLDS_FILE") {
            self.thresholds_file = Some(PathBuf::from(v));
        }
        if let Some(v) = var("GOOGLE_CLOUD_PROJECT") {
            self.gcp_project = Some(v);
        }
        if let Some(v) = var("GCE_METADATA_HOST") {
            self.metadata_host = Some(v);
        }
        if let Some(v) = var("BUDGET_REQUEST_TIMEOUT_SECS") {
            match v.parse() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(e) => tracing::warn!("Ignoring BUDGET_REQUEST_TIMEOUT_SECS={}: {}", v, e),
            }
        }
    }

    /// Credentials from config, or `None` if nothing is configured.
    ///
    /// Order: access token, key file, then the metadata server when running on GCP.
    pub fn credentials(&self) -> Result<Option<Credentials>, ClientError> {
        if let Some(token) = &self.access_token {
            return Ok(Some(Credentials::AccessToken(token.clone())));
        }
        if let Some(path) = &self.credentials_file {
            return Ok(Some(Credentials::ServiceAccount(ServiceAccountKey::from_file(path)?)));
        }
        if self.gcp_project.is_some() || self.metadata_host.is_some() {
            let host = self
                .metadata_host
                .clone()
                .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string());
            return Ok(Some(Credentials::Metadata { host }));
        }
        Ok(None)
    }

    /// Build the REST client, failing if no credentials are configured.
    pub fn client(&self) -> anyhow::Result<RestBillingClient> {
        let credentials = self.credentials()?.context(
            "no credentials available: set GOOGLE_APPLICATION_CREDENTIALS or GOOGLE_OAUTH_ACCESS_TOKEN, or run on GCP",
        )?;
        Ok(RestBillingClient::new(
            &self.endpoint,
            credentials,
            self.billing_account.clone(),
            Duration::from_secs(self.request_timeout_secs),
        )?)
    }
}
