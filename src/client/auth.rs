//! Bearer tokens for the billing API.
//!
//! Three sources are supported:
//! - a ready-made OAuth access token (`GOOGLE_OAUTH_ACCESS_TOKEN`)
//! - a service-account key file (`GOOGLE_APPLICATION_CREDENTIALS`), exchanged
//!   for an access token with a signed JWT assertion
//! - the instance metadata server, when running on a GCP resource

use std::path::Path;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::error::ClientError;

const BILLING_SCOPE: &str = "https://www.googleapis.com/auth/cloud-billing";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Host of the instance metadata server.
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Fields of a Google service-account key file that the exchange needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, ClientError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClientError::auth(format!("Failed to read credentials {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            ClientError::auth(format!("Invalid credentials file {}: {}", path.display(), e))
        })
    }
}

/// Where bearer tokens come from.
#[derive(Debug, Clone)]
pub enum Credentials {
    AccessToken(String),
    ServiceAccount(ServiceAccountKey),
    /// Default service account of the GCE/Cloud Run instance.
    Metadata { host: String },
}

impl Credentials {
    /// A human-readable name for the source, for `test budget-client`.
    pub fn describe(&self) -> String {
        match self {
            Self::AccessToken(_) => "static access token".to_string(),
            Self::ServiceAccount(key) => format!("service account {}", key.client_email),
            Self::Metadata { host } => format!("metadata server {}", host),
        }
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: i64,
}

/// Hands out bearer tokens, refreshing service-account tokens as they expire.
///
/// Shared by all concurrent submissions of a batch.
pub struct TokenProvider {
    credentials: Credentials,
    http: Client,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credentials: Credentials, http: Client) -> Self {
        Self {
            credentials,
            http,
            cached: RwLock::new(None),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Current bearer token.
    pub async fn token(&self) -> Result<String, ClientError> {
        if let Credentials::AccessToken(token) = &self.credentials {
            return Ok(token.clone());
        }

        let now = chrono::Utc::now().timestamp();
        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.expires_at > now + EXPIRY_MARGIN_SECS {
                return Ok(cached.value.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // another submission may have refreshed while we waited for the lock
        if let Some(existing) = cached.as_ref() {
            if existing.expires_at > now + EXPIRY_MARGIN_SECS {
                return Ok(existing.value.clone());
            }
        }

        let fresh = match &self.credentials {
            Credentials::AccessToken(token) => return Ok(token.clone()),
            Credentials::ServiceAccount(key) => self.exchange(key, now).await?,
            Credentials::Metadata { host } => self.fetch_metadata(host, now).await?,
        };
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn exchange(&self, key: &ServiceAccountKey, now: i64) -> Result<CachedToken, ClientError> {
        let assertion = sign_assertion(key, now)?;

        tracing::debug!("Exchanging service-account assertion for {}", key.client_email);
        let response = self
            .http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&e))?;

        read_token_response(response, now, "Token exchange").await
    }

    async fn fetch_metadata(&self, host: &str, now: i64) -> Result<CachedToken, ClientError> {
        tracing::debug!("Requesting access token from metadata server {}", host);
        let response = self
            .http
            .get(format!("http://{}{}", host, METADATA_TOKEN_PATH))
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&e))?;

        read_token_response(response, now, "Metadata token request").await
    }
}

async fn read_token_response(
    response: reqwest::Response,
    now: i64,
    what: &str,
) -> Result<CachedToken, ClientError> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(ClientError::auth(format!("{} failed: {} - {}", what, status, body)));
    }

    let parsed: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| ClientError::decode(format!("Failed to parse token response: {}", e)))?;

    Ok(CachedToken {
        value: parsed.access_token,
        expires_at: now + parsed.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS),
    })
}

/// Build the RS256-signed JWT used as the token-exchange assertion.
pub fn sign_assertion(key: &ServiceAccountKey, now: i64) -> Result<String, ClientError> {
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: BILLING_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| ClientError::auth(format!("Invalid service-account private key: {}", e)))?;
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| ClientError::auth(format!("Failed to sign assertion: {}", e)))
}
