//! Errors returned by billing API clients.

use std::fmt;

/// Broad classification of a client failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// No usable credentials, or the token exchange was refused.
    Auth,
    /// 403 from the API
    PermissionDenied,
    /// 404, usually an unknown billing account
    NotFound,
    /// 429
    RateLimited,
    /// Other 4xx: the request body was rejected
    InvalidRequest,
    /// 5xx
    ServerError,
    /// Connection, DNS or timeout failure
    Network,
    /// The response body could not be decoded
    Decode,
}

impl fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Auth => "auth",
            Self::PermissionDenied => "permission denied",
            Self::NotFound => "not found",
            Self::RateLimited => "rate limited",
            Self::InvalidRequest => "invalid request",
            Self::ServerError => "server error",
            Self::Network => "network error",
            Self::Decode => "decode error",
        };
        write!(f, "{}", s)
    }
}

/// Map an HTTP status code to an error kind.
pub fn classify_http_status(status: u16) -> ClientErrorKind {
    match status {
        401 => ClientErrorKind::Auth,
        403 => ClientErrorKind::PermissionDenied,
        404 => ClientErrorKind::NotFound,
        429 => ClientErrorKind::RateLimited,
        500..=599 => ClientErrorKind::ServerError,
        _ => ClientErrorKind::InvalidRequest,
    }
}

/// A failed call to the billing API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
pub struct ClientError {
    pub kind: ClientErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ClientError {
    pub fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            kind: classify_http_status(status),
            status: Some(status),
            message: body.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Auth, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Network, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Decode, message)
    }

    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            Self::network(format!("Connection failed: {}", e))
        } else {
            Self::network(format!("Request failed: {}", e))
        }
    }
}
