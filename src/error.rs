//! Error types shared by the transformation pipeline and the batch layer.

use std::fmt;
use std::sync::Arc;

use crate::client::ClientError;

/// Which logical file an I/O failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// The budgets CSV/JSON passed to `create` or `test parser`.
    Budgets,
    /// The optional global thresholds file.
    GlobalThresholds,
    /// A `thresholds_filepath` override on a single row.
    RowThresholds,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Budgets => write!(f, "budgets file"),
            Self::GlobalThresholds => write!(f, "global thresholds file"),
            Self::RowThresholds => write!(f, "per-row thresholds file"),
        }
    }
}

/// Errors produced while turning raw rows into budgets and submitting them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BudgetError {
    /// A required field is missing or malformed; fatal to one construction call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Tabular or JSON parse failure; recorded and followed by a fallback.
    #[error("parse error: {0}")]
    Parse(String),

    /// A file could not be read.
    #[error("failed to read {kind} '{path}': {source}")]
    Io {
        kind: FileKind,
        path: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The remote billing API rejected a submission.
    #[error("remote failure for '{display_name}': {source}")]
    RemoteFailure {
        display_name: String,
        #[source]
        source: ClientError,
    },

    /// The input array failed structural pre-validation; nothing was processed.
    #[error("invalid budget input: {0}")]
    InvalidBatch(String),

    /// A create run finished without a single budget being created.
    #[error("no budgets were created ({} error(s) recorded)", .0.len())]
    NoBudgetsCreated(Vec<String>),
}

impl BudgetError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse(reason.into())
    }

    pub fn io(kind: FileKind, path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            kind,
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, BudgetError>;
