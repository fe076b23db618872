use thiserror::Error;

use crate::backend::{IndexError, LogbookError, RemoteError};

/// Errors produced while resolving a reference.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No backend knows this reference.
    #[error("reference not found: {reference}")]
    NotFound { reference: String },

    /// The dataset exists but has never been saved.
    #[error("dataset {reference} has no history")]
    NoHistory { reference: String },

    /// The resolution mode exists but has no backends yet.
    #[error("resolution mode '{mode}' is not finished")]
    NotFinished { mode: String },

    #[error("unknown resolution mode '{mode}': expected local, network, registry or p2p")]
    UnknownMode { mode: String },

    /// The reference uses `me` but no identity is configured.
    #[error("invalid contextual reference \"{reference}\": {remediation}")]
    InvalidContextualRef {
        reference: String,
        remediation: String,
    },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Logbook(#[from] LogbookError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl ResolveError {
    /// True if resolution may continue with the next backend.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }
}

/// Result type for resolve operations.
pub type Result<T> = std::result::Result<T, ResolveError>;
