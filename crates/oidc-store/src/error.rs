//! Artifact store error types.
//!
//! Not-found is never an error here: lookups return `Option` and
//! [`consume`](crate::ArtifactStore::consume) reports it as an outcome.

use std::fmt;

use crate::kind::ArtifactKind;

/// Errors that can occur while reading or writing artifacts.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or the operation timed out.
    ///
    /// Callers may retry these with backoff.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of the backend failure.
        message: String,
    },

    /// The backend rejected the operation for a reason retrying will not fix.
    #[error("Backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// A secondary-key lookup matched more than one live artifact.
    #[error("Ambiguous {index} index for {kind}: {key}")]
    AmbiguousIndex {
        /// Artifact kind that was queried.
        kind: ArtifactKind,
        /// Name of the secondary index (`uid`, `userCode`).
        index: &'static str,
        /// The secondary key value.
        key: String,
    },

    /// The caller passed data that the contract does not allow.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of what was wrong.
        message: String,
    },

    /// Payload (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a new `AmbiguousIndex` error.
    #[must_use]
    pub fn ambiguous_index(kind: ArtifactKind, index: &'static str, key: impl Into<String>) -> Self {
        Self::AmbiguousIndex {
            kind,
            index,
            key: key.into(),
        }
    }

    /// Creates a new `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Returns `true` if retrying the operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns `true` if the caller misused the contract.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }

    /// Returns `true` if this is a backend-side failure.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns the error category for logging.
    #[must_use]
    pub fn category(&self) -> StoreErrorCategory {
        match self {
            Self::Unavailable { .. } | Self::Backend { .. } => StoreErrorCategory::Infrastructure,
            Self::AmbiguousIndex { .. } => StoreErrorCategory::Integrity,
            Self::InvalidInput { .. } => StoreErrorCategory::Validation,
            Self::Serialization(_) => StoreErrorCategory::Serialization,
        }
    }
}

/// Categories of store errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorCategory {
    /// Backend reachability or execution failures.
    Infrastructure,
    /// Secondary-index uniqueness was violated.
    Integrity,
    /// Caller supplied invalid data.
    Validation,
    /// Payload encoding failures.
    Serialization,
}

impl fmt::Display for StoreErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Integrity => write!(f, "integrity"),
            Self::Validation => write!(f, "validation"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
