//! Interaction error types.
//!
//! Bad credentials are not represented here: a failed login re-renders the
//! form and is returned as a normal value by the controller.

use std::fmt;

use oidc_store::StoreError;

use crate::account::AccountError;

/// Errors raised while driving a login or consent interaction.
#[derive(Debug, thiserror::Error)]
pub enum InteractionError {
    /// A submission arrived for a prompt that is not the pending one.
    ///
    /// This is a client or programming error and is never retried.
    #[error("Interaction sequence violation: expected {expected}, found {actual}")]
    SequenceViolation { expected: String, actual: String },

    /// No live interaction exists for the uid.
    #[error("Interaction not found or expired: {uid}")]
    NotFound { uid: String },

    /// Consent was submitted before an account was identified.
    #[error("Interaction {uid} has no authenticated session")]
    MissingSession { uid: String },

    /// The interaction references a client that is not registered.
    #[error("Unknown client: {client_id}")]
    UnknownClient { client_id: String },

    /// The interaction's stored request is missing required parameters.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Artifact store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The provider could not read or finish the interaction.
    #[error("Provider error: {message}")]
    Provider { message: String },

    /// The account resolver failed (not a credential mismatch).
    #[error(transparent)]
    Resolver(#[from] AccountError),
}

impl InteractionError {
    /// Creates a new `SequenceViolation` error.
    #[must_use]
    pub fn sequence_violation(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::SequenceViolation {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(uid: impl Into<String>) -> Self {
        Self::NotFound { uid: uid.into() }
    }

    /// Creates a new `MissingSession` error.
    #[must_use]
    pub fn missing_session(uid: impl Into<String>) -> Self {
        Self::MissingSession { uid: uid.into() }
    }

    /// Creates a new `UnknownClient` error.
    #[must_use]
    pub fn unknown_client(client_id: impl Into<String>) -> Self {
        Self::UnknownClient {
            client_id: client_id.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `Provider` error.
    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Returns `true` if the user agent sent a request that cannot succeed.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::UnknownClient { .. } | Self::InvalidRequest { .. }
        )
    }

    /// Returns `true` if this is a server-side failure.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns `true` if the caller may retry the same request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Resolver(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns the error category for logging.
    #[must_use]
    pub fn category(&self) -> InteractionErrorCategory {
        match self {
            Self::SequenceViolation { .. } | Self::MissingSession { .. } => {
                InteractionErrorCategory::Sequence
            }
            Self::NotFound { .. } | Self::UnknownClient { .. } | Self::InvalidRequest { .. } => {
                InteractionErrorCategory::Request
            }
            Self::Store(_) | Self::Provider { .. } | Self::Resolver(_) => {
                InteractionErrorCategory::Backend
            }
        }
    }
}

impl From<serde_json::Error> for InteractionError {
    fn from(err: serde_json::Error) -> Self {
        Self::provider(format!("Malformed interaction payload: {err}"))
    }
}

/// Categories of interaction errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionErrorCategory {
    /// Protocol-sequence violations.
    Sequence,
    /// Bad or stale requests from the user agent.
    Request,
    /// Store, provider or resolver failures.
    Backend,
}

impl fmt::Display for InteractionErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Request => write!(f, "request"),
            Self::Backend => write!(f, "backend"),
        }
    }
}

/// Result type for interaction operations.
pub type InteractionResult<T> = Result<T, InteractionError>;
