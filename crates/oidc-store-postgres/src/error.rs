//! Error types for the PostgreSQL storage backend.

use oidc_store::StoreError;
use sqlx_core::error::Error as SqlxError;

/// PostgreSQL error code for serialization failure (40001).
pub const PG_SERIALIZATION_FAILURE: &str = "40001";

/// PostgreSQL error code for deadlock detected (40P01).
pub const PG_DEADLOCK_DETECTED: &str = "40P01";

/// PostgreSQL error code for admin shutdown (57P01).
pub const PG_ADMIN_SHUTDOWN: &str = "57P01";

/// PostgreSQL error code for undefined table (42P01).
pub const PG_UNDEFINED_TABLE: &str = "42P01";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Checks if a sqlx error is in the connection exception class (08xxx).
fn is_connection_exception(err: &SqlxError) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().is_some_and(|code| code.starts_with("08"))
    } else {
        false
    }
}

/// Returns `true` if the failure is transient and the call may be retried.
pub fn is_transient(err: &SqlxError) -> bool {
    match err {
        SqlxError::Io(_)
        | SqlxError::Tls(_)
        | SqlxError::Protocol(_)
        | SqlxError::PoolTimedOut
        | SqlxError::PoolClosed
        | SqlxError::WorkerCrashed => true,
        SqlxError::Database(_) => {
            is_connection_exception(err)
                || has_pg_error_code(err, PG_SERIALIZATION_FAILURE)
                || has_pg_error_code(err, PG_DEADLOCK_DETECTED)
                || has_pg_error_code(err, PG_ADMIN_SHUTDOWN)
        }
        _ => false,
    }
}

/// Maps a sqlx error onto the store contract.
///
/// Transient failures become `Unavailable` so callers can retry them.
pub fn store_error(err: SqlxError) -> StoreError {
    if is_transient(&err) {
        StoreError::unavailable(err.to_string())
    } else {
        StoreError::backend(err.to_string())
    }
}

/// Errors specific to setting up the PostgreSQL backend.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx_core::error::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias for PostgreSQL setup operations.
pub type Result<T> = std::result::Result<T, PostgresError>;
