//! PostgreSQL storage backend for oidc-store.
//!
//! Provides persistent storage for:
//!
//! - Protocol artifacts of every kind (`oidc_artifacts`)
//! - End-user accounts checked at login (`oidc_accounts`)
//!
//! The schema ships as embedded migrations applied by [`migrations::run`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use oidc_store_postgres::{PostgresArtifactStore, PostgresConfig, create_pool, migrations};
//!
//! let pool = create_pool(&PostgresConfig::new("postgres://localhost/oidc")).await?;
//! migrations::run(&pool).await?;
//! let store = PostgresArtifactStore::new(Arc::new(pool));
//! ```

pub mod account;
pub mod artifact;
pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;

use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use account::{AccountRow, AccountStorage, PostgresAccountResolver};
pub use artifact::{ArtifactStorage, PostgresArtifactStore};
pub use config::PostgresConfig;
pub use error::{PostgresError, Result, has_pg_error_code, is_transient, store_error};
pub use pool::{create_pool, pool_options};
