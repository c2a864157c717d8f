//! PostgreSQL-backed account resolution.
//!
//! Accounts live in `oidc_accounts` with Argon2id PHC password hashes.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use oidc_interaction::account::{
    Account, AccountError, AccountFinder, AccountResolver, AccountResult, hash_password,
    reject_unknown_account, verify_password,
};

use crate::PgPool;

fn account_error(err: sqlx_core::Error) -> AccountError {
    AccountError::unavailable(err.to_string())
}

/// Row from the `oidc_accounts` table.
#[derive(Debug, Clone)]
pub struct AccountRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

impl AccountRow {
    fn from_tuple(row: (String, String, String, OffsetDateTime)) -> Self {
        Self {
            id: row.0,
            email: row.1,
            password_hash: row.2,
            created_at: row.3,
        }
    }
}

// =============================================================================
// Account Storage
// =============================================================================

/// Account storage operations over a borrowed pool.
pub struct AccountStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> AccountStorage<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find an account by email, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> AccountResult<Option<AccountRow>> {
        let row: Option<(String, String, String, OffsetDateTime)> = query_as(
            r#"
            SELECT id, email, password_hash, created_at
            FROM oidc_accounts
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await
        .map_err(account_error)?;

        Ok(row.map(AccountRow::from_tuple))
    }

    /// Find an account by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: &str) -> AccountResult<Option<AccountRow>> {
        let row: Option<(String, String, String, OffsetDateTime)> = query_as(
            r#"
            SELECT id, email, password_hash, created_at
            FROM oidc_accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(account_error)?;

        Ok(row.map(AccountRow::from_tuple))
    }

    /// Create an account with a freshly hashed password.
    ///
    /// Returns the generated account id.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails or the email is already taken.
    pub async fn create(&self, email: &str, password: &str) -> AccountResult<String> {
        let id = Uuid::new_v4().to_string();
        let password_hash = hash_password(password)?;

        query(
            r#"
            INSERT INTO oidc_accounts (id, email, password_hash)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(&password_hash)
        .execute(self.pool)
        .await
        .map_err(account_error)?;

        Ok(id)
    }
}

// =============================================================================
// Arc-Owning Resolver
// =============================================================================

/// Account resolver over `oidc_accounts`.
#[derive(Clone)]
pub struct PostgresAccountResolver {
    pool: Arc<PgPool>,
}

impl PostgresAccountResolver {
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountResolver for PostgresAccountResolver {
    #[instrument(skip_all)]
    async fn authenticate(&self, email: &str, password: &str) -> AccountResult<Option<String>> {
        let Some(row) = AccountStorage::new(&self.pool).find_by_email(email).await? else {
            tracing::debug!("No account for login attempt");
            reject_unknown_account(password);
            return Ok(None);
        };

        if verify_password(password, &row.password_hash)? {
            Ok(Some(row.id))
        } else {
            tracing::debug!(account_id = %row.id, "Password mismatch");
            Ok(None)
        }
    }
}

#[async_trait]
impl AccountFinder for PostgresAccountResolver {
    async fn find_account(&self, account_id: &str) -> AccountResult<Option<Account>> {
        Ok(AccountStorage::new(&self.pool)
            .find_by_id(account_id)
            .await?
            .map(|row| Account::new(row.id)))
    }
}
