//! Account resolution hooks.
//!
//! The login prompt hands submitted credentials to an [`AccountResolver`];
//! the provider loads accounts for claims through an [`AccountFinder`].
//!
//! Passwords are stored as Argon2id PHC strings and never logged.

use std::collections::HashMap;
use std::sync::OnceLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use serde::Serialize;

use crate::config::AccountConfig;

/// Errors raised by account backends.
///
/// A wrong password is not an error; resolvers return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// The account backend could not be reached.
    #[error("Account backend unavailable: {message}")]
    Unavailable { message: String },

    /// A stored password hash could not be parsed or produced.
    #[error("Invalid password hash: {message}")]
    InvalidHash { message: String },
}

impl AccountError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidHash` error.
    #[must_use]
    pub fn invalid_hash(message: impl Into<String>) -> Self {
        Self::InvalidHash {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Result type for account operations.
pub type AccountResult<T> = Result<T, AccountError>;

/// Maps a login submission to an account identifier.
#[async_trait]
pub trait AccountResolver: Send + Sync {
    /// Checks credentials.
    ///
    /// # Returns
    ///
    /// `Some(account_id)` when the credentials match, `None` when the email
    /// is unknown or the password is wrong.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend fails.
    async fn authenticate(&self, email: &str, password: &str) -> AccountResult<Option<String>>;
}

/// Loads accounts by identifier for claim release.
#[async_trait]
pub trait AccountFinder: Send + Sync {
    async fn find_account(&self, account_id: &str) -> AccountResult<Option<Account>>;
}

/// An account as seen by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub account_id: String,
}

/// Claims released for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountClaims {
    pub sub: String,
    pub scope: String,
}

impl Account {
    #[must_use]
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
        }
    }

    /// Claims for the given use (`id_token` or `userinfo`) and scope.
    ///
    /// Only `sub` and the granted scope are released.
    #[must_use]
    pub fn claims(&self, _claim_use: &str, scope: &str) -> AccountClaims {
        AccountClaims {
            sub: self.account_id.clone(),
            scope: scope.to_string(),
        }
    }
}

// =============================================================================
// Password Hashing
// =============================================================================

/// Hash a password for storage using Argon2id with a random salt.
///
/// # Errors
///
/// Returns `InvalidHash` if hashing fails (rare).
pub fn hash_password(password: &str) -> AccountResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountError::invalid_hash(e.to_string()))
}

/// Verify a password against a stored PHC hash.
///
/// # Errors
///
/// Returns `InvalidHash` if the stored hash cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> AccountResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| AccountError::invalid_hash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Hash checked when no account matches the submitted email.
///
/// `None` only if hashing itself failed.
pub fn dummy_password_hash() -> Option<&'static str> {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    DUMMY_HASH
        .get_or_init(|| hash_password("no-such-account").ok())
        .as_deref()
}

/// Spends one Argon2 verification on an unknown email so the response time
/// matches a wrong password for a real account. Always fails.
pub fn reject_unknown_account(password: &str) {
    if let Some(hash) = dummy_password_hash() {
        let _ = verify_password(password, hash);
    }
}

// =============================================================================
// Static Resolver
// =============================================================================

/// Account resolver over accounts listed in configuration.
///
/// Emails match case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct StaticAccountResolver {
    by_email: HashMap<String, AccountConfig>,
}

impl StaticAccountResolver {
    #[must_use]
    pub fn new(accounts: impl IntoIterator<Item = AccountConfig>) -> Self {
        Self {
            by_email: accounts
                .into_iter()
                .map(|account| (account.email.to_lowercase(), account))
                .collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }
}

#[async_trait]
impl AccountResolver for StaticAccountResolver {
    async fn authenticate(&self, email: &str, password: &str) -> AccountResult<Option<String>> {
        let Some(account) = self.by_email.get(&email.to_lowercase()) else {
            reject_unknown_account(password);
            return Ok(None);
        };
        if verify_password(password, &account.password_hash)? {
            Ok(Some(account.id.clone()))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl AccountFinder for StaticAccountResolver {
    async fn find_account(&self, account_id: &str) -> AccountResult<Option<Account>> {
        Ok(self
            .by_email
            .values()
            .find(|account| account.id == account_id)
            .map(|account| Account::new(account.id.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> StaticAccountResolver {
        StaticAccountResolver::new([AccountConfig {
            id: "alice".into(),
            email: "Alice@Example.com".into(),
            password_hash: hash_password("correct horse").unwrap(),
        }])
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("s3cret", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        let err = verify_password("x", "not-a-phc-string").unwrap_err();
        assert!(matches!(err, AccountError::InvalidHash { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_static_resolver_authenticates() {
        let resolver = resolver();
        assert_eq!(
            resolver
                .authenticate("alice@example.com", "correct horse")
                .await
                .unwrap()
                .as_deref(),
            Some("alice")
        );
    }

    #[tokio::test]
    async fn test_static_resolver_rejects_bad_credentials() {
        let resolver = resolver();
        assert!(resolver.authenticate("alice@example.com", "wrong").await.unwrap().is_none());
        assert!(resolver.authenticate("bob@example.com", "correct horse").await.unwrap().is_none());
    }

    #[test]
    fn test_dummy_hash_is_argon2id() {
        let hash = dummy_password_hash().unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(!verify_password("correct horse", hash).unwrap());
        // stable across calls
        assert_eq!(dummy_password_hash(), Some(hash));
    }

    #[tokio::test]
    async fn test_unknown_email_still_verifies() {
        let resolver = resolver();
        // the dummy's own plaintext must not log anyone in
        assert!(
            resolver
                .authenticate("nobody@example.com", "no-such-account")
                .await
                .unwrap()
                .is_none()
        );
        assert!(dummy_password_hash().is_some());
    }

    #[tokio::test]
    async fn test_find_account_claims() {
        let account = resolver().find_account("alice").await.unwrap().unwrap();
        let claims = account.claims("userinfo", "openid email");
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.scope, "openid email");
        assert!(resolver().find_account("nobody").await.unwrap().is_none());
    }
}
