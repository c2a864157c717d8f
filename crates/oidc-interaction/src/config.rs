//! Provider configuration: lifetimes, clients, accounts and resource servers.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{ClientMetadata, default_client};

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

/// Root configuration of the interaction provider.
///
/// # Example (TOML)
///
/// ```toml
/// [provider]
/// issuer = "http://localhost:3000"
///
/// [provider.ttl]
/// access_token = "1h"
/// refresh_token = "14d"
///
/// [[provider.accounts]]
/// id = "alice"
/// email = "alice@example.com"
/// password_hash = "$argon2id$v=19$..."
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Public base URL of the provider.
    pub issuer: String,

    /// Default lifetimes per artifact kind.
    pub ttl: TtlConfig,

    /// Registered clients.
    pub clients: Vec<ClientMetadata>,

    /// Accounts for the static account resolver.
    pub accounts: Vec<AccountConfig>,

    /// Resource servers addressable by resource indicator.
    pub resource_servers: Vec<ResourceServerConfig>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:3000".to_string(),
            ttl: TtlConfig::default(),
            clients: vec![default_client()],
            accounts: Vec::new(),
            resource_servers: Vec::new(),
        }
    }
}

/// Default lifetime per artifact kind.
///
/// Every value is a humantime duration (`"10m"`, `"14d"`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TtlConfig {
    /// Used when the token's resource server sets no lifetime of its own.
    #[serde(with = "humantime_serde")]
    pub access_token: Duration,
    #[serde(with = "humantime_serde")]
    pub client_credentials: Duration,
    #[serde(with = "humantime_serde")]
    pub authorization_code: Duration,
    #[serde(with = "humantime_serde")]
    pub device_code: Duration,
    /// Upper bound for a requested expiry.
    #[serde(with = "humantime_serde")]
    pub backchannel_authentication_request: Duration,
    #[serde(with = "humantime_serde")]
    pub grant: Duration,
    #[serde(with = "humantime_serde")]
    pub id_token: Duration,
    #[serde(with = "humantime_serde")]
    pub interaction: Duration,
    #[serde(with = "humantime_serde")]
    pub refresh_token: Duration,
    #[serde(with = "humantime_serde")]
    pub session: Duration,
    #[serde(with = "humantime_serde")]
    pub pushed_authorization_request: Duration,
}

impl Default for TtlConfig {
    fn default() -> Self {
        const DAY: u64 = 24 * 60 * 60;
        Self {
            access_token: Duration::from_secs(60 * 60),
            client_credentials: Duration::from_secs(10 * 60),
            authorization_code: Duration::from_secs(600),
            device_code: Duration::from_secs(600),
            backchannel_authentication_request: Duration::from_secs(600),
            grant: Duration::from_secs(14 * DAY),
            id_token: Duration::from_secs(3600),
            interaction: Duration::from_secs(3600),
            refresh_token: Duration::from_secs(14 * DAY),
            session: Duration::from_secs(14 * DAY),
            pushed_authorization_request: Duration::from_secs(60),
        }
    }
}

impl TtlConfig {
    /// Validates that every lifetime is at least one second.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let entries = [
            ("access_token", self.access_token),
            ("client_credentials", self.client_credentials),
            ("authorization_code", self.authorization_code),
            ("device_code", self.device_code),
            (
                "backchannel_authentication_request",
                self.backchannel_authentication_request,
            ),
            ("grant", self.grant),
            ("id_token", self.id_token),
            ("interaction", self.interaction),
            ("refresh_token", self.refresh_token),
            ("session", self.session),
            ("pushed_authorization_request", self.pushed_authorization_request),
        ];
        for (name, value) in entries {
            if value.as_secs() == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "provider.ttl.{name} must be at least 1s"
                )));
            }
        }
        Ok(())
    }
}

/// A login account for the static resolver.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
    /// Account identifier (becomes `sub`).
    pub id: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
}

/// A resource server addressable by resource indicator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceServerConfig {
    /// Resource indicator URI.
    pub indicator: String,
    /// Space-delimited scopes the resource server accepts.
    #[serde(default)]
    pub scope: String,
    /// Access token lifetime for this resource server.
    #[serde(default, with = "humantime_serde")]
    pub access_token_ttl: Option<Duration>,
}

impl ProviderConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The issuer is not an absolute URL
    /// - Any lifetime is zero
    /// - A client id is empty or duplicated, or a redirect URI is not a URL
    /// - An account has no email or password hash
    /// - A resource indicator is not a URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::Missing("provider.issuer".into()));
        }
        url::Url::parse(&self.issuer).map_err(|e| {
            ConfigError::InvalidValue(format!("provider.issuer is not a URL: {e}"))
        })?;

        self.ttl.validate()?;

        let mut client_ids = HashSet::new();
        for client in &self.clients {
            if client.client_id.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "provider.clients: client_id cannot be empty".into(),
                ));
            }
            if !client_ids.insert(client.client_id.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "provider.clients: duplicate client_id '{}'",
                    client.client_id
                )));
            }
            for uri in &client.redirect_uris {
                url::Url::parse(uri).map_err(|e| {
                    ConfigError::InvalidValue(format!(
                        "provider.clients: invalid redirect_uri '{uri}' for '{}': {e}",
                        client.client_id
                    ))
                })?;
            }
        }

        for account in &self.accounts {
            if account.email.trim().is_empty() || account.password_hash.is_empty() {
                return Err(ConfigError::InvalidValue(format!(
                    "provider.accounts: account '{}' needs an email and password_hash",
                    account.id
                )));
            }
        }

        for server in &self.resource_servers {
            url::Url::parse(&server.indicator).map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "provider.resource_servers: invalid indicator '{}': {e}",
                    server.indicator
                ))
            })?;
        }

        Ok(())
    }

    /// Finds a resource server by indicator.
    #[must_use]
    pub fn resource_server(&self, indicator: &str) -> Option<&ResourceServerConfig> {
        self.resource_servers
            .iter()
            .find(|server| server.indicator == indicator)
    }
}
