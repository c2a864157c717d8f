//! Client metadata and the static client registry.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// OAuth 2.0 grant types a client may be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantType {
    #[serde(rename = "authorization_code")]
    AuthorizationCode,
    #[serde(rename = "refresh_token")]
    RefreshToken,
    #[serde(rename = "client_credentials")]
    ClientCredentials,
    #[serde(rename = "implicit")]
    Implicit,
    #[serde(rename = "urn:ietf:params:oauth:grant-type:device_code")]
    DeviceCode,
    #[serde(rename = "urn:openid:params:grant-type:ciba")]
    Ciba,
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
            Self::ClientCredentials => "client_credentials",
            Self::Implicit => "implicit",
            Self::DeviceCode => "urn:ietf:params:oauth:grant-type:device_code",
            Self::Ciba => "urn:openid:params:grant-type:ciba",
        };
        f.write_str(s)
    }
}

/// OpenID Connect `application_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationType {
    #[default]
    Web,
    Native,
}

/// How the client authenticates at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    #[default]
    ClientSecretBasic,
    ClientSecretPost,
    ClientSecretJwt,
    PrivateKeyJwt,
    /// Public client with no secret.
    None,
}

fn default_grant_types() -> Vec<GrantType> {
    vec![GrantType::AuthorizationCode]
}

/// Registered client metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default = "default_grant_types")]
    pub grant_types: Vec<GrantType>,
    /// Space-delimited scopes the client may request.
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub application_type: ApplicationType,
    #[serde(default)]
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,
}

impl ClientMetadata {
    /// Creates a confidential web client allowed the authorization code grant.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            client_name: None,
            redirect_uris: Vec::new(),
            grant_types: default_grant_types(),
            scope: String::new(),
            application_type: ApplicationType::Web,
            token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretBasic,
        }
    }

    #[must_use]
    pub fn grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// A browser-based client that holds no secret.
    #[must_use]
    pub fn is_public_web(&self) -> bool {
        self.application_type == ApplicationType::Web
            && self.token_endpoint_auth_method == TokenEndpointAuthMethod::None
    }

    /// Name shown on login and consent pages.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.client_name.as_deref().unwrap_or(&self.client_id)
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.split_whitespace()
    }
}

/// The development client registered when configuration names none.
#[must_use]
pub fn default_client() -> ClientMetadata {
    ClientMetadata {
        client_secret: Some("bar".to_string()),
        redirect_uris: vec![
            "https://jwt.io".to_string(),
            "https://openidconnect.net/callback".to_string(),
            "https://oauth.pstmn.io/v1/callback".to_string(),
            "https://oauthdebugger.com/debug".to_string(),
        ],
        grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
        scope: "openid email profile phone address offline_access".to_string(),
        ..ClientMetadata::new("foo")
    }
}

/// In-memory lookup of clients loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, ClientMetadata>,
}

impl ClientRegistry {
    #[must_use]
    pub fn new(clients: impl IntoIterator<Item = ClientMetadata>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|client| (client.client_id.clone(), client))
                .collect(),
        }
    }

    #[must_use]
    pub fn find(&self, client_id: &str) -> Option<&ClientMetadata> {
        self.clients.get(client_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
