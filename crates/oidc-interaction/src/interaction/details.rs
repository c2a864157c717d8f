//! Interaction documents as the provider stores them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::outcome::InteractionOutcome;
use crate::grant::MissingGrants;

/// Name of the prompt an interaction is waiting on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PromptName {
    Login,
    Consent,
    /// Any other prompt. Rendered like consent.
    Other(String),
}

impl PromptName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Login => "login",
            Self::Consent => "consent",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for PromptName {
    fn from(name: String) -> Self {
        match name.as_str() {
            "login" => Self::Login,
            "consent" => Self::Consent,
            _ => Self::Other(name),
        }
    }
}

impl From<PromptName> for String {
    fn from(name: PromptName) -> Self {
        name.as_str().to_string()
    }
}

impl fmt::Display for PromptName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pending prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub name: PromptName,
    #[serde(default)]
    pub reasons: Vec<String>,
    /// What consent would add to the current grant.
    #[serde(default)]
    pub details: MissingGrants,
}

impl Prompt {
    #[must_use]
    pub fn login() -> Self {
        Self {
            name: PromptName::Login,
            reasons: vec!["no_session".to_string()],
            details: MissingGrants::default(),
        }
    }

    #[must_use]
    pub fn consent(missing: MissingGrants) -> Self {
        Self {
            name: PromptName::Consent,
            reasons: vec!["op_scopes_missing".to_string()],
            details: missing,
        }
    }
}

/// Authorization request parameters the interaction was started with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationParams(pub Map<String, Value>);

impl AuthorizationParams {
    fn str_param(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.str_param("client_id")
    }

    #[must_use]
    pub fn login_hint(&self) -> Option<&str> {
        self.str_param("login_hint")
    }

    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.str_param("scope")
    }

    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.0.insert(name.to_string(), Value::String(value.into()));
        self
    }

    #[must_use]
    pub fn with_login_hint(self, login_hint: impl Into<String>) -> Self {
        self.with("login_hint", login_hint)
    }
}

/// The end-user session attached to an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionSession {
    pub account_id: String,
}

/// A paused authorization request awaiting a login or consent decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionDetails {
    pub uid: String,
    pub prompt: Prompt,
    #[serde(default)]
    pub params: AuthorizationParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<InteractionSession>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_id: Option<String>,
    /// Accumulated submissions of this interaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_submission: Option<InteractionOutcome>,
    /// Set once the interaction has been finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<InteractionOutcome>,
}

impl InteractionDetails {
    /// Starts an interaction with a fresh uid.
    #[must_use]
    pub fn new(prompt: Prompt, params: AuthorizationParams) -> Self {
        Self {
            uid: uuid::Uuid::new_v4().to_string(),
            prompt,
            params,
            session: None,
            grant_id: None,
            last_submission: None,
            result: None,
        }
    }

    #[must_use]
    pub fn with_session(mut self, account_id: impl Into<String>) -> Self {
        self.session = Some(InteractionSession {
            account_id: account_id.into(),
        });
        self
    }

    #[must_use]
    pub fn with_grant_id(mut self, grant_id: impl Into<String>) -> Self {
        self.grant_id = Some(grant_id.into());
        self
    }

    #[must_use]
    pub fn account_id(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.account_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_name_round_trip() {
        assert_eq!(PromptName::from("login".to_string()), PromptName::Login);
        assert_eq!(PromptName::from("consent".to_string()), PromptName::Consent);
        assert_eq!(
            PromptName::from("select_account".to_string()).as_str(),
            "select_account"
        );
    }

    #[test]
    fn test_details_wire_format() {
        let details: InteractionDetails = serde_json::from_value(serde_json::json!({
            "uid": "abc",
            "prompt": {
                "name": "consent",
                "reasons": ["op_scopes_missing"],
                "details": { "missingOIDCScope": ["openid", "email"] }
            },
            "params": { "client_id": "foo", "scope": "openid email" },
            "session": { "accountId": "alice" },
            "grantId": "g-1"
        }))
        .unwrap();

        assert_eq!(details.prompt.name, PromptName::Consent);
        assert_eq!(details.prompt.details.oidc_scope, vec!["openid", "email"]);
        assert_eq!(details.params.client_id(), Some("foo"));
        assert_eq!(details.account_id(), Some("alice"));
        assert_eq!(details.grant_id.as_deref(), Some("g-1"));
        assert!(details.result.is_none());
    }

    #[test]
    fn test_new_serializes_index_keys_at_top_level() {
        let details = InteractionDetails::new(Prompt::login(), AuthorizationParams::default())
            .with_grant_id("g-1");
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["uid"], details.uid.as_str());
        assert_eq!(json["grantId"], "g-1");
        assert_eq!(json["prompt"]["name"], "login");
    }
}
