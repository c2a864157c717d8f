//! Interaction results and how they accumulate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentResult {
    pub grant_id: String,
}

/// The result an interaction is finished with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<LoginResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent: Option<ConsentResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(
        default,
        rename = "error_description",
        skip_serializing_if = "Option::is_none"
    )]
    pub error_description: Option<String>,
}

/// Error code of an aborted interaction.
pub const ABORT_ERROR: &str = "access_denied";
/// Description of an aborted interaction.
pub const ABORT_DESCRIPTION: &str = "End-User aborted interaction";

impl InteractionOutcome {
    #[must_use]
    pub fn login(account_id: impl Into<String>) -> Self {
        Self {
            login: Some(LoginResult {
                account_id: account_id.into(),
            }),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn consent(grant_id: impl Into<String>) -> Self {
        Self {
            consent: Some(ConsentResult {
                grant_id: grant_id.into(),
            }),
            ..Self::default()
        }
    }

    /// The fixed result of an end-user abort.
    #[must_use]
    pub fn aborted() -> Self {
        Self {
            error: Some(ABORT_ERROR.to_string()),
            error_description: Some(ABORT_DESCRIPTION.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Combines this outcome with the interaction's previous submission.
    ///
    /// With [`MergeMode::MergeWithLastSubmission`] every member this outcome
    /// leaves unset is taken from `previous`. With [`MergeMode::Replace`]
    /// `previous` is discarded.
    #[must_use]
    pub fn merged_onto(self, previous: Option<&InteractionOutcome>, mode: MergeMode) -> Self {
        match (mode, previous) {
            (MergeMode::MergeWithLastSubmission, Some(previous)) => Self {
                login: self.login.or_else(|| previous.login.clone()),
                consent: self.consent.or_else(|| previous.consent.clone()),
                error: self.error.or_else(|| previous.error.clone()),
                error_description: self
                    .error_description
                    .or_else(|| previous.error_description.clone()),
            },
            _ => self,
        }
    }
}

/// How a new result relates to earlier submissions of the same interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Discard earlier submissions.
    Replace,
    /// Layer the result over the last submission.
    MergeWithLastSubmission,
}
