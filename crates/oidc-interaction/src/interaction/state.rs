//! Interaction state machine.
//!
//! ```text
//! pending-login --LoginSucceeded--> finished
//! pending-login --LoginRejected---> pending-login
//! pending-consent --ConsentGiven--> finished
//! any        --Abort--------------> aborted
//! ```
//!
//! The pending state comes from the prompt name alone. A stored result does
//! not close the interaction: the provider still owns it until the user agent
//! resumes, so a repeated submission or a late abort is accepted. Any other
//! event is a sequence violation.

use std::fmt;

use super::details::{InteractionDetails, PromptName};
use crate::error::{InteractionError, InteractionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionState {
    PendingLogin,
    PendingConsent,
    Finished,
    Aborted,
}

/// Something the end user did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionEvent {
    LoginSucceeded,
    LoginRejected,
    ConsentGiven,
    Abort,
}

impl InteractionEvent {
    /// The state the event is valid in, as shown in sequence errors.
    fn expected(self) -> &'static str {
        match self {
            Self::LoginSucceeded | Self::LoginRejected => "login",
            Self::ConsentGiven => "consent",
            Self::Abort => "pending interaction",
        }
    }
}

impl InteractionState {
    /// Derives the pending state from the interaction's prompt.
    #[must_use]
    pub fn of(details: &InteractionDetails) -> Self {
        if details.prompt.name == PromptName::Login {
            Self::PendingLogin
        } else {
            Self::PendingConsent
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }

    /// Applies an event.
    ///
    /// # Errors
    ///
    /// Returns `SequenceViolation` if the event is not valid in this state.
    pub fn apply(self, event: InteractionEvent) -> InteractionResult<Self> {
        use InteractionEvent as E;

        match (self, event) {
            (Self::PendingLogin, E::LoginSucceeded) => Ok(Self::Finished),
            (Self::PendingLogin, E::LoginRejected) => Ok(Self::PendingLogin),
            (Self::PendingConsent, E::ConsentGiven) => Ok(Self::Finished),
            (_, E::Abort) => Ok(Self::Aborted),
            (state, event) => Err(InteractionError::sequence_violation(
                event.expected(),
                state.to_string(),
            )),
        }
    }
}

impl fmt::Display for InteractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingLogin => write!(f, "login"),
            Self::PendingConsent => write!(f, "consent"),
            Self::Finished => write!(f, "finished"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}
