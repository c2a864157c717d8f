//! Login and consent interactions.
//!
//! - [`details`] - Stored interaction document
//! - [`outcome`] - Results and merge modes
//! - [`state`] - State machine
//! - [`controller`] - The controller the HTTP handlers call

pub mod controller;
pub mod details;
pub mod outcome;
pub mod state;

pub use controller::{
    ConsentView, EntryView, Finalization, INVALID_CREDENTIALS, InteractionController,
    LoginSubmission, LoginView,
};
pub use details::{AuthorizationParams, InteractionDetails, InteractionSession, Prompt, PromptName};
pub use outcome::{
    ABORT_DESCRIPTION, ABORT_ERROR, ConsentResult, InteractionOutcome, LoginResult, MergeMode,
};
pub use state::{InteractionEvent, InteractionState};
