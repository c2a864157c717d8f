//! HTTP surface of the interaction flow.
//!
//! - [`interaction`] - Route handlers and router
//! - [`templates`] - Server-rendered pages
//! - [`error`] - `IntoResponse` for [`InteractionError`](crate::InteractionError)

pub mod error;
pub mod interaction;
pub mod templates;

pub use interaction::{
    InteractionHttpState, LoginForm, interaction_abort, interaction_confirm, interaction_entry,
    interaction_login, interaction_router,
};
