//! Declarative provider policies.
//!
//! - [`ttl`] - Lifetime per artifact kind
//! - [`refresh`] - Whether a code exchange yields a refresh token

pub mod refresh;
pub mod ttl;

pub use refresh::issue_refresh_token;
pub use ttl::{
    ArtifactDraft, ResourceServerInfo, RotatedRefreshToken, TtlContext, TtlKind, TtlPolicy,
    TtlPolicyTable,
};
