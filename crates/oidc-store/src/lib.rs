//! # oidc-store
//!
//! Storage contract for the protocol artifacts of an OpenID Connect provider.
//!
//! Every artifact kind (sessions, interactions, grants, codes, tokens,
//! device and backchannel requests) goes through one uniform,
//! TTL-aware, multi-index adapter: [`ArtifactStore`].
//!
//! ## Modules
//!
//! - [`kind`] - Artifact kind tags
//! - [`artifact`] - Artifact records, payload envelope, consume outcome
//! - [`traits`] - The adapter contract
//! - [`memory`] - In-memory backend
//! - [`clock`] - Time source for expiry
//! - [`retry`] - Backoff helper for transient backend failures
//! - [`error`] - Store error types

pub mod artifact;
pub mod clock;
pub mod error;
pub mod kind;
pub mod memory;
pub mod retry;
pub mod traits;

pub use artifact::{Artifact, ConsumeOutcome, Payload, expiry_from_ttl};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StoreError, StoreErrorCategory, StoreResult};
pub use kind::ArtifactKind;
pub use memory::MemoryArtifactStore;
pub use retry::{RetryPolicy, retry_with_backoff};
pub use traits::{
    ArtifactStore, DynArtifactStore, MAX_TTL_SECONDS, ensure_uid_lookup, ensure_user_code_lookup,
    validate_index_keys, validate_ttl,
};
