//! The artifact adapter contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::artifact::{Artifact, ConsumeOutcome, Payload};
use crate::error::StoreResult;
use crate::kind::ArtifactKind;

/// Storage contract every backend implements for every artifact kind.
///
/// All operations take the kind as a first-class argument; `(kind, id)` is
/// the primary key. Expiry is lazy: an artifact whose `expires_at` has
/// passed is reported as absent by every read, whether or not it has been
/// physically removed.
///
/// # Implementations
///
/// - [`MemoryArtifactStore`](crate::MemoryArtifactStore) - in-process, `DashMap` backed
/// - `oidc-store-postgres` - PostgreSQL storage backend
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores or replaces an artifact.
    ///
    /// Replacing an artifact clears its `consumed_at`.
    ///
    /// # Arguments
    ///
    /// * `kind` - Artifact kind
    /// * `id` - Primary id, unique within the kind
    /// * `payload` - Provider document plus index keys
    /// * `ttl_seconds` - Lifetime from now; `None` stores a permanent artifact
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the payload carries a `user_code` for a kind
    /// other than DeviceCode or a `uid` for a kind other than Session or
    /// Interaction, or a TTL above [`MAX_TTL_SECONDS`]. Returns
    /// `Unavailable` if the backend cannot be reached;
    /// the artifact is then unchanged.
    async fn upsert(
        &self,
        kind: ArtifactKind,
        id: &str,
        payload: Payload,
        ttl_seconds: Option<u64>,
    ) -> StoreResult<()>;

    /// Finds a live artifact by primary id.
    ///
    /// # Returns
    ///
    /// Returns `Some(artifact)` if found and not expired, `None` otherwise.
    /// Consumed artifacts are returned; callers check `consumed_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find(&self, kind: ArtifactKind, id: &str) -> StoreResult<Option<Artifact>>;

    /// Finds a live artifact by its device-flow user code.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for kinds without a user code and
    /// `AmbiguousIndex` if more than one live artifact matches.
    async fn find_by_user_code(
        &self,
        kind: ArtifactKind,
        user_code: &str,
    ) -> StoreResult<Option<Artifact>>;

    /// Finds a live artifact by its uid.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for kinds without a uid and `AmbiguousIndex`
    /// if more than one live artifact matches.
    async fn find_by_uid(&self, kind: ArtifactKind, uid: &str) -> StoreResult<Option<Artifact>>;

    /// Marks an artifact consumed if it is not already.
    ///
    /// This is a compare-and-swap on `consumed_at`: among any number of
    /// concurrent callers on the same `(kind, id)`, exactly one receives
    /// [`ConsumeOutcome::Consumed`].
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. A missing or
    /// expired artifact is [`ConsumeOutcome::NotFound`], not an error.
    async fn consume(&self, kind: ArtifactKind, id: &str) -> StoreResult<ConsumeOutcome>;

    /// Removes an artifact. Removing a missing artifact succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn destroy(&self, kind: ArtifactKind, id: &str) -> StoreResult<()>;

    /// Removes every artifact of `kind` issued under `grant_id`.
    ///
    /// # Returns
    ///
    /// The number of artifacts removed; zero when nothing matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_by_grant_id(&self, kind: ArtifactKind, grant_id: &str) -> StoreResult<u64>;

    /// Physically removes expired artifacts of every kind.
    ///
    /// Reads never depend on this having run.
    ///
    /// # Returns
    ///
    /// The number of artifacts removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn cleanup_expired(&self) -> StoreResult<u64>;
}

/// Shared handle to a store backend.
pub type DynArtifactStore = Arc<dyn ArtifactStore>;

/// Longest accepted TTL: one hundred years.
pub const MAX_TTL_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

/// Rejects a TTL no backend can turn into an expiry.
///
/// Backends call this from `upsert` before writing anything.
pub fn validate_ttl(ttl_seconds: Option<u64>) -> StoreResult<()> {
    match ttl_seconds {
        Some(ttl) if ttl > MAX_TTL_SECONDS => Err(crate::StoreError::invalid_input(format!(
            "TTL out of range: {ttl} (max {MAX_TTL_SECONDS})"
        ))),
        _ => Ok(()),
    }
}

/// Rejects index keys that do not apply to `kind`.
///
/// Backends call this from `upsert` before writing anything.
pub fn validate_index_keys(kind: ArtifactKind, payload: &Payload) -> StoreResult<()> {
    if payload.user_code.is_some() && !kind.supports_user_code() {
        return Err(crate::StoreError::invalid_input(format!(
            "userCode is not supported for {kind}"
        )));
    }
    if payload.uid.is_some() && !kind.supports_uid() {
        return Err(crate::StoreError::invalid_input(format!(
            "uid is not supported for {kind}"
        )));
    }
    Ok(())
}

/// Rejects a user-code lookup on a kind that has no user codes.
pub fn ensure_user_code_lookup(kind: ArtifactKind) -> StoreResult<()> {
    if kind.supports_user_code() {
        Ok(())
    } else {
        Err(crate::StoreError::invalid_input(format!(
            "{kind} has no userCode index"
        )))
    }
}

/// Rejects a uid lookup on a kind that has no uid.
pub fn ensure_uid_lookup(kind: ArtifactKind) -> StoreResult<()> {
    if kind.supports_uid() {
        Ok(())
    } else {
        Err(crate::StoreError::invalid_input(format!(
            "{kind} has no uid index"
        )))
    }
}
