//! In-memory artifact store.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::artifact::{Artifact, ConsumeOutcome, Payload};
use crate::clock::{Clock, SystemClock};
use crate::error::{StoreError, StoreResult};
use crate::kind::ArtifactKind;
use crate::traits::{
    ArtifactStore, ensure_uid_lookup, ensure_user_code_lookup, validate_index_keys, validate_ttl,
};

type PrimaryKey = (ArtifactKind, String);

/// Secondary key to primary ids, per kind.
///
/// Entries may briefly point at ids whose artifact has since changed key;
/// readers re-check the primary record.
#[derive(Debug, Default)]
struct SecondaryIndex {
    entries: DashMap<PrimaryKey, BTreeSet<String>>,
}

impl SecondaryIndex {
    fn add(&self, kind: ArtifactKind, key: &str, id: &str) {
        self.entries
            .entry((kind, key.to_owned()))
            .or_default()
            .insert(id.to_owned());
    }

    fn remove(&self, kind: ArtifactKind, key: &str, id: &str) {
        if let Entry::Occupied(mut entry) = self.entries.entry((kind, key.to_owned())) {
            entry.get_mut().remove(id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }

    fn ids(&self, kind: ArtifactKind, key: &str) -> Vec<String> {
        self.entries
            .get(&(kind, key.to_owned()))
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Artifact store held entirely in process memory.
///
/// Backed by a sharded `DashMap`. Every mutation of an artifact happens
/// while its shard entry is locked, which makes `consume` a
/// compare-and-swap and keeps the secondary indexes in step with the
/// primary record. Suitable for tests and single-node deployments.
#[derive(Debug)]
pub struct MemoryArtifactStore {
    artifacts: DashMap<PrimaryKey, Artifact>,
    by_user_code: SecondaryIndex,
    by_uid: SecondaryIndex,
    by_grant_id: SecondaryIndex,
    clock: Arc<dyn Clock>,
}

impl MemoryArtifactStore {
    /// Creates an empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store that reads time from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            artifacts: DashMap::new(),
            by_user_code: SecondaryIndex::default(),
            by_uid: SecondaryIndex::default(),
            by_grant_id: SecondaryIndex::default(),
            clock,
        }
    }

    /// Number of physically stored artifacts, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    fn index(&self, artifact: &Artifact) {
        if let Some(code) = &artifact.user_code {
            self.by_user_code.add(artifact.kind, code, &artifact.id);
        }
        if let Some(uid) = &artifact.uid {
            self.by_uid.add(artifact.kind, uid, &artifact.id);
        }
        if let Some(grant_id) = &artifact.grant_id {
            self.by_grant_id.add(artifact.kind, grant_id, &artifact.id);
        }
    }

    fn unindex(&self, artifact: &Artifact) {
        if let Some(code) = &artifact.user_code {
            self.by_user_code.remove(artifact.kind, code, &artifact.id);
        }
        if let Some(uid) = &artifact.uid {
            self.by_uid.remove(artifact.kind, uid, &artifact.id);
        }
        if let Some(grant_id) = &artifact.grant_id {
            self.by_grant_id.remove(artifact.kind, grant_id, &artifact.id);
        }
    }

    /// Removes an artifact and its index entries while holding its entry.
    ///
    /// `predicate` is evaluated under the lock; nothing is removed when it
    /// returns `false`.
    fn remove_where(&self, kind: ArtifactKind, id: &str, predicate: impl Fn(&Artifact) -> bool) -> bool {
        match self.artifacts.entry((kind, id.to_owned())) {
            Entry::Occupied(entry) if predicate(entry.get()) => {
                let removed = entry.remove();
                self.unindex(&removed);
                true
            }
            _ => false,
        }
    }

    fn find_by_index(
        &self,
        index: &SecondaryIndex,
        index_name: &'static str,
        kind: ArtifactKind,
        key: &str,
        key_of: fn(&Artifact) -> Option<&str>,
    ) -> StoreResult<Option<Artifact>> {
        let now = self.clock.now();
        let mut live: Vec<Artifact> = index
            .ids(kind, key)
            .into_iter()
            .filter_map(|id| self.artifacts.get(&(kind, id)).map(|a| a.value().clone()))
            .filter(|artifact| key_of(artifact) == Some(key) && !artifact.is_expired(now))
            .collect();

        if live.len() > 1 {
            tracing::error!(
                kind = %kind,
                index = index_name,
                matches = live.len(),
                "Secondary index matched more than one live artifact"
            );
            return Err(StoreError::ambiguous_index(kind, index_name, key));
        }
        Ok(live.pop())
    }
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn upsert(
        &self,
        kind: ArtifactKind,
        id: &str,
        payload: Payload,
        ttl_seconds: Option<u64>,
    ) -> StoreResult<()> {
        validate_index_keys(kind, &payload)?;
        validate_ttl(ttl_seconds)?;

        let artifact = Artifact::new(kind, id, payload, ttl_seconds, self.clock.now());
        match self.artifacts.entry((kind, id.to_owned())) {
            Entry::Occupied(mut entry) => {
                let previous = entry.insert(artifact);
                self.unindex(&previous);
                self.index(entry.get());
            }
            Entry::Vacant(entry) => {
                let stored = entry.insert(artifact);
                self.index(stored.value());
            }
        }

        tracing::debug!(kind = %kind, id, ttl_seconds, "Artifact upserted");
        Ok(())
    }

    async fn find(&self, kind: ArtifactKind, id: &str) -> StoreResult<Option<Artifact>> {
        let now = self.clock.now();
        Ok(self
            .artifacts
            .get(&(kind, id.to_owned()))
            .map(|entry| entry.value().clone())
            .filter(|artifact| !artifact.is_expired(now)))
    }

    async fn find_by_user_code(
        &self,
        kind: ArtifactKind,
        user_code: &str,
    ) -> StoreResult<Option<Artifact>> {
        ensure_user_code_lookup(kind)?;
        self.find_by_index(&self.by_user_code, "userCode", kind, user_code, |a| {
            a.user_code.as_deref()
        })
    }

    async fn find_by_uid(&self, kind: ArtifactKind, uid: &str) -> StoreResult<Option<Artifact>> {
        ensure_uid_lookup(kind)?;
        self.find_by_index(&self.by_uid, "uid", kind, uid, |a| a.uid.as_deref())
    }

    async fn consume(&self, kind: ArtifactKind, id: &str) -> StoreResult<ConsumeOutcome> {
        let now = self.clock.now();
        // get_mut holds the shard write lock until the guard drops
        let Some(mut entry) = self.artifacts.get_mut(&(kind, id.to_owned())) else {
            return Ok(ConsumeOutcome::NotFound);
        };

        let artifact = entry.value_mut();
        if artifact.is_expired(now) {
            return Ok(ConsumeOutcome::NotFound);
        }
        if artifact.is_consumed() {
            return Ok(ConsumeOutcome::AlreadyConsumed);
        }
        artifact.consumed_at = Some(now);

        tracing::debug!(kind = %kind, id, "Artifact consumed");
        Ok(ConsumeOutcome::Consumed)
    }

    async fn destroy(&self, kind: ArtifactKind, id: &str) -> StoreResult<()> {
        if self.remove_where(kind, id, |_| true) {
            tracing::debug!(kind = %kind, id, "Artifact destroyed");
        }
        Ok(())
    }

    async fn revoke_by_grant_id(&self, kind: ArtifactKind, grant_id: &str) -> StoreResult<u64> {
        let mut removed = 0;
        for id in self.by_grant_id.ids(kind, grant_id) {
            if self.remove_where(kind, &id, |a| a.grant_id.as_deref() == Some(grant_id)) {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(kind = %kind, grant_id, removed, "Revoked artifacts by grant");
        }
        Ok(removed)
    }

    async fn cleanup_expired(&self) -> StoreResult<u64> {
        let now = self.clock.now();
        let expired: Vec<PrimaryKey> = self
            .artifacts
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for (kind, id) in expired {
            if self.remove_where(kind, &id, |a| a.is_expired(now)) {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Cleaned up expired artifacts");
        }
        Ok(removed)
    }
}
