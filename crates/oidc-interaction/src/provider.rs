//! The provider boundary.
//!
//! The controller never touches interaction storage directly: it reads
//! interactions, looks up clients and finishes interactions through an
//! [`InteractionProvider`]. [`StoreInteractionProvider`] keeps interactions
//! as `Interaction` artifacts in the artifact store.

use std::sync::Arc;

use async_trait::async_trait;
use oidc_store::{
    Artifact, ArtifactKind, Clock, DynArtifactStore, Payload, RetryPolicy, SystemClock,
    retry_with_backoff,
};
use serde::{Deserialize, Serialize};

use crate::client::{ClientMetadata, ClientRegistry};
use crate::error::{InteractionError, InteractionResult};
use crate::interaction::{InteractionDetails, InteractionOutcome, InteractionSession, MergeMode};
use crate::policy::{TtlKind, TtlPolicyTable};

/// Operations the interaction flow needs from the authorization server.
#[async_trait]
pub trait InteractionProvider: Send + Sync {
    /// Loads a live interaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails or the stored document
    /// is malformed. A missing interaction is `Ok(None)`.
    async fn interaction_details(&self, uid: &str) -> InteractionResult<Option<InteractionDetails>>;

    /// Looks up a registered client.
    async fn find_client(&self, client_id: &str) -> InteractionResult<Option<ClientMetadata>>;

    /// Records the interaction's result and hands control back to the
    /// authorization server.
    ///
    /// # Returns
    ///
    /// The URL the user agent is redirected to.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the interaction expired in the meantime, or a
    /// store error.
    async fn interaction_finished(
        &self,
        uid: &str,
        outcome: InteractionOutcome,
        merge: MergeMode,
    ) -> InteractionResult<String>;
}

/// Stored form of an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    #[serde(flatten)]
    pub details: InteractionDetails,
    /// Where the authorization request resumes.
    pub return_to: String,
}

/// Provider backed by the artifact store and a static client registry.
pub struct StoreInteractionProvider {
    store: DynArtifactStore,
    clients: ClientRegistry,
    ttl: TtlPolicyTable,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl StoreInteractionProvider {
    #[must_use]
    pub fn new(store: DynArtifactStore, clients: ClientRegistry, ttl: TtlPolicyTable) -> Self {
        Self {
            store,
            clients,
            ttl,
            retry: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Uses `clock` to compute remaining lifetimes.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Stores a new interaction with the configured interaction lifetime.
    ///
    /// # Returns
    ///
    /// The interaction uid.
    ///
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    pub async fn create_interaction(
        &self,
        details: InteractionDetails,
        return_to: impl Into<String>,
    ) -> InteractionResult<String> {
        let uid = details.uid.clone();
        let record = InteractionRecord {
            details,
            return_to: return_to.into(),
        };
        let ttl = self.ttl.fixed(TtlKind::Interaction);
        self.write(&record, Some(ttl)).await?;

        tracing::debug!(uid = %uid, ttl, "Interaction created");
        Ok(uid)
    }

    async fn load(&self, uid: &str) -> InteractionResult<Option<(InteractionRecord, Artifact)>> {
        let artifact = retry_with_backoff(self.retry, "interaction.find", || {
            self.store.find(ArtifactKind::Interaction, uid)
        })
        .await?;

        match artifact {
            Some(artifact) => {
                let record: InteractionRecord = serde_json::from_value(artifact.payload.clone())?;
                Ok(Some((record, artifact)))
            }
            None => Ok(None),
        }
    }

    async fn write(&self, record: &InteractionRecord, ttl: Option<u64>) -> InteractionResult<()> {
        let body = serde_json::to_value(record)?;
        let uid = record.details.uid.as_str();
        retry_with_backoff(self.retry, "interaction.upsert", || {
            self.store.upsert(
                ArtifactKind::Interaction,
                uid,
                Payload::from_provider_json(body.clone()),
                ttl,
            )
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl InteractionProvider for StoreInteractionProvider {
    async fn interaction_details(&self, uid: &str) -> InteractionResult<Option<InteractionDetails>> {
        Ok(self.load(uid).await?.map(|(record, _)| record.details))
    }

    async fn find_client(&self, client_id: &str) -> InteractionResult<Option<ClientMetadata>> {
        Ok(self.clients.find(client_id).cloned())
    }

    async fn interaction_finished(
        &self,
        uid: &str,
        outcome: InteractionOutcome,
        merge: MergeMode,
    ) -> InteractionResult<String> {
        let (mut record, artifact) = self
            .load(uid)
            .await?
            .ok_or_else(|| InteractionError::not_found(uid))?;

        // Keep the original expiry rather than restarting the window.
        let remaining = artifact.remaining_ttl(self.clock.now());
        if remaining == Some(0) {
            return Err(InteractionError::not_found(uid));
        }

        let result = outcome.merged_onto(record.details.last_submission.as_ref(), merge);
        if let Some(login) = &result.login {
            record.details.session = Some(InteractionSession {
                account_id: login.account_id.clone(),
            });
        }
        record.details.last_submission = Some(result.clone());
        record.details.result = Some(result);

        self.write(&record, remaining).await?;

        tracing::debug!(uid, ?merge, "Interaction finished");
        Ok(record.return_to)
    }
}

impl std::fmt::Debug for StoreInteractionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreInteractionProvider")
            .field("clients", &self.clients.len())
            .field("ttl", &self.ttl)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
