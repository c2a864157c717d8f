//! Grants and the consent merge engine.
//!
//! A grant records what an account has authorized for a client. Consent
//! only ever widens it: every merge is a set union, so submitting the same
//! consent twice leaves the grant unchanged.

use std::collections::{BTreeMap, BTreeSet};

use oidc_store::{
    ArtifactKind, DynArtifactStore, Payload, RetryPolicy, StoreResult, retry_with_backoff,
};
use serde::{Deserialize, Serialize};

use crate::policy::{TtlKind, TtlPolicyTable};

/// Durable authorization of an account for a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    /// Grant id (also the store id).
    pub id: String,
    pub account_id: String,
    pub client_id: String,
    #[serde(default)]
    pub oidc_scope: BTreeSet<String>,
    #[serde(default)]
    pub oidc_claims: BTreeSet<String>,
    /// Granted scopes per resource indicator.
    #[serde(default)]
    pub resource_scopes: BTreeMap<String, BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub rejected_oidc_scope: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub rejected_oidc_claims: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rejected_resource_scopes: BTreeMap<String, BTreeSet<String>>,
}

fn tokens(scope: &str) -> impl Iterator<Item = String> + '_ {
    scope.split_whitespace().map(str::to_owned)
}

impl Grant {
    /// Creates an empty grant with a fresh id.
    #[must_use]
    pub fn new(account_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: account_id.into(),
            client_id: client_id.into(),
            oidc_scope: BTreeSet::new(),
            oidc_claims: BTreeSet::new(),
            resource_scopes: BTreeMap::new(),
            rejected_oidc_scope: BTreeSet::new(),
            rejected_oidc_claims: BTreeSet::new(),
            rejected_resource_scopes: BTreeMap::new(),
        }
    }

    /// Adds space-delimited OpenID scopes.
    pub fn add_oidc_scope(&mut self, scope: &str) {
        self.oidc_scope.extend(tokens(scope));
    }

    pub fn add_oidc_claims<I, S>(&mut self, claims: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.oidc_claims.extend(claims.into_iter().map(Into::into));
    }

    /// Adds space-delimited scopes for a resource indicator.
    pub fn add_resource_scope(&mut self, indicator: &str, scope: &str) {
        self.resource_scopes
            .entry(indicator.to_string())
            .or_default()
            .extend(tokens(scope));
    }

    pub fn reject_oidc_scope(&mut self, scope: &str) {
        for token in tokens(scope) {
            self.oidc_scope.remove(&token);
            self.rejected_oidc_scope.insert(token);
        }
    }

    pub fn reject_oidc_claims<I, S>(&mut self, claims: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for claim in claims.into_iter().map(Into::into) {
            self.oidc_claims.remove(&claim);
            self.rejected_oidc_claims.insert(claim);
        }
    }

    pub fn reject_resource_scope(&mut self, indicator: &str, scope: &str) {
        let rejected = self
            .rejected_resource_scopes
            .entry(indicator.to_string())
            .or_default();
        for token in tokens(scope) {
            if let Some(granted) = self.resource_scopes.get_mut(indicator) {
                granted.remove(&token);
            }
            rejected.insert(token);
        }
        if self
            .resource_scopes
            .get(indicator)
            .is_some_and(BTreeSet::is_empty)
        {
            self.resource_scopes.remove(indicator);
        }
    }

    /// Returns `true` if the grant belongs to this account and client.
    #[must_use]
    pub fn is_for(&self, account_id: &str, client_id: &str) -> bool {
        self.account_id == account_id && self.client_id == client_id
    }

    /// Granted OpenID scopes joined with spaces.
    #[must_use]
    pub fn oidc_scope_string(&self) -> String {
        self.oidc_scope
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What the consent prompt found missing from the current grant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingGrants {
    #[serde(
        default,
        rename = "missingOIDCScope",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub oidc_scope: Vec<String>,
    #[serde(
        default,
        rename = "missingOIDCClaims",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub oidc_claims: Vec<String>,
    /// Missing scopes per resource indicator.
    #[serde(
        default,
        rename = "missingResourceScopes",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub resource_scopes: BTreeMap<String, Vec<String>>,
}

impl MissingGrants {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.oidc_scope.is_empty() && self.oidc_claims.is_empty() && self.resource_scopes.is_empty()
    }
}

/// Folds the missing sets into `existing`, or into a fresh grant when there
/// is none or it belongs to a different account or client.
#[must_use]
pub fn merge_consent(
    existing: Option<Grant>,
    account_id: &str,
    client_id: &str,
    missing: &MissingGrants,
) -> Grant {
    let mut grant = match existing {
        Some(grant) if grant.is_for(account_id, client_id) => grant,
        Some(grant) => {
            tracing::warn!(
                grant_id = %grant.id,
                "Existing grant belongs to a different account or client, starting a new one"
            );
            Grant::new(account_id, client_id)
        }
        None => Grant::new(account_id, client_id),
    };

    if !missing.oidc_scope.is_empty() {
        grant.add_oidc_scope(&missing.oidc_scope.join(" "));
    }
    if !missing.oidc_claims.is_empty() {
        grant.add_oidc_claims(missing.oidc_claims.iter().cloned());
    }
    for (indicator, scopes) in &missing.resource_scopes {
        grant.add_resource_scope(indicator, &scopes.join(" "));
    }

    grant
}

// =============================================================================
// Grant Service
// =============================================================================

/// Loads, merges and persists grants through the artifact store.
#[derive(Clone)]
pub struct GrantService {
    store: DynArtifactStore,
    ttl: TtlPolicyTable,
    retry: RetryPolicy,
}

impl GrantService {
    #[must_use]
    pub fn new(store: DynArtifactStore, ttl: TtlPolicyTable) -> Self {
        Self {
            store,
            ttl,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Loads a live grant.
    ///
    /// # Errors
    ///
    /// Returns a store error, or `Serialization` if the stored document is
    /// not a grant.
    pub async fn find(&self, grant_id: &str) -> StoreResult<Option<Grant>> {
        let artifact = retry_with_backoff(self.retry, "grant.find", || {
            self.store.find(ArtifactKind::Grant, grant_id)
        })
        .await?;

        artifact
            .map(|artifact| serde_json::from_value(artifact.payload))
            .transpose()
            .map_err(Into::into)
    }

    /// Writes a grant with the configured grant lifetime.
    ///
    /// # Errors
    ///
    /// Returns a store error; the stored grant is then unchanged.
    pub async fn save(&self, grant: &Grant) -> StoreResult<()> {
        let body = serde_json::to_value(grant)?;
        let ttl = self.ttl.fixed(TtlKind::Grant);
        retry_with_backoff(self.retry, "grant.save", || {
            self.store.upsert(
                ArtifactKind::Grant,
                &grant.id,
                Payload::new(body.clone()),
                Some(ttl),
            )
        })
        .await
    }

    /// Runs the merge engine against the interaction's grant and persists
    /// the result.
    ///
    /// # Returns
    ///
    /// The id of the saved grant, which is new when `existing_grant_id` is
    /// `None` or no longer resolves.
    ///
    /// # Errors
    ///
    /// Returns a store error from the lookup or the write.
    pub async fn merge_consent(
        &self,
        existing_grant_id: Option<&str>,
        account_id: &str,
        client_id: &str,
        missing: &MissingGrants,
    ) -> StoreResult<Grant> {
        let existing = match existing_grant_id {
            Some(grant_id) => self.find(grant_id).await?,
            None => None,
        };
        let grant = merge_consent(existing, account_id, client_id, missing);
        self.save(&grant).await?;

        tracing::debug!(
            grant_id = %grant.id,
            account_id,
            client_id,
            "Consent merged into grant"
        );
        Ok(grant)
    }

    /// Destroys a grant and every token or code issued under it.
    ///
    /// # Returns
    ///
    /// The number of dependent artifacts removed.
    ///
    /// # Errors
    ///
    /// Returns the first store error; kinds already revoked stay revoked.
    pub async fn revoke(&self, grant_id: &str) -> StoreResult<u64> {
        self.store.destroy(ArtifactKind::Grant, grant_id).await?;

        let mut removed = 0;
        for kind in ArtifactKind::GRANT_BOUND {
            removed += self.store.revoke_by_grant_id(kind, grant_id).await?;
        }

        tracing::info!(grant_id, removed, "Grant revoked");
        Ok(removed)
    }
}

impl std::fmt::Debug for GrantService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantService")
            .field("ttl", &self.ttl)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
