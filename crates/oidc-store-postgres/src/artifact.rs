//! PostgreSQL storage for protocol artifacts.
//!
//! All kinds share the `oidc_artifacts` table, keyed by `(kind, id)`.
//! Expiry is evaluated against the database clock (`NOW()`), so every
//! read filters out rows whose `expires_at` has passed.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use tracing::instrument;

use oidc_store::{
    Artifact, ArtifactKind, ArtifactStore, ConsumeOutcome, Payload, StoreError, StoreResult,
    ensure_uid_lookup, ensure_user_code_lookup, validate_index_keys, validate_ttl,
};

use crate::PgPool;
use crate::error::store_error;

type ArtifactTuple = (
    String,
    String,
    Value,
    Option<OffsetDateTime>,
    Option<OffsetDateTime>,
    Option<String>,
    Option<String>,
    Option<String>,
);

const SELECT_COLUMNS: &str =
    "kind, id, payload, expires_at, consumed_at, grant_id, user_code, uid";

fn artifact_from_tuple(row: ArtifactTuple) -> StoreResult<Artifact> {
    Ok(Artifact {
        kind: row.0.parse()?,
        id: row.1,
        payload: row.2,
        expires_at: row.3,
        consumed_at: row.4,
        grant_id: row.5,
        user_code: row.6,
        uid: row.7,
    })
}

fn ttl_as_i64(ttl_seconds: Option<u64>) -> StoreResult<Option<i64>> {
    validate_ttl(ttl_seconds)?;
    ttl_seconds
        .map(|ttl| {
            i64::try_from(ttl)
                .map_err(|_| StoreError::invalid_input(format!("TTL out of range: {ttl}")))
        })
        .transpose()
}

// =============================================================================
// Artifact Storage
// =============================================================================

/// Artifact storage operations over a borrowed pool.
pub struct ArtifactStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> ArtifactStorage<'a> {
    /// Create a new artifact storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace an artifact, clearing `consumed_at`.
    #[instrument(skip(self, kind, payload), fields(kind = %kind))]
    pub async fn upsert(
        &self,
        kind: ArtifactKind,
        id: &str,
        payload: Payload,
        ttl_seconds: Option<u64>,
    ) -> StoreResult<()> {
        validate_index_keys(kind, &payload)?;
        let ttl = ttl_as_i64(ttl_seconds)?;

        query(
            r#"
            INSERT INTO oidc_artifacts
                (kind, id, payload, grant_id, user_code, uid, expires_at)
            VALUES (
                $1, $2, $3, $4, $5, $6,
                CASE WHEN $7::bigint IS NULL THEN NULL
                     ELSE NOW() + ($7::bigint * INTERVAL '1 second') END
            )
            ON CONFLICT (kind, id)
            DO UPDATE SET
                payload = EXCLUDED.payload,
                grant_id = EXCLUDED.grant_id,
                user_code = EXCLUDED.user_code,
                uid = EXCLUDED.uid,
                expires_at = EXCLUDED.expires_at,
                consumed_at = NULL,
                updated_at = NOW()
            "#,
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(&payload.body)
        .bind(payload.grant_id.as_deref())
        .bind(payload.user_code.as_deref())
        .bind(payload.uid.as_deref())
        .bind(ttl)
        .execute(self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    /// Find a live artifact by primary key.
    pub async fn find(&self, kind: ArtifactKind, id: &str) -> StoreResult<Option<Artifact>> {
        let sql = format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM oidc_artifacts
            WHERE kind = $1 AND id = $2
              AND (expires_at IS NULL OR expires_at > NOW())
            "#
        );
        let row: Option<ArtifactTuple> = query_as(&sql)
            .bind(kind.as_str())
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(store_error)?;

        row.map(artifact_from_tuple).transpose()
    }

    /// Find a live artifact by a secondary column.
    ///
    /// Fetches up to two rows so that a duplicate key surfaces as
    /// `AmbiguousIndex` instead of an arbitrary pick.
    async fn find_by_column(
        &self,
        kind: ArtifactKind,
        column: &'static str,
        index_name: &'static str,
        key: &str,
    ) -> StoreResult<Option<Artifact>> {
        let sql = format!(
            r#"
            SELECT {SELECT_COLUMNS}
            FROM oidc_artifacts
            WHERE kind = $1 AND {column} = $2
              AND (expires_at IS NULL OR expires_at > NOW())
            LIMIT 2
            "#
        );
        let mut rows: Vec<ArtifactTuple> = query_as(&sql)
            .bind(kind.as_str())
            .bind(key)
            .fetch_all(self.pool)
            .await
            .map_err(store_error)?;

        if rows.len() > 1 {
            tracing::error!(
                kind = %kind,
                index = index_name,
                "Secondary index matched more than one live artifact"
            );
            return Err(StoreError::ambiguous_index(kind, index_name, key));
        }
        rows.pop().map(artifact_from_tuple).transpose()
    }

    /// Find a live device code by its user code.
    pub async fn find_by_user_code(
        &self,
        kind: ArtifactKind,
        user_code: &str,
    ) -> StoreResult<Option<Artifact>> {
        ensure_user_code_lookup(kind)?;
        self.find_by_column(kind, "user_code", "userCode", user_code)
            .await
    }

    /// Find a live session or interaction by uid.
    pub async fn find_by_uid(&self, kind: ArtifactKind, uid: &str) -> StoreResult<Option<Artifact>> {
        ensure_uid_lookup(kind)?;
        self.find_by_column(kind, "uid", "uid", uid).await
    }

    /// Set `consumed_at` if unset, in a single conditional UPDATE.
    ///
    /// Row-level locking makes concurrent callers serialize on the row; only
    /// the first sees `consumed_at IS NULL`.
    #[instrument(skip(self, kind), fields(kind = %kind))]
    pub async fn consume(&self, kind: ArtifactKind, id: &str) -> StoreResult<ConsumeOutcome> {
        let updated: Option<(String,)> = query_as(
            r#"
            UPDATE oidc_artifacts
            SET consumed_at = NOW()
            WHERE kind = $1 AND id = $2
              AND consumed_at IS NULL
              AND (expires_at IS NULL OR expires_at > NOW())
            RETURNING id
            "#,
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(store_error)?;

        if updated.is_some() {
            return Ok(ConsumeOutcome::Consumed);
        }

        let existing: Option<(i32,)> = query_as(
            r#"
            SELECT 1
            FROM oidc_artifacts
            WHERE kind = $1 AND id = $2
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(store_error)?;

        // a live row that the UPDATE skipped was consumed by someone else,
        // or replaced after this caller lost the race
        Ok(if existing.is_some() {
            ConsumeOutcome::AlreadyConsumed
        } else {
            ConsumeOutcome::NotFound
        })
    }

    /// Delete an artifact. Missing rows are not an error.
    pub async fn destroy(&self, kind: ArtifactKind, id: &str) -> StoreResult<()> {
        query(
            r#"
            DELETE FROM oidc_artifacts
            WHERE kind = $1 AND id = $2
            "#,
        )
        .bind(kind.as_str())
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    /// Delete every artifact of `kind` referencing `grant_id`.
    #[instrument(skip(self, kind), fields(kind = %kind))]
    pub async fn revoke_by_grant_id(&self, kind: ArtifactKind, grant_id: &str) -> StoreResult<u64> {
        let result = query(
            r#"
            DELETE FROM oidc_artifacts
            WHERE kind = $1 AND grant_id = $2
            "#,
        )
        .bind(kind.as_str())
        .bind(grant_id)
        .execute(self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected())
    }

    /// Delete all expired rows.
    pub async fn cleanup_expired(&self) -> StoreResult<u64> {
        let result = query(
            r#"
            DELETE FROM oidc_artifacts
            WHERE expires_at IS NOT NULL AND expires_at <= NOW()
            "#,
        )
        .execute(self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Arc-Owning Adapter
// =============================================================================

/// Arc-owning PostgreSQL artifact store.
///
/// Owns an `Arc<PgPool>` so it can be shared as `Arc<dyn ArtifactStore>`.
#[derive(Clone)]
pub struct PostgresArtifactStore {
    pool: Arc<PgPool>,
}

impl PostgresArtifactStore {
    /// Create a new Arc-owning artifact store.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactStore for PostgresArtifactStore {
    async fn upsert(
        &self,
        kind: ArtifactKind,
        id: &str,
        payload: Payload,
        ttl_seconds: Option<u64>,
    ) -> StoreResult<()> {
        ArtifactStorage::new(&self.pool)
            .upsert(kind, id, payload, ttl_seconds)
            .await
    }

    async fn find(&self, kind: ArtifactKind, id: &str) -> StoreResult<Option<Artifact>> {
        ArtifactStorage::new(&self.pool).find(kind, id).await
    }

    async fn find_by_user_code(
        &self,
        kind: ArtifactKind,
        user_code: &str,
    ) -> StoreResult<Option<Artifact>> {
        ArtifactStorage::new(&self.pool)
            .find_by_user_code(kind, user_code)
            .await
    }

    async fn find_by_uid(&self, kind: ArtifactKind, uid: &str) -> StoreResult<Option<Artifact>> {
        ArtifactStorage::new(&self.pool).find_by_uid(kind, uid).await
    }

    async fn consume(&self, kind: ArtifactKind, id: &str) -> StoreResult<ConsumeOutcome> {
        ArtifactStorage::new(&self.pool).consume(kind, id).await
    }

    async fn destroy(&self, kind: ArtifactKind, id: &str) -> StoreResult<()> {
        ArtifactStorage::new(&self.pool).destroy(kind, id).await
    }

    async fn revoke_by_grant_id(&self, kind: ArtifactKind, grant_id: &str) -> StoreResult<u64> {
        ArtifactStorage::new(&self.pool)
            .revoke_by_grant_id(kind, grant_id)
            .await
    }

    async fn cleanup_expired(&self) -> StoreResult<u64> {
        ArtifactStorage::new(&self.pool).cleanup_expired().await
    }
}
