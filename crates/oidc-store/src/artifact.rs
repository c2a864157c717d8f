//! Artifact records and the payload envelope passed to `upsert`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Duration, OffsetDateTime};

use crate::kind::ArtifactKind;

/// Opaque payload plus the index keys the store maintains next to it.
///
/// The store never looks inside `body`. The index keys are lifted out by the
/// caller (see [`Payload::from_provider_json`]) so that backends can keep
/// secondary indexes without interpreting the provider's document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    /// Provider-owned document.
    pub body: Value,
    /// Grant this artifact was issued under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_id: Option<String>,
    /// Device-flow user code (DeviceCode only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_code: Option<String>,
    /// Secondary uid (Session and Interaction only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl Payload {
    /// Wraps a document with no index keys.
    #[must_use]
    pub fn new(body: Value) -> Self {
        Self {
            body,
            grant_id: None,
            user_code: None,
            uid: None,
        }
    }

    /// Builds a payload from a provider document, reading the top-level
    /// `grantId`, `userCode` and `uid` string members as index keys.
    #[must_use]
    pub fn from_provider_json(body: Value) -> Self {
        let key = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_owned);
        let grant_id = key("grantId");
        let user_code = key("userCode");
        let uid = key("uid");
        Self {
            body,
            grant_id,
            user_code,
            uid,
        }
    }

    #[must_use]
    pub fn with_grant_id(mut self, grant_id: impl Into<String>) -> Self {
        self.grant_id = Some(grant_id.into());
        self
    }

    #[must_use]
    pub fn with_user_code(mut self, user_code: impl Into<String>) -> Self {
        self.user_code = Some(user_code.into());
        self
    }

    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }
}

/// A stored artifact as returned by lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub id: String,
    pub payload: Value,
    /// `None` means the artifact never expires.
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub consumed_at: Option<OffsetDateTime>,
    pub grant_id: Option<String>,
    pub user_code: Option<String>,
    pub uid: Option<String>,
}

impl Artifact {
    /// Builds a fresh, unconsumed artifact from an upsert request.
    #[must_use]
    pub fn new(
        kind: ArtifactKind,
        id: impl Into<String>,
        payload: Payload,
        ttl_seconds: Option<u64>,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            payload: payload.body,
            expires_at: expiry_from_ttl(now, ttl_seconds),
            consumed_at: None,
            grant_id: payload.grant_id,
            user_code: payload.user_code,
            uid: payload.uid,
        }
    }

    /// Returns `true` once `now` has reached `expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    /// Whole seconds left before expiry, rounded down.
    ///
    /// Returns `None` for permanent artifacts and `Some(0)` once expired.
    #[must_use]
    pub fn remaining_ttl(&self, now: OffsetDateTime) -> Option<u64> {
        self.expires_at.map(|at| {
            let left = (at - now).whole_seconds();
            u64::try_from(left).unwrap_or(0)
        })
    }
}

/// Converts a TTL into an absolute expiry.
///
/// Backends reject TTLs above [`MAX_TTL_SECONDS`](crate::MAX_TTL_SECONDS)
/// first; past that, an unrepresentable expiry comes back as `None`.
#[must_use]
pub fn expiry_from_ttl(now: OffsetDateTime, ttl_seconds: Option<u64>) -> Option<OffsetDateTime> {
    let ttl = ttl_seconds?;
    let seconds = i64::try_from(ttl).ok()?;
    now.checked_add(Duration::seconds(seconds))
}

/// Result of a [`consume`](crate::ArtifactStore::consume) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// This call set `consumedAt`.
    Consumed,
    /// Another caller consumed the artifact first.
    AlreadyConsumed,
    /// No live artifact exists under that id.
    NotFound,
}

impl ConsumeOutcome {
    /// Returns `true` only for the caller that performed the transition.
    #[must_use]
    pub fn performed(&self) -> bool {
        matches!(self, Self::Consumed)
    }
}
