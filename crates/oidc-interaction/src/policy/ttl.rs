//! Per-kind TTL policies.
//!
//! Each kind maps to a plain function of (config, request context, draft
//! artifact, client). The functions do no I/O and can run inline while an
//! artifact is being created.

use oidc_store::ArtifactKind;

use crate::client::ClientMetadata;
use crate::config::{ResourceServerConfig, TtlConfig};

/// Kinds that have a lifetime policy.
///
/// This is [`ArtifactKind`] plus `IdToken`, which is issued but never
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TtlKind {
    AccessToken,
    AuthorizationCode,
    BackchannelAuthenticationRequest,
    ClientCredentials,
    DeviceCode,
    Grant,
    IdToken,
    Interaction,
    RefreshToken,
    Session,
    PushedAuthorizationRequest,
}

impl From<ArtifactKind> for TtlKind {
    fn from(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Session => Self::Session,
            ArtifactKind::Interaction => Self::Interaction,
            ArtifactKind::Grant => Self::Grant,
            ArtifactKind::AuthorizationCode => Self::AuthorizationCode,
            ArtifactKind::AccessToken => Self::AccessToken,
            ArtifactKind::RefreshToken => Self::RefreshToken,
            ArtifactKind::DeviceCode => Self::DeviceCode,
            ArtifactKind::ClientCredentials => Self::ClientCredentials,
            ArtifactKind::BackchannelAuthenticationRequest => {
                Self::BackchannelAuthenticationRequest
            }
            ArtifactKind::PushedAuthorizationRequest => Self::PushedAuthorizationRequest,
        }
    }
}

/// The refresh token consumed to produce the one being issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotatedRefreshToken {
    /// Seconds the predecessor had left when it was rotated.
    pub remaining_ttl: u64,
}

/// Request-scoped inputs to a policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TtlContext {
    /// `requested_expiry` of a backchannel authentication request, in seconds.
    pub requested_expiry: Option<u64>,
    /// Present when the token being issued replaces a rotated refresh token.
    pub rotated_refresh_token: Option<RotatedRefreshToken>,
}

/// Resource server a token is audienced to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceServerInfo {
    pub indicator: String,
    pub scope: String,
    /// Access token lifetime configured for the server, in seconds.
    pub access_token_ttl: Option<u64>,
}

impl From<&ResourceServerConfig> for ResourceServerInfo {
    fn from(config: &ResourceServerConfig) -> Self {
        Self {
            indicator: config.indicator.clone(),
            scope: config.scope.clone(),
            access_token_ttl: config.access_token_ttl.map(|ttl| ttl.as_secs()),
        }
    }
}

/// The artifact about to be stored, as far as the policies care.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactDraft {
    pub resource_server: Option<ResourceServerInfo>,
    /// Bound to a DPoP key or mTLS certificate.
    pub sender_constrained: bool,
}

/// A lifetime policy, in seconds.
pub type TtlPolicy = fn(&TtlConfig, &TtlContext, &ArtifactDraft, Option<&ClientMetadata>) -> u64;

impl TtlKind {
    /// Returns the policy function for this kind.
    #[must_use]
    pub fn policy(self) -> TtlPolicy {
        match self {
            Self::AccessToken => access_token_ttl,
            Self::AuthorizationCode => authorization_code_ttl,
            Self::BackchannelAuthenticationRequest => backchannel_authentication_request_ttl,
            Self::ClientCredentials => client_credentials_ttl,
            Self::DeviceCode => device_code_ttl,
            Self::Grant => grant_ttl,
            Self::IdToken => id_token_ttl,
            Self::Interaction => interaction_ttl,
            Self::RefreshToken => refresh_token_ttl,
            Self::Session => session_ttl,
            Self::PushedAuthorizationRequest => pushed_authorization_request_ttl,
        }
    }
}

fn resource_server_ttl(draft: &ArtifactDraft) -> Option<u64> {
    draft
        .resource_server
        .as_ref()
        .and_then(|server| server.access_token_ttl)
        .filter(|ttl| *ttl > 0)
}

fn access_token_ttl(
    config: &TtlConfig,
    _ctx: &TtlContext,
    draft: &ArtifactDraft,
    _client: Option<&ClientMetadata>,
) -> u64 {
    resource_server_ttl(draft).unwrap_or(config.access_token.as_secs())
}

fn client_credentials_ttl(
    config: &TtlConfig,
    _ctx: &TtlContext,
    draft: &ArtifactDraft,
    _client: Option<&ClientMetadata>,
) -> u64 {
    resource_server_ttl(draft).unwrap_or(config.client_credentials.as_secs())
}

fn authorization_code_ttl(
    config: &TtlConfig,
    _ctx: &TtlContext,
    _draft: &ArtifactDraft,
    _client: Option<&ClientMetadata>,
) -> u64 {
    config.authorization_code.as_secs()
}

fn device_code_ttl(
    config: &TtlConfig,
    _ctx: &TtlContext,
    _draft: &ArtifactDraft,
    _client: Option<&ClientMetadata>,
) -> u64 {
    config.device_code.as_secs()
}

fn backchannel_authentication_request_ttl(
    config: &TtlConfig,
    ctx: &TtlContext,
    _draft: &ArtifactDraft,
    _client: Option<&ClientMetadata>,
) -> u64 {
    let max = config.backchannel_authentication_request.as_secs();
    ctx.requested_expiry.map_or(max, |requested| requested.min(max))
}

fn grant_ttl(
    config: &TtlConfig,
    _ctx: &TtlContext,
    _draft: &ArtifactDraft,
    _client: Option<&ClientMetadata>,
) -> u64 {
    config.grant.as_secs()
}

fn id_token_ttl(
    config: &TtlConfig,
    _ctx: &TtlContext,
    _draft: &ArtifactDraft,
    _client: Option<&ClientMetadata>,
) -> u64 {
    config.id_token.as_secs()
}

fn interaction_ttl(
    config: &TtlConfig,
    _ctx: &TtlContext,
    _draft: &ArtifactDraft,
    _client: Option<&ClientMetadata>,
) -> u64 {
    config.interaction.as_secs()
}

/// Public web clients inherit the rotated predecessor's remaining lifetime,
/// which caps a rotation chain at the original issuance window. Sender
/// constrained tokens and every other client get a fresh window.
fn refresh_token_ttl(
    config: &TtlConfig,
    ctx: &TtlContext,
    draft: &ArtifactDraft,
    client: Option<&ClientMetadata>,
) -> u64 {
    match (ctx.rotated_refresh_token, client) {
        (Some(rotated), Some(client)) if client.is_public_web() && !draft.sender_constrained => {
            rotated.remaining_ttl
        }
        _ => config.refresh_token.as_secs(),
    }
}

fn session_ttl(
    config: &TtlConfig,
    _ctx: &TtlContext,
    _draft: &ArtifactDraft,
    _client: Option<&ClientMetadata>,
) -> u64 {
    config.session.as_secs()
}

fn pushed_authorization_request_ttl(
    config: &TtlConfig,
    _ctx: &TtlContext,
    _draft: &ArtifactDraft,
    _client: Option<&ClientMetadata>,
) -> u64 {
    config.pushed_authorization_request.as_secs()
}

/// Policy table bound to a lifetime configuration.
#[derive(Debug, Clone, Default)]
pub struct TtlPolicyTable {
    config: TtlConfig,
}

impl TtlPolicyTable {
    #[must_use]
    pub fn new(config: TtlConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &TtlConfig {
        &self.config
    }

    /// Computes the lifetime in seconds for an artifact of `kind`.
    #[must_use]
    pub fn ttl(
        &self,
        kind: TtlKind,
        ctx: &TtlContext,
        draft: &ArtifactDraft,
        client: Option<&ClientMetadata>,
    ) -> u64 {
        (kind.policy())(&self.config, ctx, draft, client)
    }

    /// Lifetime of a kind whose policy needs no context.
    #[must_use]
    pub fn fixed(&self, kind: TtlKind) -> u64 {
        self.ttl(kind, &TtlContext::default(), &ArtifactDraft::default(), None)
    }
}
