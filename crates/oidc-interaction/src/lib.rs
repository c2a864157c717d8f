//! # oidc-interaction
//!
//! End-user interaction flow of an OpenID Connect provider: the login and
//! consent state machine, the grant merge engine and the per-kind TTL
//! policies, plus the axum routes that expose them.
//!
//! ## Modules
//!
//! - [`config`] - Provider configuration (lifetimes, clients, accounts)
//! - [`client`] - Client metadata and registry
//! - [`policy`] - TTL policy table and refresh token issuance
//! - [`grant`] - Grants, consent merging and cascading revocation
//! - [`account`] - Account resolver hooks and password hashing
//! - [`provider`] - Provider boundary and the store-backed provider
//! - [`interaction`] - Interaction model and controller
//! - [`http`] - HTTP handlers and templates
//! - [`error`] - Interaction error types

pub mod account;
pub mod client;
pub mod config;
pub mod error;
pub mod grant;
pub mod http;
pub mod interaction;
pub mod policy;
pub mod provider;

pub use account::{
    Account, AccountClaims, AccountError, AccountFinder, AccountResolver, AccountResult,
    StaticAccountResolver, dummy_password_hash, hash_password, reject_unknown_account,
    verify_password,
};
pub use client::{
    ApplicationType, ClientMetadata, ClientRegistry, GrantType, TokenEndpointAuthMethod,
    default_client,
};
pub use config::{AccountConfig, ConfigError, ProviderConfig, ResourceServerConfig, TtlConfig};
pub use error::{InteractionError, InteractionErrorCategory, InteractionResult};
pub use grant::{Grant, GrantService, MissingGrants, merge_consent};
pub use http::{InteractionHttpState, interaction_router};
pub use interaction::{
    AuthorizationParams, EntryView, Finalization, InteractionController, InteractionDetails,
    InteractionOutcome, InteractionState, LoginSubmission, MergeMode, Prompt, PromptName,
};
pub use policy::{
    ArtifactDraft, TtlContext, TtlKind, TtlPolicyTable, issue_refresh_token,
};
pub use provider::{InteractionProvider, InteractionRecord, StoreInteractionProvider};
