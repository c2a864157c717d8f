//! Refresh token issuance policy.

use crate::client::{ApplicationType, ClientMetadata, GrantType};

/// Decides whether a refresh token is issued alongside the access token
/// when `code_scope` (the space-delimited scope of the consumed code) is
/// exchanged.
///
/// The client must be registered for the `refresh_token` grant. Beyond
/// that, web clients always get one and other clients only when
/// `offline_access` was granted.
#[must_use]
pub fn issue_refresh_token(client: &ClientMetadata, code_scope: &str) -> bool {
    if !client.grant_type_allowed(GrantType::RefreshToken) {
        return false;
    }
    code_scope.split_whitespace().any(|scope| scope == "offline_access")
        || client.application_type == ApplicationType::Web
}
