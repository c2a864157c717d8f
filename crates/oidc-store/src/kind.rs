//! Artifact kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Kind tag of a persisted protocol artifact.
///
/// The string form matches the model names the provider uses when it
/// talks to the adapter (`"AuthorizationCode"`, `"RefreshToken"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArtifactKind {
    Session,
    Interaction,
    Grant,
    AuthorizationCode,
    AccessToken,
    RefreshToken,
    DeviceCode,
    ClientCredentials,
    BackchannelAuthenticationRequest,
    PushedAuthorizationRequest,
}

impl ArtifactKind {
    /// Every kind, in declaration order.
    pub const ALL: [ArtifactKind; 10] = [
        Self::Session,
        Self::Interaction,
        Self::Grant,
        Self::AuthorizationCode,
        Self::AccessToken,
        Self::RefreshToken,
        Self::DeviceCode,
        Self::ClientCredentials,
        Self::BackchannelAuthenticationRequest,
        Self::PushedAuthorizationRequest,
    ];

    /// Kinds whose artifacts are issued under a grant and cascade on revocation.
    pub const GRANT_BOUND: [ArtifactKind; 5] = [
        Self::AccessToken,
        Self::AuthorizationCode,
        Self::RefreshToken,
        Self::DeviceCode,
        Self::BackchannelAuthenticationRequest,
    ];

    /// Returns the adapter model name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "Session",
            Self::Interaction => "Interaction",
            Self::Grant => "Grant",
            Self::AuthorizationCode => "AuthorizationCode",
            Self::AccessToken => "AccessToken",
            Self::RefreshToken => "RefreshToken",
            Self::DeviceCode => "DeviceCode",
            Self::ClientCredentials => "ClientCredentials",
            Self::BackchannelAuthenticationRequest => "BackchannelAuthenticationRequest",
            Self::PushedAuthorizationRequest => "PushedAuthorizationRequest",
        }
    }

    /// Only device codes carry a `userCode`.
    #[must_use]
    pub fn supports_user_code(&self) -> bool {
        matches!(self, Self::DeviceCode)
    }

    /// Sessions and interactions carry a `uid`.
    #[must_use]
    pub fn supports_uid(&self) -> bool {
        matches!(self, Self::Session | Self::Interaction)
    }

    /// Returns `true` if artifacts of this kind may reference a grant.
    #[must_use]
    pub fn is_grant_bound(&self) -> bool {
        Self::GRANT_BOUND.contains(self)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| StoreError::invalid_input(format!("Unknown artifact kind: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_kind() {
        for kind in ArtifactKind::ALL {
            assert_eq!(kind.as_str().parse::<ArtifactKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_parse_unknown_kind() {
        let err = "IdToken".parse::<ArtifactKind>().unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_secondary_key_support() {
        assert!(ArtifactKind::DeviceCode.supports_user_code());
        assert!(!ArtifactKind::AccessToken.supports_user_code());
        assert!(ArtifactKind::Session.supports_uid());
        assert!(ArtifactKind::Interaction.supports_uid());
        assert!(!ArtifactKind::Grant.supports_uid());
    }

    #[test]
    fn test_grant_bound() {
        assert!(ArtifactKind::RefreshToken.is_grant_bound());
        assert!(!ArtifactKind::Grant.is_grant_bound());
        assert!(!ArtifactKind::Session.is_grant_bound());
    }
}
