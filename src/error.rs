// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy shared by the cache and the authentication executor.
//!
//! Every error here is `Clone`: a single fetch or token acquisition fans its
//! outcome out to all callers that joined it.

use serde::{Deserialize, Serialize};

/// Failure surfaced by the session-token lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No identity credential is available and provisioning a new one failed.
    #[error("No identity credential available")]
    MissingIdentity,

    /// Local-only access found no session credential.
    #[error("No session token held")]
    MissingSessionToken,

    /// The wallet GUID needed for the session exchange is not set.
    #[error("Wallet GUID is not available")]
    MissingGuid,

    /// Backend rejected the session token.
    #[error("Session token has expired")]
    TokenExpired,

    /// Backend reports the identity is already bound to another registration.
    #[error("Identity is already registered")]
    IdentityConflict { wallet_id_hint: Option<String> },

    /// Transport or backend failure unrelated to authentication.
    #[error("Network failure: {0}")]
    Network(String),

    /// Token acquisition did not obtain the serialization permit in time.
    #[error("Timed out waiting for session token acquisition")]
    TimedOut,

    /// Creating a new identity on the backend failed.
    #[error("Failed to provision identity: {0}")]
    Provisioning(String),

    /// Persisting a newly provisioned identity failed.
    #[error("Failed to persist identity credential: {0}")]
    CredentialWrite(String),

    /// The JWT source could not produce a token.
    #[error("Failed to retrieve JWT: {0}")]
    Jwt(String),

    /// The user profile (email) could not be read.
    #[error("Failed to read session profile: {0}")]
    Profile(String),

    /// Acquisition ended without a usable session token: the shared task
    /// aborted, or a logout arrived while the exchange was running.
    #[error("Session token acquisition was aborted")]
    AcquisitionAborted,
}

impl SessionError {
    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::MissingIdentity => "missing_identity",
            SessionError::MissingSessionToken => "missing_session_token",
            SessionError::MissingGuid => "missing_guid",
            SessionError::TokenExpired => "token_expired",
            SessionError::IdentityConflict { .. } => "identity_conflict",
            SessionError::Network(_) => "network_failure",
            SessionError::TimedOut => "timed_out",
            SessionError::Provisioning(_) => "provisioning_failed",
            SessionError::CredentialWrite(_) => "credential_write_failed",
            SessionError::Jwt(_) => "jwt_unavailable",
            SessionError::Profile(_) => "profile_unavailable",
            SessionError::AcquisitionAborted => "acquisition_aborted",
        }
    }

    /// Whether the executor may resolve this error locally.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SessionError::TokenExpired | SessionError::IdentityConflict { .. }
        )
    }

    /// Whether the UI should ask the user to sign in again rather than retry.
    pub fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            SessionError::MissingIdentity
                | SessionError::MissingSessionToken
                | SessionError::MissingGuid
                | SessionError::TokenExpired
                | SessionError::IdentityConflict { .. }
        )
    }

    /// Classify a backend error response.
    ///
    /// The code in the body wins over the status; a bare 401 is treated as an
    /// expired token and a bare 409 as an identity conflict.
    pub fn from_backend(status: u16, body: Option<&BackendErrorBody>) -> Self {
        if let Some(body) = body {
            match body.kind.as_deref().map(str::to_ascii_uppercase).as_deref() {
                Some("TOKEN_EXPIRED") => return SessionError::TokenExpired,
                Some("ALREADY_REGISTERED") | Some("USER_ALREADY_REGISTERED") => {
                    return SessionError::IdentityConflict {
                        wallet_id_hint: body.wallet_id_hint.clone(),
                    }
                }
                _ => {}
            }
        }

        match status {
            401 => SessionError::TokenExpired,
            409 => SessionError::IdentityConflict {
                wallet_id_hint: body.and_then(|b| b.wallet_id_hint.clone()),
            },
            _ => SessionError::Network(match body.and_then(|b| b.description.as_deref()) {
                Some(description) => format!("HTTP {status}: {description}"),
                None => format!("HTTP {status}"),
            }),
        }
    }
}

/// Error body returned by the backend on authenticated endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendErrorBody {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "walletIdHint", default)]
    pub wallet_id_hint: Option<String>,
}

/// Failure surfaced by [`KeyedCache`](crate::cache::KeyedCache).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError<E> {
    /// The fetch function failed; the error is stored verbatim.
    #[error("Fetch failed: {0}")]
    FetchFailed(E),

    /// The spawned fetch task panicked or was cancelled by the runtime.
    #[error("Fetch task aborted before completing")]
    FetchAborted,
}

impl<E> CacheError<E> {
    /// The fetch function's own error, if that is what failed.
    pub fn into_fetch_error(self) -> Option<E> {
        match self {
            CacheError::FetchFailed(error) => Some(error),
            CacheError::FetchAborted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(SessionError::TokenExpired.error_code(), "token_expired");
        assert_eq!(SessionError::TimedOut.error_code(), "timed_out");
        assert_eq!(
            SessionError::IdentityConflict { wallet_id_hint: None }.error_code(),
            "identity_conflict"
        );
    }

    #[test]
    fn only_expiry_and_conflict_are_recoverable() {
        assert!(SessionError::TokenExpired.is_recoverable());
        assert!(SessionError::IdentityConflict { wallet_id_hint: None }.is_recoverable());
        assert!(!SessionError::Network("boom".into()).is_recoverable());
        assert!(!SessionError::TimedOut.is_recoverable());
    }

    #[test]
    fn backend_code_takes_precedence_over_status() {
        let body: BackendErrorBody = serde_json::from_str(
            r#"{"type":"ALREADY_REGISTERED","description":"User already exists","walletIdHint":"wallet-1"}"#,
        )
        .unwrap();

        assert_eq!(
            SessionError::from_backend(400, Some(&body)),
            SessionError::IdentityConflict {
                wallet_id_hint: Some("wallet-1".to_string())
            }
        );
    }

    #[test]
    fn backend_status_fallbacks() {
        assert_eq!(SessionError::from_backend(401, None), SessionError::TokenExpired);
        assert!(matches!(
            SessionError::from_backend(409, None),
            SessionError::IdentityConflict { wallet_id_hint: None }
        ));

        let body = BackendErrorBody {
            description: Some("maintenance".into()),
            ..Default::default()
        };
        assert_eq!(
            SessionError::from_backend(503, Some(&body)),
            SessionError::Network("HTTP 503: maintenance".into())
        );
    }

    #[test]
    fn lowercase_token_expired_code_is_recognised() {
        let body: BackendErrorBody =
            serde_json::from_str(r#"{"type":"token_expired"}"#).unwrap();
        assert_eq!(SessionError::from_backend(400, Some(&body)), SessionError::TokenExpired);
    }

    #[test]
    fn cache_error_exposes_fetch_error() {
        let err: CacheError<&str> = CacheError::FetchFailed("nope");
        assert_eq!(err.into_fetch_error(), Some("nope"));
        assert_eq!(CacheError::<&str>::FetchAborted.into_fetch_error(), None);
    }
}
