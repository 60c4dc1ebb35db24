// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity and session credentials.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Short-lived bearer credential authorizing individual API calls.
///
/// Held by exactly one [`AuthenticationTokenStore`](super::AuthenticationTokenStore)
/// and replaced wholesale, never edited in place.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredential {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
}

impl SessionCredential {
    /// Whether the backend-declared expiry has passed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// Tokens never reach log output.
impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .field("is_active", &self.is_active)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Long-lived "offline token" exchanged for session credentials.
///
/// Persisted by an external repository; the executor only reads and writes
/// through it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityCredential {
    pub user_id: String,
    pub token: String,
}

impl fmt::Debug for IdentityCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCredential")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Stable identifier of this installation, sent with every session exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier for a new installation.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn session_credential_parses_backend_payload() {
        let json = r#"{
            "id": "sess-1",
            "userId": "user-id",
            "token": "session-token",
            "isActive": true,
            "expiresAt": "2030-01-01T00:00:00Z"
        }"#;

        let credential: SessionCredential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.user_id, "user-id");
        assert!(credential.is_active);
        assert!(!credential.is_expired_at(Utc::now()));
        assert!(credential.is_expired_at(credential.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let identity = IdentityCredential {
            user_id: "user-id".into(),
            token: "offline-secret".into(),
        };
        let rendered = format!("{identity:?}");
        assert!(rendered.contains("user-id"));
        assert!(!rendered.contains("offline-secret"));
    }

    #[test]
    fn generated_device_ids_are_unique() {
        assert_ne!(DeviceId::generate(), DeviceId::generate());
        assert_eq!(DeviceId::new("device-1").to_string(), "device-1");
    }
}
