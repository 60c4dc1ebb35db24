// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Collaborators consumed by the authentication executor.
//!
//! Implementations live with the embedding application (HTTP clients,
//! keychain-backed repositories); only the contracts are defined here.

use async_trait::async_trait;

use super::credentials::{DeviceId, IdentityCredential, SessionCredential};
use crate::error::SessionError;

/// Read/write-through access to the persisted identity credential.
#[async_trait]
pub trait IdentityCredentialRepository: Send + Sync {
    /// The stored credential, or `None` if none has been provisioned yet.
    async fn read(&self) -> Result<Option<IdentityCredential>, SessionError>;

    async fn write(&self, credential: IdentityCredential) -> Result<(), SessionError>;
}

/// Creates a backend identity for a wallet that has none.
#[async_trait]
pub trait UserProvisioningClient: Send + Sync {
    /// Exchange a wallet JWT for a new identity credential.
    async fn create_identity(&self, jwt: &str) -> Result<IdentityCredential, SessionError>;
}

/// Backend endpoints issuing and repairing session credentials.
#[async_trait]
pub trait SessionExchangeClient: Send + Sync {
    /// Exchange an identity credential for a session credential.
    ///
    /// Reports [`SessionError::IdentityConflict`] when the identity is bound
    /// to another registration.
    async fn exchange(
        &self,
        identity: &IdentityCredential,
        device_id: &DeviceId,
        email: &str,
        guid: &str,
    ) -> Result<SessionCredential, SessionError>;

    /// Merge/restore a conflicting identity using the current wallet JWT.
    async fn recover_identity(
        &self,
        identity: &IdentityCredential,
        jwt: &str,
    ) -> Result<(), SessionError>;
}

/// Source of the wallet JWT used only for provisioning and recovery.
#[async_trait]
pub trait JwtSource: Send + Sync {
    async fn current_token(&self) -> Result<String, SessionError>;
}

/// Wallet profile fields the session exchange needs.
#[async_trait]
pub trait SessionProfile: Send + Sync {
    async fn email(&self) -> Result<String, SessionError>;

    /// The wallet GUID, or `None` if the wallet is not loaded.
    async fn guid(&self) -> Result<Option<String>, SessionError>;
}

/// Notified after an identity conflict has been recovered, e.g. to tell the
/// user their account was restored on another wallet.
pub trait IdentityRecoveryObserver: Send + Sync {
    fn identity_recovered(&self, wallet_id_hint: Option<&str>);
}
