// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session-token lifecycle for calls to the Relational backend.
//!
//! ## Token Flow
//!
//! 1. An identity credential ("offline token") is read from the repository,
//!    or provisioned from the wallet JWT when none exists
//! 2. The identity is exchanged, with device id, email and wallet GUID, for a
//!    short-lived session credential
//! 3. The session token is held in [`AuthenticationTokenStore`] and handed to
//!    each authenticated operation
//!
//! ## Recovery
//!
//! - An expired token is dropped, re-acquired and the call retried once
//! - An identity conflict is recovered on the backend, re-exchanged and the
//!   call retried once
//! - Logout clears the held token

pub mod clients;
pub mod credentials;
pub mod executor;
pub mod retry;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use clients::{
    IdentityCredentialRepository, IdentityRecoveryObserver, JwtSource, SessionExchangeClient,
    SessionProfile, UserProvisioningClient,
};
pub use credentials::{DeviceId, IdentityCredential, SessionCredential};
pub use executor::{AuthenticationExecutor, Collaborators};
pub use retry::{RecoveryAction, RetryBudget, RetryPolicy};
pub use store::AuthenticationTokenStore;
