// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory collaborators counting their calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use super::clients::{
    IdentityCredentialRepository, IdentityRecoveryObserver, JwtSource, SessionExchangeClient,
    SessionProfile, UserProvisioningClient,
};
use super::credentials::{DeviceId, IdentityCredential, SessionCredential};
use super::executor::{AuthenticationExecutor, Collaborators};
use super::store::AuthenticationTokenStore;
use crate::config::SessionConfig;
use crate::error::SessionError;

pub fn session(token: &str) -> SessionCredential {
    SessionCredential {
        id: format!("id-{token}"),
        user_id: "user-id".into(),
        token: token.into(),
        is_active: true,
        expires_at: Utc::now() + chrono::Duration::hours(1),
    }
}

pub fn identity(token: &str) -> IdentityCredential {
    IdentityCredential {
        user_id: "user-id".into(),
        token: token.into(),
    }
}

#[derive(Default)]
pub struct MemoryIdentities {
    held: Mutex<Option<IdentityCredential>>,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
}

impl MemoryIdentities {
    pub fn holding(credential: IdentityCredential) -> Self {
        Self {
            held: Mutex::new(Some(credential)),
            ..Default::default()
        }
    }

    pub fn held(&self) -> Option<IdentityCredential> {
        self.held.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityCredentialRepository for MemoryIdentities {
    async fn read(&self) -> Result<Option<IdentityCredential>, SessionError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.held())
    }

    async fn write(&self, credential: IdentityCredential) -> Result<(), SessionError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.held.lock().unwrap() = Some(credential);
        Ok(())
    }
}

pub struct MockProvisioning {
    result: Result<IdentityCredential, SessionError>,
    pub calls: AtomicUsize,
}

impl MockProvisioning {
    pub fn returning(result: Result<IdentityCredential, SessionError>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl UserProvisioningClient for MockProvisioning {
    async fn create_identity(&self, _jwt: &str) -> Result<IdentityCredential, SessionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Replays scripted exchange outcomes, then issues `session-N` tokens.
#[derive(Default)]
pub struct MockExchange {
    scripted: Mutex<VecDeque<Result<SessionCredential, SessionError>>>,
    gate: Option<Arc<Notify>>,
    recovery_gate: Option<Arc<Notify>>,
    delay: Option<Duration>,
    pub exchanges: AtomicUsize,
    pub recoveries: AtomicUsize,
}

impl MockExchange {
    pub fn scripted(outcomes: Vec<Result<SessionCredential, SessionError>>) -> Self {
        Self {
            scripted: Mutex::new(outcomes.into()),
            ..Default::default()
        }
    }

    /// Every exchange waits for `gate` before answering.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    /// Every identity recovery waits for `gate` before answering.
    pub fn gated_recovery(gate: Arc<Notify>) -> Self {
        Self {
            recovery_gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub fn recovery_count(&self) -> usize {
        self.recoveries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionExchangeClient for MockExchange {
    async fn exchange(
        &self,
        _identity: &IdentityCredential,
        _device_id: &DeviceId,
        _email: &str,
        _guid: &str,
    ) -> Result<SessionCredential, SessionError> {
        let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.scripted.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(session(&format!("session-{n}"))))
    }

    async fn recover_identity(
        &self,
        _identity: &IdentityCredential,
        _jwt: &str,
    ) -> Result<(), SessionError> {
        self.recoveries.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.recovery_gate {
            gate.notified().await;
        }
        Ok(())
    }
}

pub struct StaticJwt;

#[async_trait]
impl JwtSource for StaticJwt {
    async fn current_token(&self) -> Result<String, SessionError> {
        Ok("wallet-jwt".into())
    }
}

pub struct StaticProfile {
    pub guid: Option<String>,
}

impl Default for StaticProfile {
    fn default() -> Self {
        Self {
            guid: Some("wallet-guid".into()),
        }
    }
}

#[async_trait]
impl SessionProfile for StaticProfile {
    async fn email(&self) -> Result<String, SessionError> {
        Ok("user@example.com".into())
    }

    async fn guid(&self) -> Result<Option<String>, SessionError> {
        Ok(self.guid.clone())
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub hints: Mutex<Vec<Option<String>>>,
}

impl IdentityRecoveryObserver for RecordingObserver {
    fn identity_recovered(&self, wallet_id_hint: Option<&str>) {
        self.hints
            .lock()
            .unwrap()
            .push(wallet_id_hint.map(str::to_string));
    }
}

/// An executor wired to in-memory collaborators.
pub struct Harness {
    pub store: Arc<AuthenticationTokenStore>,
    pub identities: Arc<MemoryIdentities>,
    pub provisioning: Arc<MockProvisioning>,
    pub exchange: Arc<MockExchange>,
    pub profile: Arc<StaticProfile>,
    pub observer: Arc<RecordingObserver>,
    pub config: SessionConfig,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            store: Arc::new(AuthenticationTokenStore::new()),
            identities: Arc::new(MemoryIdentities::holding(identity("offline-token"))),
            provisioning: Arc::new(MockProvisioning::returning(Ok(identity("provisioned")))),
            exchange: Arc::new(MockExchange::default()),
            profile: Arc::new(StaticProfile::default()),
            observer: Arc::new(RecordingObserver::default()),
            config: SessionConfig::default(),
        }
    }
}

impl Harness {
    pub fn executor(&self) -> AuthenticationExecutor {
        AuthenticationExecutor::new(
            Arc::clone(&self.store),
            Collaborators {
                identities: self.identities.clone(),
                provisioning: self.provisioning.clone(),
                exchange: self.exchange.clone(),
                jwt: Arc::new(StaticJwt),
                profile: self.profile.clone(),
                recovery_observer: Some(self.observer.clone()),
            },
            DeviceId::new("device-1"),
            &self.config,
        )
    }
}
