// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single-slot holder for the current session credential.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::credentials::SessionCredential;
use crate::lifecycle::{LifecycleEvent, LifecycleEvents};

/// Holds at most one [`SessionCredential`].
///
/// Writes replace or clear the whole credential under an exclusive lock, so
/// readers never observe a partial update and never see a token after an
/// invalidation that completed before their read.
#[derive(Default)]
pub struct AuthenticationTokenStore {
    slot: RwLock<Option<SessionCredential>>,
    /// Logouts observed so far; only changed under the write lock.
    logouts: AtomicU64,
}

impl AuthenticationTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The held credential, if any.
    pub async fn current(&self) -> Option<SessionCredential> {
        self.slot.read().await.clone()
    }

    /// True iff no credential is held.
    pub async fn requires_refresh(&self) -> bool {
        self.slot.read().await.is_none()
    }

    /// Replace the held credential and return it.
    pub async fn store(&self, credential: SessionCredential) -> SessionCredential {
        let mut slot = self.slot.write().await;
        debug!(session_id = %credential.id, "Storing session credential");
        *slot = Some(credential.clone());
        credential
    }

    /// Clear the held credential.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        if slot.take().is_some() {
            debug!("Session credential invalidated");
        }
    }

    /// Number of logouts applied so far.
    ///
    /// An acquisition reads this before exchanging and hands it back to
    /// [`store_unless_logged_out`](Self::store_unless_logged_out).
    pub fn logout_count(&self) -> u64 {
        self.logouts.load(Ordering::SeqCst)
    }

    /// Clear the held credential and record a logout.
    pub async fn clear_for_logout(&self) {
        let mut slot = self.slot.write().await;
        self.logouts.fetch_add(1, Ordering::SeqCst);
        *slot = None;
    }

    /// Store `credential` unless a logout happened since `observed_logouts`
    /// was read. Returns the stored credential, or `None` if it was dropped.
    pub async fn store_unless_logged_out(
        &self,
        credential: SessionCredential,
        observed_logouts: u64,
    ) -> Option<SessionCredential> {
        let mut slot = self.slot.write().await;
        if self.logouts.load(Ordering::SeqCst) != observed_logouts {
            debug!(
                session_id = %credential.id,
                "Logout since exchange began; dropping credential"
            );
            return None;
        }
        *slot = Some(credential.clone());
        Some(credential)
    }

    /// Clear the held credential only if it still carries `token`.
    ///
    /// Returns whether the credential was cleared. A caller reporting a stale
    /// rejection does not discard a replacement stored in the meantime.
    pub async fn invalidate_if_matches(&self, token: &str) -> bool {
        let mut slot = self.slot.write().await;
        match slot.as_ref() {
            Some(held) if held.token == token => {
                *slot = None;
                debug!("Rejected session credential invalidated");
                true
            }
            _ => false,
        }
    }

    /// Clear the store whenever [`LifecycleEvent::LoggedOut`] is published,
    /// until `shutdown` is cancelled or the store is dropped.
    pub fn spawn_logout_listener(
        self: &Arc<Self>,
        events: &LifecycleEvents,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let mut receiver = events.subscribe();
        let store = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = shutdown.cancelled() => return,
                    received = receiver.recv() => received,
                };

                let Some(store) = store.upgrade() else {
                    return;
                };

                match received {
                    Ok(LifecycleEvent::LoggedOut) => {
                        info!("Logout observed; clearing session credential");
                        store.clear_for_logout().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Logout listener lagged; clearing session credential");
                        store.clear_for_logout().await;
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        })
    }
}
