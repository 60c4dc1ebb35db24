// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated-call executor.
//!
//! [`AuthenticationExecutor::authenticate`] runs an operation with a valid
//! session token, acquiring one on demand, and recovers from the two
//! authentication failures the backend reports:
//!
//! - `TokenExpired`: drop the rejected token, exchange the already resolved
//!   identity for a new one, retry once.
//! - `IdentityConflict`: recover the identity, re-exchange, retry once.
//!
//! Token acquisition (identity resolution, then reuse or exchange of the
//! session token) is single-flight: concurrent callers share one acquisition,
//! and a permit with a deadline keeps recovery, refresh and acquisition from
//! overlapping.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::clients::{
    IdentityCredentialRepository, IdentityRecoveryObserver, JwtSource, SessionExchangeClient,
    SessionProfile, UserProvisioningClient,
};
use super::credentials::{DeviceId, IdentityCredential, SessionCredential};
use super::retry::{RecoveryAction, RetryPolicy};
use super::store::AuthenticationTokenStore;
use crate::cache::{CacheConfiguration, KeyedCache, PerpetualRefresh};
use crate::config::SessionConfig;
use crate::error::{CacheError, SessionError};

/// External services the executor drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Persisted identity credential ("offline token").
    pub identities: Arc<dyn IdentityCredentialRepository>,
    /// Creates an identity when the repository holds none.
    pub provisioning: Arc<dyn UserProvisioningClient>,
    /// Session exchange and identity recovery endpoints.
    pub exchange: Arc<dyn SessionExchangeClient>,
    /// Wallet JWT used for provisioning and recovery.
    pub jwt: Arc<dyn JwtSource>,
    /// Email and wallet GUID sent with each exchange.
    pub profile: Arc<dyn SessionProfile>,
    /// Told about every recovered identity conflict, if set.
    pub recovery_observer: Option<Arc<dyn IdentityRecoveryObserver>>,
}

/// Outcome of one acquisition: the identity it resolved and the session
/// credential it reused or exchanged for.
#[derive(Clone)]
struct SessionGrant {
    identity: IdentityCredential,
    session: SessionCredential,
}

/// Runs operations that need a session token.
pub struct AuthenticationExecutor {
    acquirer: Arc<Acquirer>,
    // Deduplicates concurrent acquisitions; entries are dropped as soon as
    // an acquisition completes, so no credential outlives it here.
    acquisitions: KeyedCache<(), SessionGrant, SessionError>,
    retry_policy: RetryPolicy,
}

impl AuthenticationExecutor {
    pub fn new(
        store: Arc<AuthenticationTokenStore>,
        collaborators: Collaborators,
        device_id: DeviceId,
        config: &SessionConfig,
    ) -> Self {
        let acquirer = Arc::new(Acquirer {
            store,
            collaborators,
            device_id,
            permit: Semaphore::new(1),
            acquisition_timeout: config.acquisition_timeout,
        });

        let fetcher = Arc::clone(&acquirer);
        let acquisitions = KeyedCache::with_configuration(
            CacheConfiguration::named("session-acquisition")
                .without_flush()
                .in_flight_only(),
            PerpetualRefresh,
            move |()| {
                let acquirer = Arc::clone(&fetcher);
                async move { acquirer.acquire().await }
            },
        );

        Self {
            acquirer,
            acquisitions,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn store(&self) -> &Arc<AuthenticationTokenStore> {
        &self.acquirer.store
    }

    /// The held session token, without any network activity.
    pub async fn current_token(&self) -> Result<String, SessionError> {
        self.acquirer
            .store
            .current()
            .await
            .map(|session| session.token)
            .ok_or(SessionError::MissingSessionToken)
    }

    /// Run `operation` with a session token, recovering from expiry and
    /// identity conflicts within the retry policy.
    ///
    /// Failures other than those two propagate unchanged, as does the last
    /// failure once the retry budget is spent.
    pub async fn authenticate<T, F, Fut>(&self, operation: F) -> Result<T, SessionError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, SessionError>>,
    {
        let mut budget = self.retry_policy.budget();
        let SessionGrant {
            mut identity,
            mut session,
        } = self.acquire().await?;

        loop {
            let token = session.token.clone();
            let error = match operation(token.clone()).await {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };

            let action = self.retry_policy.action_for(&error);
            session = match action {
                RecoveryAction::Propagate => return Err(error),
                _ if !budget.try_spend(action) => {
                    warn!(
                        error_code = error.error_code(),
                        retries = budget.retries(),
                        "Retry budget exhausted for authenticated call"
                    );
                    return Err(error);
                }
                RecoveryAction::RefreshAndRetry => {
                    info!("Session token rejected as expired; refreshing");
                    self.acquirer.store.invalidate_if_matches(&token).await;
                    self.refresh(&identity).await?
                }
                RecoveryAction::RecoverAndRetry => {
                    let wallet_id_hint = match error {
                        SessionError::IdentityConflict { wallet_id_hint } => wallet_id_hint,
                        _ => None,
                    };
                    info!("Identity conflict on authenticated call; recovering");
                    let grant = self.recover_after_conflict(wallet_id_hint.as_deref()).await?;
                    identity = grant.identity;
                    grant.session
                }
            };
        }
    }

    async fn acquire(&self) -> Result<SessionGrant, SessionError> {
        self.within_deadline(async {
            self.acquisitions.get(()).await.map_err(|error| match error {
                CacheError::FetchFailed(error) => error,
                CacheError::FetchAborted => SessionError::AcquisitionAborted,
            })
        })
        .await
    }

    /// Exchange `identity` again after an expiry, without re-resolving it.
    async fn refresh(
        &self,
        identity: &IdentityCredential,
    ) -> Result<SessionCredential, SessionError> {
        self.within_deadline(self.acquirer.refresh(identity)).await
    }

    async fn recover_after_conflict(
        &self,
        wallet_id_hint: Option<&str>,
    ) -> Result<SessionGrant, SessionError> {
        {
            let _permit = self.acquirer.permit().await?;
            let identity = self.acquirer.resolve_identity().await?;
            self.acquirer.recover_identity(&identity, wallet_id_hint).await?;
            self.acquirer.store.invalidate().await;
        }
        self.acquire().await
    }

    async fn within_deadline<T>(
        &self,
        work: impl Future<Output = Result<T, SessionError>>,
    ) -> Result<T, SessionError> {
        let deadline = self.acquirer.acquisition_timeout;
        match timeout(deadline, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout_secs = deadline.as_secs(),
                    "Timed out waiting for session token acquisition"
                );
                Err(SessionError::TimedOut)
            }
        }
    }
}

/// State shared by the executor and its in-flight acquisitions.
struct Acquirer {
    store: Arc<AuthenticationTokenStore>,
    collaborators: Collaborators,
    device_id: DeviceId,
    permit: Semaphore,
    acquisition_timeout: Duration,
}

impl Acquirer {
    async fn permit(&self) -> Result<SemaphorePermit<'_>, SessionError> {
        match timeout(self.acquisition_timeout, self.permit.acquire()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(SessionError::AcquisitionAborted),
            Err(_) => {
                warn!(
                    timeout_secs = self.acquisition_timeout.as_secs(),
                    "Timed out waiting for token acquisition permit"
                );
                Err(SessionError::TimedOut)
            }
        }
    }

    /// Resolve the identity, then reuse the held session credential or
    /// exchange the identity for a new one.
    async fn acquire(&self) -> Result<SessionGrant, SessionError> {
        let _permit = self.permit().await?;
        let logouts = self.store.logout_count();
        let identity = self.resolve_identity().await?;

        let session = match self.store.current().await {
            Some(session) => {
                debug!(session_id = %session.id, "Reusing held session token");
                session
            }
            None => self.exchange(&identity, logouts).await?,
        };
        Ok(SessionGrant { identity, session })
    }

    /// Exchange `identity` for a new session credential unless a concurrent
    /// refresh already stored one.
    async fn refresh(
        &self,
        identity: &IdentityCredential,
    ) -> Result<SessionCredential, SessionError> {
        let _permit = self.permit().await?;
        let logouts = self.store.logout_count();

        if let Some(session) = self.store.current().await {
            debug!(session_id = %session.id, "Session token already refreshed");
            return Ok(session);
        }
        self.exchange(identity, logouts).await
    }

    async fn resolve_identity(&self) -> Result<IdentityCredential, SessionError> {
        match self.collaborators.identities.read().await? {
            Some(identity) => Ok(identity),
            None => self.provision_identity().await,
        }
    }

    async fn provision_identity(&self) -> Result<IdentityCredential, SessionError> {
        info!("No identity credential stored; provisioning one");

        let created = match self.collaborators.jwt.current_token().await {
            Ok(jwt) => self.collaborators.provisioning.create_identity(&jwt).await,
            Err(error) => Err(error),
        };
        let identity = created.map_err(|error| {
            warn!(error = %error, "Identity provisioning failed");
            SessionError::MissingIdentity
        })?;

        self.collaborators.identities.write(identity.clone()).await?;
        info!(user_id = %identity.user_id, "Identity credential provisioned");
        Ok(identity)
    }

    /// Exchange `identity` for a session credential and store it, unless a
    /// logout arrived after `logouts` was read.
    ///
    /// An identity conflict from the exchange is recovered once and the
    /// exchange repeated; a second conflict propagates.
    async fn exchange(
        &self,
        identity: &IdentityCredential,
        logouts: u64,
    ) -> Result<SessionCredential, SessionError> {
        let email = self.collaborators.profile.email().await?;
        let guid = self
            .collaborators
            .profile
            .guid()
            .await?
            .ok_or(SessionError::MissingGuid)?;

        let mut recovered = false;
        loop {
            let exchanged = self
                .collaborators
                .exchange
                .exchange(identity, &self.device_id, &email, &guid)
                .await;

            match exchanged {
                Ok(session) => {
                    info!(session_id = %session.id, "Session token acquired");
                    return match self.store.store_unless_logged_out(session, logouts).await {
                        Some(session) => Ok(session),
                        None => {
                            info!("Logout during session exchange; token discarded");
                            Err(SessionError::AcquisitionAborted)
                        }
                    };
                }
                Err(SessionError::IdentityConflict { wallet_id_hint }) if !recovered => {
                    recovered = true;
                    info!("Identity conflict during session exchange; recovering");
                    self.recover_identity(identity, wallet_id_hint.as_deref()).await?;
                }
                Err(error) => {
                    warn!(error_code = error.error_code(), "Session exchange failed");
                    return Err(error);
                }
            }
        }
    }

    async fn recover_identity(
        &self,
        identity: &IdentityCredential,
        wallet_id_hint: Option<&str>,
    ) -> Result<(), SessionError> {
        let jwt = self.collaborators.jwt.current_token().await?;
        self.collaborators
            .exchange
            .recover_identity(identity, &jwt)
            .await?;

        info!(wallet_id_hint, "Identity recovered");
        if let Some(observer) = &self.collaborators.recovery_observer {
            observer.identity_recovered(wallet_id_hint);
        }
        Ok(())
    }
}
