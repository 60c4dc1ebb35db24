// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single-flight keyed cache engine.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::entry::{CachedValue, EntryState, InFlight, Slot};
use super::policy::RefreshControl;
use super::CacheConfiguration;
use crate::error::CacheError;
use crate::lifecycle::{LifecycleEvent, LifecycleEvents};

type FetchFn<K, V, E> = dyn Fn(K) -> BoxFuture<'static, Result<V, E>> + Send + Sync;

/// Maps keys to calculation states and fetches missing or stale values
/// through a caller-supplied function.
///
/// Cloning is cheap; clones share the same entries.
pub struct KeyedCache<K, V, E> {
    inner: Arc<Inner<K, V, E>>,
}

impl<K, V, E> Clone for KeyedCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<K, V, E> {
    entries: Mutex<HashMap<K, Slot<V, E>>>,
    policy: Box<dyn RefreshControl>,
    config: CacheConfiguration,
    fetch: Box<FetchFn<K, V, E>>,
    next_flight: AtomicU64,
}

impl<K, V, E> KeyedCache<K, V, E>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a cache with the default configuration (flush on logout).
    pub fn new<P, F, Fut>(policy: P, fetch: F) -> Self
    where
        P: RefreshControl + 'static,
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        Self::with_configuration(CacheConfiguration::default(), policy, fetch)
    }

    pub fn with_configuration<P, F, Fut>(config: CacheConfiguration, policy: P, fetch: F) -> Self
    where
        P: RefreshControl + 'static,
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                policy: Box::new(policy),
                config,
                fetch: Box::new(move |key| fetch(key).boxed()),
                next_flight: AtomicU64::new(0),
            }),
        }
    }

    /// Get the value for `key`, fetching it if it is missing, stale or failed.
    pub async fn get(&self, key: K) -> Result<V, CacheError<E>> {
        self.get_with(key, false).await
    }

    /// Like [`get`](Self::get), but `force_fetch` ignores a fresh value.
    ///
    /// A fetch already in flight is joined rather than duplicated.
    pub async fn get_with(&self, key: K, force_fetch: bool) -> Result<V, CacheError<E>> {
        let flight = {
            let mut entries = self.inner.lock();
            let now = Instant::now();

            let joined = match entries.get(&key) {
                Some(Slot::Fresh { value, fetched_at })
                    if !force_fetch && !self.inner.policy.is_stale(*fetched_at, now) =>
                {
                    trace!(cache = self.inner.config.name, ?key, "Cache hit");
                    return Ok(value.clone());
                }
                Some(Slot::Fetching { flight, .. }) => {
                    debug!(cache = self.inner.config.name, ?key, "Joining in-flight fetch");
                    Some(flight.clone())
                }
                _ => None,
            };

            match joined {
                Some(flight) => flight,
                None => self.inner.start_fetch(&mut entries, key),
            }
        };

        flight.await
    }

    /// Store `value` for `key` as freshly fetched.
    ///
    /// A fetch in flight for the key still resolves for its waiters, but
    /// its result no longer replaces this value.
    pub fn set(&self, key: K, value: V) {
        self.inner.lock().insert(
            key,
            Slot::Fresh {
                value,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Look at the held value without fetching.
    pub fn peek(&self, key: &K) -> CachedValue<V> {
        let entries = self.inner.lock();
        match entries.get(key) {
            None => CachedValue::Absent,
            Some(Slot::Fresh { value, fetched_at }) => {
                if self.inner.policy.is_stale(*fetched_at, Instant::now()) {
                    CachedValue::Stale(value.clone())
                } else {
                    CachedValue::Present(value.clone())
                }
            }
            Some(Slot::Stale { value, .. }) => CachedValue::Stale(value.clone()),
            Some(Slot::Fetching { previous, .. }) | Some(Slot::Failed { previous, .. }) => {
                match previous {
                    Some(value) => CachedValue::Stale(value.clone()),
                    None => CachedValue::Absent,
                }
            }
        }
    }

    /// Current state of `key`.
    pub fn state(&self, key: &K) -> EntryState<E> {
        let entries = self.inner.lock();
        match entries.get(key) {
            None => EntryState::Empty,
            Some(Slot::Fetching { .. }) => EntryState::Fetching,
            Some(Slot::Fresh { fetched_at, .. }) => {
                if self.inner.policy.is_stale(*fetched_at, Instant::now()) {
                    EntryState::Stale
                } else {
                    EntryState::Fresh
                }
            }
            Some(Slot::Stale { .. }) => EntryState::Stale,
            Some(Slot::Failed { error, .. }) => EntryState::Failed(error.clone()),
        }
    }

    /// Reset `key` to empty. The next `get` starts a new fetch.
    pub fn invalidate(&self, key: &K) {
        if self.inner.lock().remove(key).is_some() {
            debug!(cache = self.inner.config.name, ?key, "Invalidated entry");
        }
    }

    /// Reset every key to empty.
    pub fn invalidate_all(&self) {
        self.inner.flush();
    }

    /// Apply a lifecycle event: flush if configured, else mark fresh values
    /// stale if the refresh policy reacts to it.
    pub fn handle_event(&self, event: LifecycleEvent) {
        self.inner.handle_event(event);
    }

    /// Number of keys with any state other than empty.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply lifecycle events from `events` until `shutdown` is cancelled or
    /// every handle to this cache is dropped.
    pub fn spawn_lifecycle_listener(
        &self,
        events: &LifecycleEvents,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let mut receiver = events.subscribe();
        let inner = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = shutdown.cancelled() => return,
                    received = receiver.recv() => received,
                };

                let Some(cache) = inner.upgrade() else {
                    return;
                };

                match received {
                    Ok(event) => cache.handle_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            cache = cache.config.name,
                            skipped, "Lifecycle listener lagged; flushing cache"
                        );
                        cache.flush();
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        })
    }
}

impl<K, V, E> Inner<K, V, E>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, HashMap<K, Slot<V, E>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the fetch for `key` and record it as in flight.
    ///
    /// Must be called with the entries lock held so no second fetch can start.
    fn start_fetch(
        self: &Arc<Self>,
        entries: &mut HashMap<K, Slot<V, E>>,
        key: K,
    ) -> InFlight<V, E> {
        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        let previous = entries.remove(&key).and_then(Slot::into_previous);
        debug!(cache = self.config.name, ?key, flight = id, "Starting fetch");

        let fetch = (self.fetch)(key.clone());
        let task_inner = Arc::downgrade(self);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = fetch.await;
            if let Some(inner) = task_inner.upgrade() {
                inner.complete(task_key, id, result.clone().map_err(CacheError::FetchFailed));
            }
            result
        });

        let watcher: Weak<Self> = Arc::downgrade(self);
        let watched_key = key.clone();
        let flight = async move {
            match handle.await {
                Ok(result) => result.map_err(CacheError::FetchFailed),
                Err(join_error) => {
                    warn!(?watched_key, error = %join_error, "Fetch task aborted");
                    if let Some(inner) = watcher.upgrade() {
                        inner.complete(watched_key, id, Err(CacheError::FetchAborted));
                    }
                    Err(CacheError::FetchAborted)
                }
            }
        }
        .boxed()
        .shared();

        entries.insert(
            key,
            Slot::Fetching {
                id,
                flight: flight.clone(),
                previous,
                stale_on_arrival: false,
            },
        );
        flight
    }

    /// Record the outcome of flight `id`, unless the key was invalidated,
    /// overwritten, or refetched in the meantime.
    fn complete(&self, key: K, id: u64, result: Result<V, CacheError<E>>) {
        let mut entries = self.lock();

        let (previous, stale_on_arrival) = match entries.get_mut(&key) {
            Some(Slot::Fetching {
                id: current,
                previous,
                stale_on_arrival,
                ..
            }) if *current == id => (previous.take(), *stale_on_arrival),
            _ => {
                debug!(
                    cache = self.config.name,
                    ?key,
                    flight = id,
                    "Discarding superseded fetch result"
                );
                return;
            }
        };

        if !self.config.retain_results {
            entries.remove(&key);
            return;
        }

        let fetched_at = Instant::now();
        let slot = match result {
            Ok(value) if stale_on_arrival => {
                debug!(
                    cache = self.config.name,
                    ?key,
                    flight = id,
                    "Fetch succeeded after a staleness event"
                );
                Slot::Stale { value, fetched_at }
            }
            Ok(value) => {
                debug!(cache = self.config.name, ?key, flight = id, "Fetch succeeded");
                Slot::Fresh { value, fetched_at }
            }
            Err(error) => {
                debug!(cache = self.config.name, ?key, flight = id, "Fetch failed");
                Slot::Failed { error, previous }
            }
        };
        entries.insert(key, slot);
    }

    fn flush(&self) {
        let mut entries = self.lock();
        let flushed = entries.len();
        entries.clear();
        debug!(cache = self.config.name, flushed, "Flushed cache");
    }

    fn mark_stale(&self) {
        let mut entries = self.lock();
        for slot in entries.values_mut() {
            match slot {
                Slot::Fresh { value, fetched_at } => {
                    let (value, fetched_at) = (value.clone(), *fetched_at);
                    *slot = Slot::Stale { value, fetched_at };
                }
                // The in-flight result may predate the event.
                Slot::Fetching { stale_on_arrival, .. } => *stale_on_arrival = true,
                Slot::Stale { .. } | Slot::Failed { .. } => {}
            }
        }
    }

    fn handle_event(&self, event: LifecycleEvent) {
        if self.config.flush_on.contains(&event) {
            debug!(cache = self.config.name, ?event, "Lifecycle event flushes cache");
            self.flush();
        } else if self.policy.stale_on(event) {
            debug!(cache = self.config.name, ?event, "Lifecycle event marks cache stale");
            self.mark_stale();
        }
    }
}
