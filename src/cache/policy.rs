// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Refresh policies deciding when a cached value must be fetched again.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::SessionConfig;
use crate::lifecycle::LifecycleEvent;

/// Staleness rule for cache entries.
///
/// Implementations must be pure: no side effects and no failure modes.
pub trait RefreshControl: Send + Sync {
    /// Whether a value fetched at `last_fetch` is stale at `now`.
    fn is_stale(&self, last_fetch: Instant, now: Instant) -> bool;

    /// Whether `event` makes every fresh value stale.
    fn stale_on(&self, _event: LifecycleEvent) -> bool {
        false
    }
}

/// Values go stale once `interval` has elapsed since the last successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicRefresh {
    interval: Duration,
}

impl PeriodicRefresh {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Refresh at the configured default interval.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.default_refresh_interval)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl RefreshControl for PeriodicRefresh {
    fn is_stale(&self, last_fetch: Instant, now: Instant) -> bool {
        now.saturating_duration_since(last_fetch) >= self.interval
    }
}

/// Values stay fresh until one of the named lifecycle events fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleScopedRefresh {
    events: HashSet<LifecycleEvent>,
}

impl LifecycleScopedRefresh {
    pub fn new(events: impl IntoIterator<Item = LifecycleEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }
}

impl RefreshControl for LifecycleScopedRefresh {
    fn is_stale(&self, _last_fetch: Instant, _now: Instant) -> bool {
        false
    }

    fn stale_on(&self, event: LifecycleEvent) -> bool {
        self.events.contains(&event)
    }
}

/// Values never go stale; only invalidation or a flush clears them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerpetualRefresh;

impl RefreshControl for PerpetualRefresh {
    fn is_stale(&self, _last_fetch: Instant, _now: Instant) -> bool {
        false
    }
}
