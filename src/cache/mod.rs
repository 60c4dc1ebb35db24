// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Keyed Cache
//!
//! Generic in-memory cache used beneath network-backed repositories
//! (balances, activity, block heights, KYC tiers, settings).
//!
//! ## Guarantees
//!
//! - At most one fetch per key is in flight; callers arriving while it runs
//!   join it and observe the same outcome.
//! - Fetches run in their own task: a caller that stops waiting does not
//!   cancel the fetch for anyone else.
//! - Failures are stored and returned, never swallowed. The staleness clock
//!   only advances on success, so the next `get` after a failure refetches.
//! - `invalidate` / `invalidate_all` take effect before they return.

pub mod entry;
pub mod keyed;
pub mod policy;

pub use entry::{CachedValue, EntryState};
pub use keyed::KeyedCache;
pub use policy::{LifecycleScopedRefresh, PeriodicRefresh, PerpetualRefresh, RefreshControl};

use crate::lifecycle::LifecycleEvent;

/// Cache-wide settings independent of the refresh policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfiguration {
    /// Label used in log events.
    pub name: &'static str,
    /// Lifecycle events that flush every entry.
    pub flush_on: Vec<LifecycleEvent>,
    /// Whether completed fetches are kept. When false the cache only
    /// deduplicates fetches that are in flight.
    pub retain_results: bool,
}

impl Default for CacheConfiguration {
    fn default() -> Self {
        Self {
            name: "cache",
            flush_on: vec![LifecycleEvent::LoggedOut],
            retain_results: true,
        }
    }
}

impl CacheConfiguration {
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Keep entries across every lifecycle event.
    pub fn without_flush(mut self) -> Self {
        self.flush_on.clear();
        self
    }

    /// Drop each entry as soon as its fetch completes.
    pub fn in_flight_only(mut self) -> Self {
        self.retain_results = false;
        self
    }
}
