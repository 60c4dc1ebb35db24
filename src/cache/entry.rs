// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-key calculation state.

use futures_util::future::{BoxFuture, Shared};
use tokio::time::Instant;

use crate::error::CacheError;

/// The future every caller of an in-flight key awaits.
pub(crate) type InFlight<V, E> = Shared<BoxFuture<'static, Result<V, CacheError<E>>>>;

/// Internal slot stored for a key. A missing slot is the `Empty` state.
pub(crate) enum Slot<V, E> {
    /// A fetch is running; `previous` is the last value held before it started.
    ///
    /// `stale_on_arrival` is set when a staleness event fires mid-flight; the
    /// result then lands as `Stale` rather than `Fresh`.
    Fetching {
        id: u64,
        flight: InFlight<V, E>,
        previous: Option<V>,
        stale_on_arrival: bool,
    },
    /// Fetched at `fetched_at`; may still turn stale under the refresh policy.
    Fresh { value: V, fetched_at: Instant },
    /// Explicitly marked stale by a lifecycle event.
    Stale { value: V, fetched_at: Instant },
    /// The last fetch failed and has not been retried yet.
    Failed {
        error: CacheError<E>,
        previous: Option<V>,
    },
}

impl<V, E> Slot<V, E> {
    /// Take the value this slot holds or held before its last fetch.
    pub(crate) fn into_previous(self) -> Option<V> {
        match self {
            Slot::Fresh { value, .. } | Slot::Stale { value, .. } => Some(value),
            Slot::Fetching { previous, .. } | Slot::Failed { previous, .. } => previous,
        }
    }
}

/// Observable state of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState<E> {
    /// Never fetched, or invalidated.
    Empty,
    /// A fetch is in flight.
    Fetching,
    /// Ready to serve.
    Fresh,
    /// A value exists but a refresh is due.
    Stale,
    /// The last fetch failed with this error.
    Failed(CacheError<E>),
}

/// Result of a non-fetching lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue<V> {
    /// Nothing is held for the key.
    Absent,
    /// A value is held but is due for refresh, being refreshed, or its
    /// refresh failed.
    Stale(V),
    /// A fresh value is held.
    Present(V),
}

impl<V> CachedValue<V> {
    /// The held value regardless of freshness.
    pub fn value(self) -> Option<V> {
        match self {
            CachedValue::Absent => None,
            CachedValue::Stale(value) | CachedValue::Present(value) => Some(value),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, CachedValue::Present(_))
    }
}
