// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-wide lifecycle notifications (login, logout, transaction submitted).
//!
//! Caches and the token store subscribe to these to go stale or flush
//! themselves. The hub is an explicit, cloneable handle rather than a global.

use tokio::sync::broadcast;

/// Capacity of the broadcast buffer. Slow subscribers that fall further
/// behind observe a lag instead of blocking publishers.
const EVENT_BUFFER: usize = 64;

/// A process-wide lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    LoggedIn,
    LoggedOut,
    TransactionSubmitted,
}

/// Publish/subscribe hub for [`LifecycleEvent`]s.
#[derive(Debug, Clone)]
pub struct LifecycleEvents {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl Default for LifecycleEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns the number of subscribers that will observe it.
    pub fn publish(&self, event: LifecycleEvent) -> usize {
        tracing::debug!(?event, "Publishing lifecycle event");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let events = LifecycleEvents::new();
        let mut first = events.subscribe();
        let mut second = events.subscribe();

        assert_eq!(events.publish(LifecycleEvent::LoggedOut), 2);

        assert_eq!(first.recv().await.unwrap(), LifecycleEvent::LoggedOut);
        assert_eq!(second.recv().await.unwrap(), LifecycleEvent::LoggedOut);
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let events = LifecycleEvents::new();
        assert_eq!(events.publish(LifecycleEvent::LoggedIn), 0);
    }
}
