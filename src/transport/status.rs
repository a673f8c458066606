//! Connection status and status listeners.
//!
//! Every status transition of a [`Connection`](super::Connection) is
//! published to its subscribers. UI layers use this for icon state and
//! button enablement; the registry uses it to drive the latency probe.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::identifiers::ListenerId;

// ============================================================================
// ConnectionStatus
// ============================================================================

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// No link.
    #[default]
    Disconnected,
    /// Link being opened.
    Connecting,
    /// Link open; frames can be sent.
    Connected,
}

impl ConnectionStatus {
    /// Returns `true` unless the connection is `Disconnected`.
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, ConnectionStatus::Disconnected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        })
    }
}

// ============================================================================
// StatusEvent
// ============================================================================

/// A single status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    /// Label of the connection that changed.
    pub label: String,
    /// Status before the transition.
    pub previous: ConnectionStatus,
    /// Status after the transition.
    pub current: ConnectionStatus,
}

/// Status listener callback.
pub type StatusListener = Arc<dyn Fn(&StatusEvent) + Send + Sync>;

// ============================================================================
// StatusNotifier
// ============================================================================

/// Subscriber list for status events.
#[derive(Default)]
pub struct StatusNotifier {
    listeners: Mutex<Vec<(ListenerId, StatusListener)>>,
}

impl StatusNotifier {
    /// Creates an empty notifier.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn subscribe(&self, listener: StatusListener) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.lock().push((id, listener));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Returns `true` if nobody is subscribed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers an event to every listener.
    ///
    /// Listeners are called outside the lock, so they may subscribe or
    /// unsubscribe.
    pub fn notify(&self, event: &StatusEvent) {
        let listeners: Vec<StatusListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        trace!(
            label = %event.label,
            previous = %event.previous,
            current = %event.current,
            listeners = listeners.len(),
            "Status transition"
        );

        for listener in listeners {
            listener(event);
        }
    }
}

impl fmt::Debug for StatusNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusNotifier")
            .field("listeners", &self.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn event(current: ConnectionStatus) -> StatusEvent {
        StatusEvent {
            label: "cmd".into(),
            previous: ConnectionStatus::Disconnected,
            current,
        }
    }

    #[test]
    fn test_is_open() {
        assert!(!ConnectionStatus::Disconnected.is_open());
        assert!(ConnectionStatus::Connecting.is_open());
        assert!(ConnectionStatus::Connected.is_open());
    }

    #[test]
    fn test_notify_and_unsubscribe() {
        let notifier = StatusNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let id = notifier.subscribe(Arc::new(move |e: &StatusEvent| sink.lock().push(e.current)));

        notifier.notify(&event(ConnectionStatus::Connecting));
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.notify(&event(ConnectionStatus::Connected));

        assert_eq!(*seen.lock(), vec![ConnectionStatus::Connecting]);
        assert!(notifier.is_empty());
    }

    #[test]
    fn test_listener_may_subscribe_during_notify() {
        let notifier = Arc::new(StatusNotifier::new());
        let inner = Arc::clone(&notifier);
        notifier.subscribe(Arc::new(move |_: &StatusEvent| {
            inner.subscribe(Arc::new(|_: &StatusEvent| {}));
        }));

        notifier.notify(&event(ConnectionStatus::Connected));
        assert_eq!(notifier.len(), 2);
    }
}
