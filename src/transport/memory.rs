//! In-memory connector.
//!
//! [`MemoryConnector`] hands out links whose far side is a [`RemoteEnd`]
//! held by the caller. It is used to drive connections, the registry and the
//! router without a network, and to simulate a robot in demos.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::Frame;

use super::link::{Connector, Link, LinkEvent};

// ============================================================================
// RemoteEnd
// ============================================================================

/// The robot-side end of an in-memory link.
#[derive(Debug)]
pub struct RemoteEnd {
    endpoint: Url,
    sent: mpsc::UnboundedReceiver<Frame>,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl RemoteEnd {
    /// Endpoint the link was opened for.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Delivers a frame to the local end. Returns `false` once it is gone.
    pub fn push(&self, frame: impl Into<Frame>) -> bool {
        self.events.send(LinkEvent::Frame(frame.into())).is_ok()
    }

    /// Delivers a text frame to the local end.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.push(Frame::Text(text.into()))
    }

    /// Closes the link from the remote side.
    pub fn hang_up(&self) {
        let _ = self.events.send(LinkEvent::Closed);
    }

    /// Fails the link with a transport error.
    pub fn fail(&self, message: impl Into<String>) {
        let _ = self.events.send(LinkEvent::Failed(message.into()));
    }

    /// Waits for the next frame sent by the local end.
    ///
    /// Returns `None` once the local end dropped its sender.
    pub async fn next_sent(&mut self) -> Option<Frame> {
        self.sent.recv().await
    }

    /// Returns a frame sent by the local end, if one is queued.
    pub fn try_next_sent(&mut self) -> Option<Frame> {
        self.sent.try_recv().ok()
    }

    /// Returns `true` once the local end has released the link.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.events.is_closed()
    }
}

// ============================================================================
// MemoryConnector
// ============================================================================

/// Connector whose links terminate in [`RemoteEnd`]s.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    refuse: AtomicBool,
    delay: Mutex<Option<Duration>>,
    remotes: Mutex<Vec<RemoteEnd>>,
    opened: AtomicUsize,
}

impl MemoryConnector {
    /// Creates a connector that accepts every open.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent opens fail (or succeed again).
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Delays each open by `delay`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Number of links opened so far.
    #[inline]
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Takes the most recent remote end opened for `endpoint`.
    pub fn take_remote(&self, endpoint: &Url) -> Option<RemoteEnd> {
        let mut remotes = self.remotes.lock();
        let index = remotes.iter().rposition(|r| &r.endpoint == endpoint)?;
        Some(remotes.remove(index))
    }

    /// Number of remote ends not yet taken.
    #[inline]
    #[must_use]
    pub fn pending_remotes(&self) -> usize {
        self.remotes.lock().len()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, endpoint: &Url) -> Result<Link> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.refuse.load(Ordering::SeqCst) {
            return Err(Error::transport(endpoint.as_str(), "connection refused"));
        }

        let (outgoing, sent) = mpsc::unbounded_channel();
        let (events, incoming) = mpsc::unbounded_channel();

        self.remotes.lock().push(RemoteEnd {
            endpoint: endpoint.clone(),
            sent,
            events,
        });
        self.opened.fetch_add(1, Ordering::SeqCst);
        debug!(%endpoint, "Memory link opened");

        Ok(Link { outgoing, incoming })
    }
}

// ============================================================================
// Tests
// ============================================================================
