//! Connection to one robot endpoint.
//!
//! A [`Connection`] wraps one logical channel. It owns at most one link at a
//! time and runs a small state machine:
//!
//! ```text
//!                 connect()                 link opened
//! Disconnected ─────────────► Connecting ─────────────────► Connected
//!      ▲                          │                             │
//!      │        open failed       │                             │
//!      ├──────────────────────────┘                             │
//!      │            close() / remote close / transport error    │
//!      └────────────────────────────────────────────────────────┘
//! ```
//!
//! Every transition is published to status listeners.
//!
//! # Event Loop
//!
//! Each open link gets a tokio task that delivers inbound frames to the
//! configured message handler, in transport order, until the link ends or
//! the connection is closed.
//!
//! # Cancellation
//!
//! Every link carries a gate that is checked, under a re-entrant lock, before
//! each handler call. `close()` shuts the gate under the same lock, so once
//! it returns no handler call for that link can start. A handler may close
//! its own connection.

// ============================================================================
// Imports
// ============================================================================

use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::ReconnectConfig;
use crate::error::{Error, Result};
use crate::identifiers::ListenerId;
use crate::protocol::Frame;

use super::link::{Connector, Link, LinkEvent};
use super::status::{ConnectionStatus, StatusEvent, StatusListener, StatusNotifier};

// ============================================================================
// Types
// ============================================================================

/// Inbound frame callback.
pub type MessageHandler = Arc<dyn Fn(Frame) + Send + Sync>;

/// Per-link delivery gate. `true` while frames may be delivered.
type Gate = Arc<ReentrantMutex<Cell<bool>>>;

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Immutable description of one channel.
#[derive(Clone)]
pub struct ConnectionConfig {
    endpoint: Url,
    label: String,
    on_message: MessageHandler,
}

impl ConnectionConfig {
    /// Creates a channel description.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - WebSocket URL of the robot server
    /// * `label` - Short name used in logs and status events
    /// * `on_message` - Called for every inbound frame
    pub fn new(
        endpoint: Url,
        label: impl Into<String>,
        on_message: impl Fn(Frame) + Send + Sync + 'static,
    ) -> Self {
        Self {
            endpoint,
            label: label.into(),
            on_message: Arc::new(on_message),
        }
    }

    /// Endpoint URL.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Channel label.
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Internal State
// ============================================================================

/// Handles for the live link.
struct Session {
    /// Frames to the link writer.
    outgoing: mpsc::UnboundedSender<Frame>,
    /// Dropping this stops the event loop.
    _shutdown: oneshot::Sender<()>,
    /// Delivery gate shared with the event loop.
    gate: Gate,
}

struct State {
    status: ConnectionStatus,
    /// Bumped by every connect and close; stale links compare against it.
    generation: u64,
    /// Bumped whenever pending reconnect loops must stop.
    reconnect_epoch: u64,
    session: Option<Session>,
    last_error: Option<String>,
}

struct Shared {
    config: ConnectionConfig,
    connector: Arc<dyn Connector>,
    reconnect: ReconnectConfig,
    state: Mutex<State>,
    notifier: StatusNotifier,
}

/// Why an event loop stopped.
enum LinkEnd {
    Local,
    RemoteClosed,
    Failed(String),
}

// ============================================================================
// Connection
// ============================================================================

/// One logical channel to the robot.
///
/// Cloning is cheap; clones share the same link and state.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Creates a disconnected connection with manual reconnect.
    #[must_use]
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        Self::with_reconnect(config, connector, ReconnectConfig::manual())
    }

    /// Creates a disconnected connection with a reconnection policy.
    #[must_use]
    pub fn with_reconnect(
        config: ConnectionConfig,
        connector: Arc<dyn Connector>,
        reconnect: ReconnectConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                connector,
                reconnect,
                state: Mutex::new(State {
                    status: ConnectionStatus::Disconnected,
                    generation: 0,
                    reconnect_epoch: 0,
                    session: None,
                    last_error: None,
                }),
                notifier: StatusNotifier::new(),
            }),
        }
    }
}

// ============================================================================
// Connection - Accessors
// ============================================================================

impl Connection {
    /// Channel label.
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        self.shared.config.label()
    }

    /// Endpoint URL.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        self.shared.config.endpoint()
    }

    /// Current status.
    #[inline]
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.shared.state.lock().status
    }

    /// Returns `true` when frames can be sent.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Last transport error, cleared on a successful connect.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.shared.state.lock().last_error.clone()
    }

    /// Reconnection policy.
    #[inline]
    #[must_use]
    pub fn reconnect_config(&self) -> ReconnectConfig {
        self.shared.reconnect
    }

    /// Subscribes to status transitions.
    pub fn subscribe(&self, listener: impl Fn(&StatusEvent) + Send + Sync + 'static) -> ListenerId {
        let listener: StatusListener = Arc::new(listener);
        self.shared.notifier.subscribe(listener)
    }

    /// Removes a status subscription.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.notifier.unsubscribe(id)
    }
}

// ============================================================================
// Connection - Lifecycle
// ============================================================================

impl Connection {
    /// Opens the link.
    ///
    /// Transitions `Disconnected → Connecting → Connected`, or back to
    /// `Disconnected` if the link cannot be opened. Does nothing if the
    /// connection is already connecting or connected. Cancels any pending
    /// automatic reconnect.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if the link cannot be opened
    /// - [`Error::ConnectionClosed`] if `close()` was called while opening
    pub async fn connect(&self) -> Result<()> {
        self.shared.state.lock().reconnect_epoch += 1;
        self.open_link().await
    }

    /// Queues a frame for transmission.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the status is not `Connected`.
    /// Nothing is sent in that case.
    pub fn send(&self, frame: impl Into<Frame>) -> Result<()> {
        let frame = frame.into();
        let state = self.shared.state.lock();

        if state.status == ConnectionStatus::Connected
            && let Some(session) = &state.session
            && session.outgoing.send(frame).is_ok()
        {
            return Ok(());
        }

        warn!(
            channel = %self.label(),
            status = %state.status,
            "Send dropped, channel not connected"
        );
        Err(Error::not_connected(self.label()))
    }

    /// Closes the link. Idempotent.
    ///
    /// After this returns no further message handler call starts for the
    /// closed link, and any pending automatic reconnect is cancelled.
    pub fn close(&self) {
        let (session, event) = {
            let mut state = self.shared.state.lock();
            state.reconnect_epoch += 1;

            if !state.status.is_open() {
                trace!(channel = %self.label(), "Close ignored, already disconnected");
                return;
            }

            state.generation += 1;
            let session = state.session.take();
            let event = self.transition(&mut state, ConnectionStatus::Disconnected);
            (session, event)
        };

        if let Some(session) = session {
            session.gate.lock().set(false);
        }

        info!(channel = %self.label(), "Connection closed");
        self.emit(event);
    }
}

// ============================================================================
// Connection - Internals
// ============================================================================

impl Connection {
    /// Sets the status and returns the event to publish once unlocked.
    fn transition(&self, state: &mut State, next: ConnectionStatus) -> Option<StatusEvent> {
        let previous = state.status;
        if previous == next {
            return None;
        }
        state.status = next;
        Some(StatusEvent {
            label: self.label().to_string(),
            previous,
            current: next,
        })
    }

    /// Publishes a transition. Must be called without the state lock.
    fn emit(&self, event: Option<StatusEvent>) {
        if let Some(event) = event {
            self.shared.notifier.notify(&event);
        }
    }

    /// Connect without touching the reconnect epoch.
    async fn open_link(&self) -> Result<()> {
        let (generation, event) = {
            let mut state = self.shared.state.lock();
            if state.status.is_open() {
                debug!(channel = %self.label(), status = %state.status, "Connect ignored");
                return Ok(());
            }
            state.generation += 1;
            let event = self.transition(&mut state, ConnectionStatus::Connecting);
            (state.generation, event)
        };
        self.emit(event);

        debug!(channel = %self.label(), endpoint = %self.endpoint(), "Connecting");
        let result = self.shared.connector.open(self.endpoint()).await;

        let mut state = self.shared.state.lock();
        if state.generation != generation {
            drop(state);
            debug!(channel = %self.label(), "Link opened after close, discarding");
            return Err(Error::ConnectionClosed);
        }

        match result {
            Ok(link) => {
                let Link { outgoing, incoming } = link;
                let gate: Gate = Arc::new(ReentrantMutex::new(Cell::new(true)));
                let (shutdown_tx, shutdown_rx) = oneshot::channel();

                state.session = Some(Session {
                    outgoing,
                    _shutdown: shutdown_tx,
                    gate: Arc::clone(&gate),
                });
                state.last_error = None;
                let event = self.transition(&mut state, ConnectionStatus::Connected);
                drop(state);

                tokio::spawn(Self::run_event_loop(
                    Arc::downgrade(&self.shared),
                    generation,
                    incoming,
                    shutdown_rx,
                    gate,
                    Arc::clone(&self.shared.config.on_message),
                ));

                info!(channel = %self.label(), endpoint = %self.endpoint(), "Connected");
                self.emit(event);
                Ok(())
            }
            Err(e) => {
                let message = match e {
                    Error::Transport { message, .. } => message,
                    other => other.to_string(),
                };
                state.last_error = Some(message.clone());
                let event = self.transition(&mut state, ConnectionStatus::Disconnected);
                drop(state);

                warn!(channel = %self.label(), error = %message, "Connect failed");
                self.emit(event);
                Err(Error::transport(self.label(), message))
            }
        }
    }

    /// Event loop for one link.
    async fn run_event_loop(
        shared: Weak<Shared>,
        generation: u64,
        mut incoming: mpsc::UnboundedReceiver<LinkEvent>,
        mut shutdown_rx: oneshot::Receiver<()>,
        gate: Gate,
        on_message: MessageHandler,
    ) {
        let end = loop {
            tokio::select! {
                biased;

                _ = &mut shutdown_rx => break LinkEnd::Local,

                event = incoming.recv() => match event {
                    Some(LinkEvent::Frame(frame)) => Self::dispatch(&gate, &on_message, frame),
                    Some(LinkEvent::Closed) | None => break LinkEnd::RemoteClosed,
                    Some(LinkEvent::Failed(message)) => break LinkEnd::Failed(message),
                },
            }
        };

        if let Some(shared) = shared.upgrade() {
            Connection { shared }.on_link_end(generation, end);
        }
    }

    /// Delivers one frame unless the link has been closed.
    fn dispatch(gate: &Gate, on_message: &MessageHandler, frame: Frame) {
        let live = gate.lock();
        if live.get() {
            on_message(frame);
        } else {
            trace!("Frame dropped after close");
        }
    }

    /// Handles the end of a link's event loop.
    fn on_link_end(&self, generation: u64, end: LinkEnd) {
        let message = match end {
            LinkEnd::Local => {
                debug!(channel = %self.label(), "Event loop stopped");
                return;
            }
            LinkEnd::RemoteClosed => "closed by remote".to_string(),
            LinkEnd::Failed(message) => message,
        };

        let (event, retry_epoch) = {
            let mut state = self.shared.state.lock();
            if state.generation != generation {
                return;
            }
            state.session = None;
            state.last_error = Some(message.clone());
            let event = self.transition(&mut state, ConnectionStatus::Disconnected);
            state.reconnect_epoch += 1;
            (event, state.reconnect_epoch)
        };

        warn!(channel = %self.label(), error = %message, "Transport error, link lost");
        self.emit(event);

        if self.shared.reconnect.enabled {
            tokio::spawn(self.clone().reconnect_loop(retry_epoch));
        }
    }

    /// Retries the link until it opens, the budget runs out, or it is cancelled.
    async fn reconnect_loop(self, epoch: u64) {
        let policy = self.shared.reconnect;
        let mut attempts = 0;

        while policy.allows_attempt(attempts) {
            tokio::time::sleep(policy.interval).await;

            {
                let state = self.shared.state.lock();
                if state.reconnect_epoch != epoch || state.status.is_open() {
                    debug!(channel = %self.label(), "Reconnect cancelled");
                    return;
                }
            }

            attempts += 1;
            info!(
                channel = %self.label(),
                attempt = attempts,
                max_attempts = policy.max_attempts,
                "Reconnecting"
            );

            if self.open_link().await.is_ok() {
                return;
            }
        }

        warn!(channel = %self.label(), attempts, "Reconnect attempts exhausted");
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("label", &self.label())
            .field("endpoint", &self.endpoint().as_str())
            .field("status", &self.status())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
