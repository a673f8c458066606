//! Transport links and the connector seam.
//!
//! A [`Link`] is one open transport, reduced to a pair of channels:
//! frames to send and events received. [`Connection`](super::Connection)
//! only ever sees this pair, so its state machine runs unchanged on top of
//! a real WebSocket ([`WsConnector`]) or an in-memory pipe
//! ([`MemoryConnector`](super::MemoryConnector)).
//!
//! # WebSocket Pumps
//!
//! ```text
//!  Connection ──outgoing──► write pump ──► WebSocket sink
//!  Connection ◄──incoming── read pump  ◄── WebSocket stream
//! ```
//!
//! Dropping `outgoing` makes the write pump send a close frame. The read
//! pump ends when the socket ends or nobody listens any more.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Result;
use crate::protocol::Frame;

// ============================================================================
// LinkEvent
// ============================================================================

/// Something that happened on an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A data frame arrived.
    Frame(Frame),
    /// The remote end closed the link.
    Closed,
    /// The link failed.
    Failed(String),
}

// ============================================================================
// Link
// ============================================================================

/// One open transport.
#[derive(Debug)]
pub struct Link {
    /// Frames to transmit, in order.
    pub outgoing: mpsc::UnboundedSender<Frame>,
    /// Frames and lifecycle events from the remote end, in order.
    pub incoming: mpsc::UnboundedReceiver<LinkEvent>,
}

// ============================================================================
// Connector
// ============================================================================

/// Opens links to endpoints.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a link to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be reached.
    async fn open(&self, endpoint: &Url) -> Result<Link>;
}

// ============================================================================
// WsConnector
// ============================================================================

/// Opens WebSocket links with tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Creates a WebSocket connector.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, endpoint: &Url) -> Result<Link> {
        let (ws_stream, _) = connect_async(endpoint.as_str()).await?;
        debug!(%endpoint, "WebSocket connected");

        let (ws_write, ws_read) = ws_stream.split();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming) = mpsc::unbounded_channel();

        tokio::spawn(write_pump(ws_write, outgoing_rx));
        tokio::spawn(read_pump(ws_read, incoming_tx));

        Ok(Link { outgoing, incoming })
    }
}

// ============================================================================
// Pumps
// ============================================================================

/// Forwards queued frames to the socket, then closes it.
pub(crate) async fn write_pump<S>(mut sink: S, mut frames: mpsc::UnboundedReceiver<Frame>)
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    while let Some(frame) = frames.recv().await {
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes.into()),
        };

        if let Err(e) = sink.send(message).await {
            warn!(error = %e, "WebSocket write failed");
            return;
        }
    }

    trace!("Outgoing channel closed, closing socket");
    let _ = sink.close().await;
}

/// Forwards socket messages as link events until either side goes away.
pub(crate) async fn read_pump<S>(mut stream: S, events: mpsc::UnboundedSender<LinkEvent>)
where
    S: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    loop {
        let event = match stream.next().await {
            Some(Ok(Message::Text(text))) => LinkEvent::Frame(Frame::Text(text.as_str().to_owned())),
            Some(Ok(Message::Binary(bytes))) => LinkEvent::Frame(Frame::Binary(bytes.to_vec())),
            Some(Ok(Message::Close(_))) | None => {
                let _ = events.send(LinkEvent::Closed);
                break;
            }
            Some(Err(e)) => {
                let _ = events.send(LinkEvent::Failed(e.to_string()));
                break;
            }
            // Ping, Pong and raw frames are handled by tungstenite
            Some(Ok(_)) => continue,
        };

        if events.send(event).is_err() {
            break;
        }
    }

    trace!("Read pump terminated");
}

// ============================================================================
// Tests
// ============================================================================
