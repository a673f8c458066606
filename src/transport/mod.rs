//! Transport layer.
//!
//! This module handles the links between the dashboard (local end) and the
//! robot's WebSocket servers (remote end).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                               ┌──────────────────┐
//! │  Connection      │          WebSocket            │  Raspberry Pi    │
//! │   status FSM     │◄─────────────────────────────►│  command :9000   │
//! │   event loop     │      ws://RPI_IP:PORT         │  raw video :9001 │
//! │   Link (pumps)   │                               │  processed :9002 │
//! └──────────────────┘                               └──────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::new` - Disconnected, nothing opened
//! 2. `Connection::connect` - `Connector::open` yields a `Link`
//! 3. Event loop delivers inbound frames to the message handler
//! 4. `Connection::send` - Queue frames while connected
//! 5. `Connection::close` - Stop delivery and release the link
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Connection state machine and event loop |
//! | `link` | `Connector` trait, `Link`, WebSocket connector |
//! | `memory` | In-memory connector |
//! | `status` | Status values and listeners |

// ============================================================================
// Submodules
// ============================================================================

/// Connection state machine and event loop.
pub mod connection;

/// Connector seam and WebSocket links.
pub mod link;

/// In-memory links.
pub mod memory;

/// Status values and listeners.
pub mod status;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionConfig, MessageHandler};
pub use link::{Connector, Link, LinkEvent, WsConnector};
pub use memory::{MemoryConnector, RemoteEnd};
pub use status::{ConnectionStatus, StatusEvent, StatusListener, StatusNotifier};
