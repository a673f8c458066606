//! Rover Link - WebSocket link layer for a Raspberry Pi robot dashboard.
//!
//! This library connects an operator dashboard to the robot's three
//! WebSocket servers and turns what flows over them into typed values.
//!
//! # Architecture
//!
//! The dashboard follows a client-server model:
//!
//! - **Local End (Rust)**: Sends JSON commands, receives telemetry and video
//! - **Remote End (Robot)**: Command server on one port, raw and processed
//!   camera feeds on two more
//!
//! Key design principles:
//!
//! - Each [`Connection`] owns: one link + status state machine + event loop
//! - Commands are `{"action": "NAME"}` JSON text frames
//! - Inbound messages are classified into a tagged [`InboundMessage`]
//! - Only one video feed is open at a time
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rover_link::{Command, ConnectionRegistry, DashboardConfig, NullSink, Result, WsConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = DashboardConfig::new().with_host("192.168.20.9");
//!     let registry = ConnectionRegistry::new(&config, Arc::new(WsConnector), Arc::new(NullSink))?;
//!
//!     // Command channel and raw video feed
//!     registry.connect_all().await?;
//!     registry.send_command(&Command::Forward)?;
//!
//!     // Raw feed -> processed feed
//!     registry.switch_video_feed().await?;
//!
//!     registry.close_all();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Settings, reconnection policy, settings store |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Channel kinds and listener IDs |
//! | [`input`] | Keyboard bindings |
//! | [`protocol`] | Wire frames, commands, inbound messages |
//! | [`registry`] | The three channels of a session |
//! | [`router`] | Inbound dispatch to a [`TelemetrySink`] |
//! | [`telemetry`] | Latency, velocity and frame-rate processing |
//! | [`transport`] | Connections and links |

// ============================================================================
// Modules
// ============================================================================

/// Dashboard settings and their persistence.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Keyboard bindings.
pub mod input;

/// Wire protocol types.
///
/// Outbound [`Command`]s and classified [`InboundMessage`]s.
pub mod protocol;

/// Connection registry.
pub mod registry;

/// Inbound message routing.
pub mod router;

/// Telemetry processing.
pub mod telemetry;

/// Transport layer.
///
/// Connection state machine, the [`Connector`] seam and its implementations.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Config types
pub use config::{DashboardConfig, JsonFileStore, ReconnectConfig, SettingsStore};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ChannelKind, ListenerId};

// Input types
pub use input::{Key, KeyboardController};

// Protocol types
pub use protocol::{
    Command, Frame, HealthFlag, HealthFlags, ImageSetting, InboundMessage, TelemetryRecord,
    VelocityReport, WheelReading,
};

// Registry types
pub use registry::{ConnectionRegistry, FeedPlan, VideoFeedState};

// Router types
pub use router::{Arrival, NullSink, Router, TelemetrySink};

// Telemetry types
pub use telemetry::{FrameRateMeter, LatencyProbe, VelocitySample, VelocityTracker};

// Transport types
pub use transport::{
    Connection, ConnectionConfig, ConnectionStatus, Connector, Link, LinkEvent, MemoryConnector,
    RemoteEnd, StatusEvent, WsConnector,
};
