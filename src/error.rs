//! Error types for the rover link.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use rover_link::{Command, Result};
//!
//! fn drive(registry: &ConnectionRegistry) -> Result<()> {
//!     registry.send_command(&Command::Forward)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Connection | [`Error::NotConnected`], [`Error::Transport`], [`Error::ConnectionClosed`] |
//! | Telemetry | [`Error::MalformedMessage`], [`Error::UnrealisticTelemetry`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |
//!
//! None of these is fatal: the worst case is a channel that stays
//! disconnected until the operator reconnects it.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::ChannelKind;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when an endpoint or a stored setting is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid command argument.
    ///
    /// Returned when a command name or parameter cannot be parsed.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Send attempted while the channel is not open.
    #[error("Channel {channel} is not connected")]
    NotConnected {
        /// Label of the channel.
        channel: String,
    },

    /// Underlying transport failure.
    ///
    /// The channel transitions to `Disconnected` when this is reported.
    #[error("Transport error on {channel}: {message}")]
    Transport {
        /// Label of the channel.
        channel: String,
        /// Description of the failure.
        message: String,
    },

    /// Link closed while an operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Telemetry Errors
    // ========================================================================
    /// Inbound payload matches no known shape.
    #[error("Malformed message: {message}")]
    MalformedMessage {
        /// Why the payload was rejected.
        message: String,
    },

    /// Velocity update implies an impossible acceleration.
    #[error("Unrealistic telemetry: {acceleration:.2} m/s^2")]
    UnrealisticTelemetry {
        /// Implied acceleration magnitude.
        acceleration: f64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a not-connected error for a channel label.
    #[inline]
    pub fn not_connected(channel: impl Into<String>) -> Self {
        Self::NotConnected {
            channel: channel.into(),
        }
    }

    /// Creates a transport error for a channel label.
    #[inline]
    pub fn transport(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed message error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage {
            message: message.into(),
        }
    }

    /// Creates an unrealistic telemetry error.
    #[inline]
    pub fn unrealistic_telemetry(acceleration: f64) -> Self {
        Self::UnrealisticTelemetry { acceleration }
    }

    /// Creates a not-connected error for a known channel.
    #[inline]
    pub fn channel_not_connected(kind: ChannelKind) -> Self {
        Self::not_connected(kind.label())
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected { .. }
                | Self::Transport { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error came from an inbound telemetry frame.
    #[inline]
    #[must_use]
    pub fn is_telemetry_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedMessage { .. } | Self::UnrealisticTelemetry { .. }
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed after a reconnect or on the next frame.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotConnected { .. }
                | Self::Transport { .. }
                | Self::ConnectionClosed
                | Self::MalformedMessage { .. }
                | Self::UnrealisticTelemetry { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::transport("cmd", "connection refused");
        assert_eq!(
            err.to_string(),
            "Transport error on cmd: connection refused"
        );
    }

    #[test]
    fn test_not_connected_display() {
        let err = Error::channel_not_connected(ChannelKind::RawVideo);
        assert_eq!(err.to_string(), "Channel raw-video is not connected");
    }

    #[test]
    fn test_unrealistic_telemetry_display() {
        let err = Error::unrealistic_telemetry(12.345);
        assert_eq!(err.to_string(), "Unrealistic telemetry: 12.35 m/s^2");
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::not_connected("cmd").is_connection_error());
        assert!(Error::transport("cmd", "x").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_is_telemetry_error() {
        assert!(Error::malformed("bad").is_telemetry_error());
        assert!(Error::unrealistic_telemetry(50.0).is_telemetry_error());
        assert!(!Error::ConnectionClosed.is_telemetry_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::not_connected("cmd").is_recoverable());
        assert!(!Error::config("test").is_recoverable());
        assert!(!Error::invalid_argument("test").is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
