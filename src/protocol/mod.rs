//! Wire protocol message types.
//!
//! This module defines the frames exchanged with the robot's command and
//! video servers.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Channel | Purpose |
//! |--------------|-----------|---------|---------|
//! | [`Command`] | Local → Robot | command | Motion, camera and probe commands |
//! | [`InboundMessage`] | Robot → Local | command | Telemetry, health, PONG, errors |
//! | [`Frame::Binary`] | Robot → Local | video | One encoded camera image |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Outbound command vocabulary and encoding |
//! | `frame` | Transport message unit |
//! | `inbound` | Inbound message classification |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound command vocabulary.
pub mod command;

/// Transport message unit.
pub mod frame;

/// Inbound command-channel messages.
pub mod inbound;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, CommandMessage, ImageSetting, MAX_DUTY, MIN_DUTY};
pub use frame::Frame;
pub use inbound::{
    HealthFlag, HealthFlags, InboundMessage, TelemetryRecord, VelocityReport, WheelReading,
};
