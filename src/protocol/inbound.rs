//! Inbound message types for the command channel.
//!
//! The robot does not tag its messages, so each JSON object is classified
//! by field presence, in priority order:
//!
//! | Priority | Shape | Variant |
//! |----------|-------|---------|
//! | 1 | `{"action": "PONG", "timestamp": n}` | [`InboundMessage::Pong`] |
//! | 2 | `{"status": "ok", ...}` | [`InboundMessage::Telemetry`] |
//! | 3 | `{"status": "error", "msg": ...}` | [`InboundMessage::RemoteError`] |
//! | 4 | `{"status_update": {...}}` | [`InboundMessage::Health`] |
//! | 5 | `{"head": "velocity_update", ...}` | [`InboundMessage::Velocity`] |
//!
//! Anything else is [`Error::MalformedMessage`](crate::Error::MalformedMessage).

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::{Value, from_str, from_value};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Fallback text for an error reply without a `msg` field.
const UNKNOWN_REMOTE_ERROR: &str = "unknown error";

// ============================================================================
// Telemetry Types
// ============================================================================

/// A per-wheel value; either side may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct WheelReading {
    /// Left wheel.
    #[serde(default)]
    pub left: Option<f64>,
    /// Right wheel.
    #[serde(default)]
    pub right: Option<f64>,
}

/// Acknowledgement of an executed command.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TelemetryRecord {
    /// Name of the command the robot executed.
    #[serde(default)]
    pub command: Option<String>,
    /// Wheel angular velocities.
    #[serde(default)]
    pub velocities: WheelReading,
    /// Motor duty cycles in percent.
    #[serde(default)]
    pub duty_cycles: WheelReading,
}

/// One hardware health condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthFlag {
    /// Condition is active right now.
    pub now: bool,
    /// Condition has occurred since boot.
    pub occurred: bool,
}

impl HealthFlag {
    /// Returns `true` if the condition is active or has ever occurred.
    #[inline]
    #[must_use]
    pub fn ever(self) -> bool {
        self.now || self.occurred
    }
}

/// Raspberry Pi throttling report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthFlags {
    /// Supply voltage below threshold.
    pub under_voltage: HealthFlag,
    /// ARM frequency capped.
    pub freq_capped: HealthFlag,
    /// CPU throttled.
    pub throttled: HealthFlag,
}

impl HealthFlags {
    /// Returns `true` if any condition is active right now.
    #[must_use]
    pub fn any_now(&self) -> bool {
        self.under_voltage.now || self.freq_capped.now || self.throttled.now
    }
}

/// Raw wheel velocities from a `velocity_update` message, before scaling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct VelocityReport {
    /// Left wheel raw value.
    pub left: f64,
    /// Right wheel raw value.
    pub right: f64,
}

// ============================================================================
// Wire Shapes
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HealthWire {
    under_voltage_now: bool,
    freq_capped_now: bool,
    throttled_now: bool,
    under_voltage_occurred: bool,
    freq_capped_occurred: bool,
    throttled_occurred: bool,
    error: Option<String>,
}

impl From<HealthWire> for HealthFlags {
    fn from(wire: HealthWire) -> Self {
        Self {
            under_voltage: HealthFlag {
                now: wire.under_voltage_now,
                occurred: wire.under_voltage_occurred,
            },
            freq_capped: HealthFlag {
                now: wire.freq_capped_now,
                occurred: wire.freq_capped_occurred,
            },
            throttled: HealthFlag {
                now: wire.throttled_now,
                occurred: wire.throttled_occurred,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct VelocityWire {
    left: Option<f64>,
    right: Option<f64>,
    velocities: Option<VelocityReport>,
}

// ============================================================================
// InboundMessage
// ============================================================================

/// A classified command-channel message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Echo of a latency probe.
    Pong {
        /// Timestamp from the matching PING, in epoch milliseconds.
        timestamp: u64,
    },
    /// Command acknowledgement with motor telemetry.
    Telemetry(TelemetryRecord),
    /// The robot rejected a command or a frame.
    RemoteError {
        /// Error text from the robot.
        message: String,
    },
    /// Hardware health report.
    Health(HealthFlags),
    /// The robot could not read its health status.
    HealthUnavailable {
        /// Reason reported by the robot.
        reason: String,
    },
    /// Raw wheel velocity update.
    Velocity(VelocityReport),
}

impl InboundMessage {
    /// Parses and classifies a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if the text is not JSON or
    /// matches no known shape.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value =
            from_str(text).map_err(|e| Error::malformed(format!("invalid JSON: {e}")))?;
        Self::classify(&value)
    }

    /// Classifies an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if the value matches no known shape.
    pub fn classify(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::malformed("expected a JSON object"))?;

        if object.get("action").and_then(Value::as_str) == Some("PONG")
            && let Some(timestamp) = object.get("timestamp").and_then(as_epoch_millis)
        {
            return Ok(InboundMessage::Pong { timestamp });
        }

        match object.get("status").and_then(Value::as_str) {
            Some("ok") => {
                let record: TelemetryRecord = from_value(value.clone())
                    .map_err(|e| Error::malformed(format!("bad telemetry record: {e}")))?;
                return Ok(InboundMessage::Telemetry(record));
            }
            Some("error") => {
                let message = object
                    .get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or(UNKNOWN_REMOTE_ERROR)
                    .to_string();
                return Ok(InboundMessage::RemoteError { message });
            }
            _ => {}
        }

        if let Some(update) = object.get("status_update") {
            let wire: HealthWire = from_value(update.clone())
                .map_err(|e| Error::malformed(format!("bad status_update: {e}")))?;
            return Ok(match wire.error {
                Some(reason) => InboundMessage::HealthUnavailable { reason },
                None => InboundMessage::Health(wire.into()),
            });
        }

        if object.get("head").and_then(Value::as_str) == Some("velocity_update") {
            let wire: VelocityWire = from_value(value.clone())
                .map_err(|e| Error::malformed(format!("bad velocity_update: {e}")))?;
            let report = match (wire.left, wire.right, wire.velocities) {
                (Some(left), Some(right), _) => VelocityReport { left, right },
                (_, _, Some(nested)) => nested,
                _ => return Err(Error::malformed("velocity_update without wheel values")),
            };
            return Ok(InboundMessage::Velocity(report));
        }

        Err(Error::malformed(format!("unrecognized message: {value}")))
    }
}

/// Reads a non-negative JSON number as whole milliseconds.
fn as_epoch_millis(value: &Value) -> Option<u64> {
    if let Some(ms) = value.as_u64() {
        return Some(ms);
    }
    value
        .as_f64()
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
        .map(|ms| ms as u64)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pong() {
        let message = InboundMessage::parse(r#"{"action":"PONG","timestamp":1000}"#).unwrap();
        assert_eq!(message, InboundMessage::Pong { timestamp: 1000 });
    }

    #[test]
    fn test_pong_with_fractional_timestamp() {
        let message = InboundMessage::parse(r#"{"action":"PONG","timestamp":1500.7}"#).unwrap();
        assert_eq!(message, InboundMessage::Pong { timestamp: 1500 });
    }

    #[test]
    fn test_pong_without_timestamp_is_malformed() {
        let err = InboundMessage::parse(r#"{"action":"PONG"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedMessage { .. }));
    }

    #[test]
    fn test_telemetry_record_fields() {
        let message = InboundMessage::parse(
            r#"{"status":"ok","command":"FORWARD","velocities":{"left":0.5,"right":0.5},"duty_cycles":{"left":80}}"#,
        )
        .unwrap();

        let InboundMessage::Telemetry(record) = message else {
            panic!("expected telemetry, got {message:?}");
        };
        assert_eq!(record.command.as_deref(), Some("FORWARD"));
        assert_eq!(
            record.velocities,
            WheelReading {
                left: Some(0.5),
                right: Some(0.5)
            }
        );
        assert_eq!(
            record.duty_cycles,
            WheelReading {
                left: Some(80.0),
                right: None
            }
        );
    }

    #[test]
    fn test_remote_error() {
        let message = InboundMessage::parse(r#"{"status":"error","msg":"Bad JSON"}"#).unwrap();
        assert_eq!(
            message,
            InboundMessage::RemoteError {
                message: "Bad JSON".into()
            }
        );

        let message = InboundMessage::parse(r#"{"status":"error"}"#).unwrap();
        assert_eq!(
            message,
            InboundMessage::RemoteError {
                message: UNKNOWN_REMOTE_ERROR.into()
            }
        );
    }

    #[test]
    fn test_health_flags() {
        let message = InboundMessage::parse(
            r#"{"status_update":{"under_voltage_now":true,"freq_capped_now":false,"throttled_now":false,
                "under_voltage_occurred":true,"freq_capped_occurred":false,"throttled_occurred":true}}"#,
        )
        .unwrap();

        let InboundMessage::Health(flags) = message else {
            panic!("expected health, got {message:?}");
        };
        assert!(flags.under_voltage.now);
        assert!(flags.under_voltage.occurred);
        assert!(!flags.freq_capped.ever());
        assert!(!flags.throttled.now);
        assert!(flags.throttled.ever());
        assert!(flags.any_now());
    }

    #[test]
    fn test_health_unavailable() {
        let message =
            InboundMessage::parse(r#"{"status_update":{"error":"vcgencmd not found"}}"#).unwrap();
        assert_eq!(
            message,
            InboundMessage::HealthUnavailable {
                reason: "vcgencmd not found".into()
            }
        );
    }

    #[test]
    fn test_velocity_update_flat_and_nested() {
        let flat =
            InboundMessage::parse(r#"{"head":"velocity_update","left":2.0,"right":-1.5}"#).unwrap();
        assert_eq!(
            flat,
            InboundMessage::Velocity(VelocityReport {
                left: 2.0,
                right: -1.5
            })
        );

        let nested = InboundMessage::parse(
            r#"{"head":"velocity_update","velocities":{"left":1.0,"right":1.0}}"#,
        )
        .unwrap();
        assert_eq!(
            nested,
            InboundMessage::Velocity(VelocityReport {
                left: 1.0,
                right: 1.0
            })
        );
    }

    #[test]
    fn test_priority_pong_over_status() {
        let message =
            InboundMessage::parse(r#"{"action":"PONG","timestamp":5,"status":"ok"}"#).unwrap();
        assert_eq!(message, InboundMessage::Pong { timestamp: 5 });
    }

    #[test]
    fn test_priority_status_over_status_update() {
        let message =
            InboundMessage::parse(r#"{"status":"error","msg":"x","status_update":{}}"#).unwrap();
        assert!(matches!(message, InboundMessage::RemoteError { .. }));
    }

    #[test]
    fn test_unrecognized_shapes() {
        for text in [
            "not json",
            "[1,2,3]",
            r#"{"hello":"world"}"#,
            r#"{"status":"pending"}"#,
            r#"{"head":"velocity_update"}"#,
        ] {
            let err = InboundMessage::parse(text).unwrap_err();
            assert!(err.is_telemetry_error(), "{text} -> {err}");
        }
    }
}
