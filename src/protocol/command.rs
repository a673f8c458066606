//! Outbound command vocabulary and wire encoding.
//!
//! Every command travels as a single JSON text frame:
//!
//! ```json
//! { "action": "FORWARD" }
//! { "action": "SET_DUTY 20 80" }
//! { "action": "PING", "timestamp": 1724812345678 }
//! ```
//!
//! Parameterized commands carry their parameters inside the action string,
//! which is the form the robot's command server splits on whitespace.
//!
//! # Command Groups
//!
//! | Group | Commands |
//! |-------|----------|
//! | Drive | `FORWARD`, `REVERSE`, `LEFT`, `RIGHT`, `DRIVE_STOP`, `SET_DUTY` |
//! | Camera | `CAM_UP`, `CAM_DOWN`, `CAM_LEFT`, `CAM_RIGHT`, `CAM_STOP`, `CAM_REHOME`, `CAM_TAKE_PHOTO` |
//! | Imaging | `IR_*`, `NIGHT_MODE_*`, `CAM_MODE_*`, brightness/contrast/gamma |
//! | Session | `PING` |

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};

use super::frame::Frame;

// ============================================================================
// Constants
// ============================================================================

/// Lowest accepted duty cycle percentage.
pub const MIN_DUTY: u8 = 0;

/// Highest accepted duty cycle percentage.
pub const MAX_DUTY: u8 = 100;

// ============================================================================
// ImageSetting
// ============================================================================

/// Camera image parameter adjusted by the step and set commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSetting {
    /// Sensor brightness.
    Brightness,
    /// Sensor contrast.
    Contrast,
    /// Gamma correction.
    Gamma,
}

impl ImageSetting {
    /// Wire name fragment.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ImageSetting::Brightness => "BRIGHTNESS",
            ImageSetting::Contrast => "CONTRAST",
            ImageSetting::Gamma => "GAMMA",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "BRIGHTNESS" => Some(ImageSetting::Brightness),
            "CONTRAST" => Some(ImageSetting::Contrast),
            "GAMMA" => Some(ImageSetting::Gamma),
            _ => None,
        }
    }
}

// ============================================================================
// Command
// ============================================================================

/// Closed vocabulary of logical commands understood by the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // ========================================================================
    // Drive
    // ========================================================================
    /// Drive forward.
    Forward,
    /// Drive backward.
    Reverse,
    /// Spin left.
    Left,
    /// Spin right.
    Right,
    /// Stop both motors.
    DriveStop,
    /// Set motor duty cycle limits, in percent.
    SetDuty {
        /// Left limit.
        left: u8,
        /// Right limit.
        right: u8,
    },

    // ========================================================================
    // Camera Gimbal
    // ========================================================================
    /// Tilt camera up.
    CamUp,
    /// Tilt camera down.
    CamDown,
    /// Pan camera left.
    CamLeft,
    /// Pan camera right.
    CamRight,
    /// Stop camera movement.
    CamStop,
    /// Return camera to its home position.
    CamRehome,
    /// Capture a still photo.
    CamTakePhoto,

    // ========================================================================
    // Imaging
    // ========================================================================
    /// Infrared illuminator on.
    IrOn,
    /// Infrared illuminator off.
    IrOff,
    /// Night vision profile on.
    NightModeOn,
    /// Night vision profile off.
    NightModeOff,
    /// Select camera processing mode 1, 2 or 3.
    CamMode(u8),
    /// Step an image setting up.
    Increase(ImageSetting),
    /// Step an image setting down.
    Decrease(ImageSetting),
    /// Set an image setting to an absolute value.
    Set(ImageSetting, i32),

    // ========================================================================
    // Session
    // ========================================================================
    /// Latency probe carrying a millisecond UNIX timestamp.
    Ping {
        /// Send time, echoed back in the PONG.
        timestamp: u64,
    },
}

// ============================================================================
// CommandMessage
// ============================================================================

/// Wire shape of an outbound command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMessage {
    /// Action name, including inline parameters.
    pub action: String,

    /// Probe timestamp (PING only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

// ============================================================================
// Command - Constructors
// ============================================================================

impl Command {
    /// Creates a `SET_DUTY` command, clamping both values to 0-100.
    #[must_use]
    pub fn set_duty(left: i64, right: i64) -> Self {
        let clamp = |value: i64| value.clamp(i64::from(MIN_DUTY), i64::from(MAX_DUTY)) as u8;
        Command::SetDuty {
            left: clamp(left),
            right: clamp(right),
        }
    }

    /// Creates a latency probe stamped with `timestamp` milliseconds.
    #[inline]
    #[must_use]
    pub const fn ping(timestamp: u64) -> Self {
        Command::Ping { timestamp }
    }

    /// Creates a camera mode command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] unless `mode` is 1, 2 or 3.
    pub fn cam_mode(mode: u8) -> Result<Self> {
        if (1..=3).contains(&mode) {
            Ok(Command::CamMode(mode))
        } else {
            Err(Error::invalid_argument(format!(
                "camera mode must be 1, 2 or 3, got {mode}"
            )))
        }
    }
}

// ============================================================================
// Command - Encoding
// ============================================================================

impl Command {
    /// Returns the action string sent on the wire.
    #[must_use]
    pub fn action(&self) -> Cow<'static, str> {
        let name = match *self {
            Command::Forward => "FORWARD",
            Command::Reverse => "REVERSE",
            Command::Left => "LEFT",
            Command::Right => "RIGHT",
            Command::DriveStop => "DRIVE_STOP",
            Command::CamUp => "CAM_UP",
            Command::CamDown => "CAM_DOWN",
            Command::CamLeft => "CAM_LEFT",
            Command::CamRight => "CAM_RIGHT",
            Command::CamStop => "CAM_STOP",
            Command::CamRehome => "CAM_REHOME",
            Command::CamTakePhoto => "CAM_TAKE_PHOTO",
            Command::IrOn => "IR_ON",
            Command::IrOff => "IR_OFF",
            Command::NightModeOn => "NIGHT_MODE_ON",
            Command::NightModeOff => "NIGHT_MODE_OFF",
            Command::Ping { .. } => "PING",
            Command::SetDuty { left, right } => {
                return Cow::Owned(format!("SET_DUTY {left} {right}"));
            }
            Command::CamMode(mode) => return Cow::Owned(format!("CAM_MODE_{mode}")),
            Command::Increase(setting) => {
                return Cow::Owned(format!("INCREASE_{}", setting.as_str()));
            }
            Command::Decrease(setting) => {
                return Cow::Owned(format!("DECREASE_{}", setting.as_str()));
            }
            Command::Set(setting, value) => {
                return Cow::Owned(format!("SET_{} {value}", setting.as_str()));
            }
        };
        Cow::Borrowed(name)
    }

    /// Returns the wire message for this command.
    #[must_use]
    pub fn to_message(&self) -> CommandMessage {
        CommandMessage {
            action: self.action().into_owned(),
            timestamp: match *self {
                Command::Ping { timestamp } => Some(timestamp),
                _ => None,
            },
        }
    }

    /// Encodes the command as JSON text. Never fails.
    #[must_use]
    pub fn encode(&self) -> String {
        json!(self.to_message()).to_string()
    }

    /// Encodes the command as a text frame.
    #[inline]
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        Frame::Text(self.encode())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.action())
    }
}

// ============================================================================
// Command - Parsing
// ============================================================================

impl FromStr for Command {
    type Err = Error;

    /// Parses an action string such as `forward` or `SET_DUTY 20 80`.
    ///
    /// Names are case-insensitive. `BACKWARD` and `STOP` are accepted as
    /// aliases for `REVERSE` and `DRIVE_STOP`.
    fn from_str(input: &str) -> Result<Self> {
        let upper = input.trim().to_ascii_uppercase();
        let mut parts = upper.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| Error::invalid_argument("empty command"))?;
        let args: Vec<&str> = parts.collect();

        let expect_args = |count: usize| -> Result<()> {
            if args.len() == count {
                Ok(())
            } else {
                Err(Error::invalid_argument(format!(
                    "{name} takes {count} argument(s), got {}",
                    args.len()
                )))
            }
        };

        let command = match name {
            "FORWARD" => Command::Forward,
            "REVERSE" | "BACKWARD" => Command::Reverse,
            "LEFT" => Command::Left,
            "RIGHT" => Command::Right,
            "DRIVE_STOP" | "STOP" => Command::DriveStop,
            "CAM_UP" => Command::CamUp,
            "CAM_DOWN" => Command::CamDown,
            "CAM_LEFT" => Command::CamLeft,
            "CAM_RIGHT" => Command::CamRight,
            "CAM_STOP" => Command::CamStop,
            "CAM_REHOME" => Command::CamRehome,
            "CAM_TAKE_PHOTO" => Command::CamTakePhoto,
            "IR_ON" => Command::IrOn,
            "IR_OFF" => Command::IrOff,
            "NIGHT_MODE_ON" => Command::NightModeOn,
            "NIGHT_MODE_OFF" => Command::NightModeOff,
            "SET_DUTY" => {
                expect_args(2)?;
                Command::SetDuty {
                    left: parse_duty(args[0])?,
                    right: parse_duty(args[1])?,
                }
            }
            "PING" => {
                expect_args(1)?;
                let timestamp = args[0].parse().map_err(|_| {
                    Error::invalid_argument(format!("invalid timestamp: {}", args[0]))
                })?;
                Command::Ping { timestamp }
            }
            other => parse_parameterized(other, &args)?,
        };

        if !matches!(
            command,
            Command::SetDuty { .. } | Command::Ping { .. } | Command::Set(..)
        ) {
            expect_args(0)?;
        }

        Ok(command)
    }
}

/// Parses the `CAM_MODE_n`, `INCREASE_x`, `DECREASE_x` and `SET_x n` families.
fn parse_parameterized(name: &str, args: &[&str]) -> Result<Command> {
    let unknown = || Error::invalid_argument(format!("unknown command: {name}"));

    if let Some(mode) = name.strip_prefix("CAM_MODE_") {
        let mode = mode.parse::<u8>().map_err(|_| unknown())?;
        return Command::cam_mode(mode);
    }
    if let Some(setting) = name.strip_prefix("INCREASE_").and_then(ImageSetting::parse) {
        return Ok(Command::Increase(setting));
    }
    if let Some(setting) = name.strip_prefix("DECREASE_").and_then(ImageSetting::parse) {
        return Ok(Command::Decrease(setting));
    }
    if let Some(setting) = name.strip_prefix("SET_").and_then(ImageSetting::parse) {
        let [value] = args else {
            return Err(Error::invalid_argument(format!(
                "{name} takes 1 argument(s), got {}",
                args.len()
            )));
        };
        let value = value
            .parse::<i32>()
            .map_err(|_| Error::invalid_argument(format!("invalid value: {value}")))?;
        return Ok(Command::Set(setting, value));
    }

    Err(unknown())
}

/// Parses a duty cycle percentage in 0-100.
fn parse_duty(raw: &str) -> Result<u8> {
    match raw.parse::<u8>() {
        Ok(value) if value <= MAX_DUTY => Ok(value),
        _ => Err(Error::invalid_argument(format!(
            "duty cycle must be an integer in {MIN_DUTY}-{MAX_DUTY}, got {raw}"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::Value;

    #[test]
    fn test_forward_wire_frame() {
        assert_eq!(Command::Forward.encode(), r#"{"action":"FORWARD"}"#);
    }

    #[test]
    fn test_ping_carries_timestamp() {
        let encoded = Command::ping(1_700_000_000_123).encode();
        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["action"], "PING");
        assert_eq!(value["timestamp"], 1_700_000_000_123u64);
    }

    #[test]
    fn test_set_duty_inline_parameters() {
        let command = Command::set_duty(20, 80);
        assert_eq!(command.action(), "SET_DUTY 20 80");
        assert_eq!(command.encode(), r#"{"action":"SET_DUTY 20 80"}"#);
    }

    #[test]
    fn test_set_duty_clamps() {
        assert_eq!(
            Command::set_duty(-5, 250),
            Command::SetDuty { left: 0, right: 100 }
        );
    }

    #[test]
    fn test_image_setting_actions() {
        assert_eq!(
            Command::Increase(ImageSetting::Gamma).action(),
            "INCREASE_GAMMA"
        );
        assert_eq!(
            Command::Decrease(ImageSetting::Contrast).action(),
            "DECREASE_CONTRAST"
        );
        assert_eq!(
            Command::Set(ImageSetting::Brightness, 40).action(),
            "SET_BRIGHTNESS 40"
        );
    }

    #[test]
    fn test_to_message() {
        let message = Command::CamMode(2).to_message();
        assert_eq!(message.action, "CAM_MODE_2");
        assert_eq!(message.timestamp, None);
        assert_eq!(Command::ping(7).to_message().timestamp, Some(7));
    }

    #[test]
    fn test_encode_is_the_wire_message() {
        for command in [Command::ping(42), Command::set_duty(10, 90), Command::CamStop] {
            let decoded: CommandMessage = serde_json::from_str(&command.encode()).unwrap();
            assert_eq!(decoded, command.to_message());
        }
        assert_eq!(
            Command::ping(42).encode(),
            r#"{"action":"PING","timestamp":42}"#
        );
    }

    #[test]
    fn test_parse_case_insensitive_and_aliases() {
        assert_eq!("forward".parse::<Command>().unwrap(), Command::Forward);
        assert_eq!("backward".parse::<Command>().unwrap(), Command::Reverse);
        assert_eq!(" stop ".parse::<Command>().unwrap(), Command::DriveStop);
        assert_eq!(
            "cam_mode_3".parse::<Command>().unwrap(),
            Command::CamMode(3)
        );
    }

    #[test]
    fn test_parse_set_duty() {
        assert_eq!(
            "SET_DUTY 20 80".parse::<Command>().unwrap(),
            Command::SetDuty { left: 20, right: 80 }
        );
        assert!("SET_DUTY 20".parse::<Command>().is_err());
        assert!("SET_DUTY 20 101".parse::<Command>().is_err());
        assert!("SET_DUTY -1 50".parse::<Command>().is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_and_extra_args() {
        assert!(matches!(
            "JUMP".parse::<Command>(),
            Err(Error::InvalidArgument { .. })
        ));
        assert!("FORWARD 3".parse::<Command>().is_err());
        assert!("CAM_MODE_4".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }

    #[test]
    fn test_parse_set_image_setting() {
        assert_eq!(
            "SET_GAMMA 12".parse::<Command>().unwrap(),
            Command::Set(ImageSetting::Gamma, 12)
        );
        assert!("SET_GAMMA".parse::<Command>().is_err());
    }

    proptest! {
        #[test]
        fn prop_encoding_is_valid_json_with_action(left in any::<i64>(), right in any::<i64>()) {
            let command = Command::set_duty(left, right);
            let value: Value = serde_json::from_str(&command.encode()).unwrap();
            let action = command.action();
            prop_assert_eq!(value["action"].as_str().unwrap(), action.as_ref());
        }

        #[test]
        fn prop_action_parses_back(left in 0u8..=100, right in 0u8..=100) {
            let command = Command::SetDuty { left, right };
            prop_assert_eq!(command.action().parse::<Command>().unwrap(), command);
        }
    }
}
