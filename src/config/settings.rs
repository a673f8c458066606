//! Dashboard settings.
//!
//! Holds the robot's address, the three channel ports and the timer
//! intervals. Serialized with the key names the dashboard has always
//! persisted, so a saved `robotConfig` object loads unchanged:
//!
//! ```json
//! {
//!   "RPI_IP": "192.168.20.9",
//!   "CMD_PORT": 9000,
//!   "RAW_VIDEO_PORT": 9001,
//!   "VIDEO_PORT": 9002,
//!   "CONNECT_ON_PAGE_LOAD": false,
//!   "FPS_UPDATE_INTERVAL": 2
//! }
//! ```
//!
//! Missing keys take their defaults; unknown keys are ignored.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ChannelKind;

use super::reconnect::ReconnectConfig;

// ============================================================================
// Constants
// ============================================================================

/// Default robot address on the LAN.
pub const DEFAULT_HOST: &str = "192.168.20.9";

/// Default command channel port.
pub const DEFAULT_CMD_PORT: u16 = 9000;

/// Default raw video port.
pub const DEFAULT_RAW_VIDEO_PORT: u16 = 9001;

/// Default processed video port.
pub const DEFAULT_PROCESSED_VIDEO_PORT: u16 = 9002;

/// Default frame-rate reporting interval.
pub const DEFAULT_FPS_UPDATE_INTERVAL: Duration = Duration::from_secs(2);

/// Default latency probe interval.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(5);

// ============================================================================
// DashboardConfig
// ============================================================================

/// Persisted dashboard settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Robot hostname or IP address.
    #[serde(rename = "RPI_IP")]
    pub host: String,

    /// Command channel port.
    #[serde(rename = "CMD_PORT")]
    pub cmd_port: u16,

    /// Raw video channel port.
    #[serde(rename = "RAW_VIDEO_PORT")]
    pub raw_video_port: u16,

    /// Processed video channel port.
    #[serde(rename = "VIDEO_PORT")]
    pub processed_video_port: u16,

    /// Connect command and raw video as soon as the session starts.
    #[serde(rename = "CONNECT_ON_PAGE_LOAD")]
    pub connect_on_load: bool,

    /// How often the frame-rate meters report.
    #[serde(rename = "FPS_UPDATE_INTERVAL", with = "secs")]
    pub fps_update_interval: Duration,

    /// How often a latency probe is sent on the command channel.
    #[serde(rename = "PING_INTERVAL", with = "secs")]
    pub ping_interval: Duration,

    /// Automatic reconnection policy.
    #[serde(rename = "RECONNECT")]
    pub reconnect: ReconnectConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            cmd_port: DEFAULT_CMD_PORT,
            raw_video_port: DEFAULT_RAW_VIDEO_PORT,
            processed_video_port: DEFAULT_PROCESSED_VIDEO_PORT,
            connect_on_load: false,
            fps_update_interval: DEFAULT_FPS_UPDATE_INTERVAL,
            ping_interval: DEFAULT_PING_INTERVAL,
            reconnect: ReconnectConfig::default(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl DashboardConfig {
    /// Creates settings with defaults.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the robot host.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets all three channel ports.
    #[inline]
    #[must_use]
    pub fn with_ports(mut self, cmd: u16, raw_video: u16, processed_video: u16) -> Self {
        self.cmd_port = cmd;
        self.raw_video_port = raw_video;
        self.processed_video_port = processed_video;
        self
    }

    /// Enables connecting on session start.
    #[inline]
    #[must_use]
    pub fn with_connect_on_load(mut self, enabled: bool) -> Self {
        self.connect_on_load = enabled;
        self
    }

    /// Sets the latency probe interval.
    #[inline]
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets the frame-rate reporting interval.
    #[inline]
    #[must_use]
    pub fn with_fps_update_interval(mut self, interval: Duration) -> Self {
        self.fps_update_interval = interval;
        self
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl DashboardConfig {
    /// Returns the port for a channel.
    #[inline]
    #[must_use]
    pub fn port(&self, kind: ChannelKind) -> u16 {
        match kind {
            ChannelKind::Command => self.cmd_port,
            ChannelKind::RawVideo => self.raw_video_port,
            ChannelKind::ProcessedVideo => self.processed_video_port,
        }
    }

    /// Returns the WebSocket endpoint for a channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the host does not form a valid URL.
    pub fn endpoint(&self, kind: ChannelKind) -> Result<Url> {
        let raw = format!("ws://{}:{}", self.host.trim(), self.port(kind));
        Url::parse(&raw).map_err(|e| Error::config(format!("invalid endpoint {raw}: {e}")))
    }

    /// Checks settings for values the link cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("robot host is empty"));
        }
        for kind in ChannelKind::ALL {
            if self.port(kind) == 0 {
                return Err(Error::config(format!("port for {kind} is 0")));
            }
            self.endpoint(kind)?;
        }
        if self.ping_interval.is_zero() {
            return Err(Error::config("ping interval must be positive"));
        }
        if self.fps_update_interval.is_zero() {
            return Err(Error::config("FPS update interval must be positive"));
        }
        if self.reconnect.enabled && self.reconnect.interval.is_zero() {
            return Err(Error::config("reconnect interval must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// Duration (de)serialization
// ============================================================================

/// Serializes a [`Duration`] as a number of seconds.
pub(crate) mod secs {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let secs = duration.as_secs_f64();
        if secs.fract() == 0.0 {
            serializer.serialize_u64(duration.as_secs())
        } else {
            serializer.serialize_f64(secs)
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

// ============================================================================
// Tests
// ============================================================================
