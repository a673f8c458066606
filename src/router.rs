//! Inbound message routing.
//!
//! The [`Router`] sits between the connections and the UI. Command-channel
//! text frames are classified into [`InboundMessage`]s and dispatched to a
//! [`TelemetrySink`]; video-channel binary frames are forwarded and counted.
//!
//! ```text
//! Connection ──► Router ──► classify ──► TelemetrySink
//!                  │                         ▲
//!                  └── VelocityTracker ──────┤
//!                  └── FrameRateMeter ───────┘
//! ```
//!
//! Malformed frames are dropped with a warning. Velocity spikes are dropped
//! with a debug event only.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ChannelKind;
use crate::protocol::{Frame, HealthFlags, InboundMessage, TelemetryRecord};
use crate::telemetry::{FrameRateMeter, VelocitySample, VelocityTracker, epoch_millis, round_trip};

// ============================================================================
// TelemetrySink
// ============================================================================

/// Receives everything the router extracts from inbound frames.
///
/// Every method defaults to a no-op so a sink only implements what it shows.
/// Methods run on the connection's event-loop task and should not block.
pub trait TelemetrySink: Send + Sync {
    /// Round-trip latency measured from a PONG.
    fn on_latency(&self, _latency: Duration) {}

    /// Command acknowledgement with motor telemetry.
    fn on_telemetry(&self, _record: &TelemetryRecord) {}

    /// Error reported by the robot.
    fn on_remote_error(&self, _message: &str) {}

    /// Hardware health flags.
    fn on_health(&self, _flags: &HealthFlags) {}

    /// The robot could not read its health status.
    fn on_health_unavailable(&self, _reason: &str) {}

    /// Accepted, smoothed wheel velocity.
    fn on_velocity(&self, _sample: &VelocitySample) {}

    /// One video frame.
    fn on_video_frame(&self, _kind: ChannelKind, _frame: &[u8]) {}

    /// Periodic frames-per-second figure for a video channel.
    fn on_frame_rate(&self, _kind: ChannelKind, _fps: f64) {}
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {}

// ============================================================================
// Arrival
// ============================================================================

/// When a frame arrived, on both clocks the router needs.
#[derive(Debug, Clone, Copy)]
pub struct Arrival {
    /// Wall clock, epoch milliseconds. Compared with PING timestamps.
    pub wall_ms: u64,
    /// Monotonic clock. Used for rates and accelerations.
    pub at: Instant,
}

impl Arrival {
    /// Arrival stamped with the current time.
    #[must_use]
    pub fn now() -> Self {
        Self {
            wall_ms: epoch_millis(),
            at: Instant::now(),
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Classifies inbound frames and feeds a [`TelemetrySink`].
pub struct Router {
    sink: Arc<dyn TelemetrySink>,
    velocity: Mutex<VelocityTracker>,
    meters: Mutex<FxHashMap<ChannelKind, FrameRateMeter>>,
    fps_interval: Duration,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("velocity", &*self.velocity.lock())
            .field("fps_interval", &self.fps_interval)
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Creates a router whose frame-rate meters report every `fps_interval`.
    #[must_use]
    pub fn new(sink: Arc<dyn TelemetrySink>, fps_interval: Duration) -> Self {
        Self::with_tracker(sink, fps_interval, VelocityTracker::new())
    }

    /// Creates a router with a custom velocity tracker.
    #[must_use]
    pub fn with_tracker(
        sink: Arc<dyn TelemetrySink>,
        fps_interval: Duration,
        tracker: VelocityTracker,
    ) -> Self {
        Self {
            sink,
            velocity: Mutex::new(tracker),
            meters: Mutex::new(FxHashMap::default()),
            fps_interval,
        }
    }

    /// Largest accepted wheel acceleration so far, m/s².
    #[must_use]
    pub fn max_acceleration(&self) -> f64 {
        self.velocity.lock().max_acceleration()
    }

    // ========================================================================
    // Command Channel
    // ========================================================================

    /// Routes a command-channel frame received now.
    ///
    /// # Errors
    ///
    /// See [`Router::route_command_at`].
    pub fn route_command(&self, frame: Frame) -> Result<()> {
        self.route_command_at(frame, Arrival::now())
    }

    /// Routes a command-channel frame received at `arrival`.
    ///
    /// The outcome is also logged, so callers on the event loop may ignore it.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedMessage`] for binary frames, invalid JSON or
    ///   unknown shapes.
    /// - [`Error::UnrealisticTelemetry`] for a rejected velocity spike.
    pub fn route_command_at(&self, frame: Frame, arrival: Arrival) -> Result<()> {
        let result = self.dispatch_command(frame, arrival);

        match &result {
            Err(e @ Error::UnrealisticTelemetry { .. }) => {
                debug!(channel = "cmd", error = %e, "Dropped telemetry sample");
            }
            Err(e) => {
                warn!(channel = "cmd", error = %e, "Dropped inbound frame");
            }
            Ok(()) => {}
        }

        result
    }

    fn dispatch_command(&self, frame: Frame, arrival: Arrival) -> Result<()> {
        let Frame::Text(text) = frame else {
            return Err(Error::malformed("binary frame on command channel"));
        };

        match InboundMessage::parse(&text)? {
            InboundMessage::Pong { timestamp } => {
                let latency = round_trip(timestamp, arrival.wall_ms);
                trace!(latency_ms = latency.as_millis() as u64, "PONG");
                self.sink.on_latency(latency);
            }
            InboundMessage::Telemetry(record) => {
                debug!(command = ?record.command, "Telemetry");
                self.sink.on_telemetry(&record);
            }
            InboundMessage::RemoteError { message } => {
                warn!(channel = "cmd", %message, "Robot reported an error");
                self.sink.on_remote_error(&message);
            }
            InboundMessage::Health(flags) => {
                if flags.any_now() {
                    warn!(
                        under_voltage = flags.under_voltage.now,
                        freq_capped = flags.freq_capped.now,
                        throttled = flags.throttled.now,
                        "Robot hardware degraded"
                    );
                }
                self.sink.on_health(&flags);
            }
            InboundMessage::HealthUnavailable { reason } => {
                warn!(%reason, "Robot health unavailable");
                self.sink.on_health_unavailable(&reason);
            }
            InboundMessage::Velocity(report) => {
                let sample = self.velocity.lock().update(report, arrival.at)?;
                self.sink.on_velocity(&sample);
            }
        }

        Ok(())
    }

    // ========================================================================
    // Video Channels
    // ========================================================================

    /// Routes a video-channel frame received now.
    pub fn route_video(&self, kind: ChannelKind, frame: Frame) {
        self.route_video_at(kind, frame, Instant::now());
    }

    /// Routes a video-channel frame received at `at`.
    ///
    /// Text frames are logged and ignored.
    pub fn route_video_at(&self, kind: ChannelKind, frame: Frame, at: Instant) {
        let bytes = match frame {
            Frame::Binary(bytes) => bytes,
            Frame::Text(text) => {
                warn!(channel = %kind, len = text.len(), "Ignoring text frame on video channel");
                return;
            }
        };

        self.sink.on_video_frame(kind, &bytes);

        let rate = self
            .meters
            .lock()
            .entry(kind)
            .or_insert_with(|| FrameRateMeter::new(self.fps_interval))
            .record(at);

        if let Some(fps) = rate {
            debug!(channel = %kind, fps, "Frame rate");
            self.sink.on_frame_rate(kind, fps);
        }
    }

    /// Forgets the frame-rate window of a video channel.
    pub fn reset_video(&self, kind: ChannelKind) {
        if let Some(meter) = self.meters.lock().get_mut(&kind) {
            meter.reset();
        }
    }

    /// Last reported frame rate of a video channel.
    #[must_use]
    pub fn frame_rate(&self, kind: ChannelKind) -> Option<f64> {
        self.meters.lock().get(&kind).and_then(FrameRateMeter::last_rate)
    }
}

// ============================================================================
// Tests
// ============================================================================
