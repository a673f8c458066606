//! Telemetry processing.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame_rate` | Video frames-per-second meter |
//! | `latency` | PING timer and round-trip computation |
//! | `velocity` | Wheel velocity smoothing and spike rejection |

// ============================================================================
// Submodules
// ============================================================================

pub mod frame_rate;
pub mod latency;
pub mod velocity;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame_rate::FrameRateMeter;
pub use latency::{LatencyProbe, epoch_millis, round_trip};
pub use velocity::{
    MAX_PLAUSIBLE_ACCELERATION, SMOOTHING_FACTOR, VELOCITY_SCALE, VelocitySample, VelocityTracker,
};
