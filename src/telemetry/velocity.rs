//! Wheel velocity smoothing with spike rejection.
//!
//! Raw `velocity_update` values are wheel angular velocities. They are scaled
//! to linear speed, checked against a physical acceleration limit and
//! smoothed with an exponential moving average for display.
//!
//! A sample whose implied acceleration exceeds the limit is a sensor or
//! transport artifact: it is discarded and leaves the smoothed value, the
//! reference sample and the max-acceleration readout untouched.

// ============================================================================
// Imports
// ============================================================================

use std::time::Instant;

use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::VelocityReport;

// ============================================================================
// Constants
// ============================================================================

/// Raw value to m/s: the wheel radius in metres.
pub const VELOCITY_SCALE: f64 = 0.065;

/// Largest believable wheel acceleration, in m/s².
pub const MAX_PLAUSIBLE_ACCELERATION: f64 = 5.0;

/// Weight of the newest sample in the moving average.
pub const SMOOTHING_FACTOR: f64 = 0.3;

// ============================================================================
// VelocitySample
// ============================================================================

/// An accepted velocity update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocitySample {
    /// Scaled left wheel speed, m/s.
    pub left: f64,
    /// Scaled right wheel speed, m/s.
    pub right: f64,
    /// Smoothed left wheel speed, m/s.
    pub smoothed_left: f64,
    /// Smoothed right wheel speed, m/s.
    pub smoothed_right: f64,
    /// Acceleration implied by this sample, m/s².
    pub acceleration: f64,
    /// Largest accepted acceleration so far, m/s².
    pub max_acceleration: f64,
}

// ============================================================================
// VelocityTracker
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Reference {
    left: f64,
    right: f64,
    at: Instant,
}

/// Smooths wheel velocity updates and tracks peak acceleration.
#[derive(Debug, Clone)]
pub struct VelocityTracker {
    scale: f64,
    max_plausible: f64,
    alpha: f64,
    last: Option<Reference>,
    smoothed: (f64, f64),
    max_acceleration: f64,
}

impl Default for VelocityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl VelocityTracker {
    /// Creates a tracker with the robot's wheel radius and limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(VELOCITY_SCALE, MAX_PLAUSIBLE_ACCELERATION, SMOOTHING_FACTOR)
    }

    /// Creates a tracker with custom scale, acceleration limit and smoothing.
    ///
    /// `alpha` is clamped to `(0, 1]`.
    #[must_use]
    pub fn with_limits(scale: f64, max_plausible: f64, alpha: f64) -> Self {
        Self {
            scale,
            max_plausible,
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            last: None,
            smoothed: (0.0, 0.0),
            max_acceleration: 0.0,
        }
    }

    /// Feeds one raw update received at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnrealisticTelemetry`] if the implied acceleration
    /// exceeds the limit. The tracker is unchanged in that case.
    pub fn update(&mut self, report: VelocityReport, at: Instant) -> Result<VelocitySample> {
        let left = report.left * self.scale;
        let right = report.right * self.scale;

        let acceleration = match self.last {
            None => 0.0,
            Some(last) => {
                let dv = (left - last.left).abs().max((right - last.right).abs());
                let dt = at.saturating_duration_since(last.at).as_secs_f64();
                if dv == 0.0 {
                    0.0
                } else if dt > 0.0 {
                    dv / dt
                } else {
                    f64::INFINITY
                }
            }
        };

        if acceleration.is_nan() || acceleration > self.max_plausible {
            debug!(acceleration, left, right, "Discarding velocity spike");
            return Err(Error::unrealistic_telemetry(acceleration));
        }

        self.smoothed = match self.last {
            None => (left, right),
            Some(_) => (
                self.alpha * left + (1.0 - self.alpha) * self.smoothed.0,
                self.alpha * right + (1.0 - self.alpha) * self.smoothed.1,
            ),
        };
        self.last = Some(Reference { left, right, at });
        self.max_acceleration = self.max_acceleration.max(acceleration);

        Ok(VelocitySample {
            left,
            right,
            smoothed_left: self.smoothed.0,
            smoothed_right: self.smoothed.1,
            acceleration,
            max_acceleration: self.max_acceleration,
        })
    }

    /// Largest accepted acceleration so far, m/s².
    #[inline]
    #[must_use]
    pub fn max_acceleration(&self) -> f64 {
        self.max_acceleration
    }

    /// Current smoothed `(left, right)` speed, m/s.
    #[inline]
    #[must_use]
    pub fn smoothed(&self) -> (f64, f64) {
        self.smoothed
    }

    /// Forgets all history.
    pub fn reset(&mut self) {
        self.last = None;
        self.smoothed = (0.0, 0.0);
        self.max_acceleration = 0.0;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    fn report(left: f64, right: f64) -> VelocityReport {
        VelocityReport { left, right }
    }

    #[test]
    fn test_first_sample_sets_baseline() {
        let mut tracker = VelocityTracker::new();
        let sample = tracker.update(report(10.0, 10.0), Instant::now()).unwrap();

        assert!((sample.left - 0.65).abs() < 1e-9);
        assert_eq!(sample.smoothed_left, sample.left);
        assert_eq!(sample.acceleration, 0.0);
        assert_eq!(tracker.max_acceleration(), 0.0);
    }

    #[test]
    fn test_smoothing_and_max_acceleration() {
        let mut tracker = VelocityTracker::with_limits(1.0, 5.0, 0.5);
        let t0 = Instant::now();

        tracker.update(report(0.0, 0.0), t0).unwrap();
        let sample = tracker
            .update(report(1.0, 0.5), t0 + Duration::from_millis(500))
            .unwrap();

        assert!((sample.acceleration - 2.0).abs() < 1e-9);
        assert!((sample.smoothed_left - 0.5).abs() < 1e-9);
        assert!((sample.smoothed_right - 0.25).abs() < 1e-9);
        assert!((tracker.max_acceleration() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_spike_does_not_change_state() {
        let mut tracker = VelocityTracker::with_limits(1.0, 5.0, 0.5);
        let t0 = Instant::now();

        tracker.update(report(0.0, 0.0), t0).unwrap();
        tracker
            .update(report(1.0, 1.0), t0 + Duration::from_secs(1))
            .unwrap();
        let max_before = tracker.max_acceleration();
        let smoothed_before = tracker.smoothed();

        // 9 m/s change in 100 ms is 90 m/s²
        let err = tracker
            .update(report(10.0, 1.0), t0 + Duration::from_millis(1100))
            .unwrap_err();
        assert!(matches!(err, Error::UnrealisticTelemetry { .. }));
        assert_eq!(tracker.max_acceleration(), max_before);
        assert_eq!(tracker.smoothed(), smoothed_before);

        // Next plausible sample is measured against the pre-spike reference
        let sample = tracker
            .update(report(2.0, 1.0), t0 + Duration::from_secs(2))
            .unwrap();
        assert!((sample.acceleration - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_change_without_elapsed_time_is_a_spike() {
        let mut tracker = VelocityTracker::new();
        let t0 = Instant::now();
        tracker.update(report(1.0, 1.0), t0).unwrap();

        assert!(tracker.update(report(1.0, 1.0), t0).is_ok());
        assert!(tracker.update(report(2.0, 1.0), t0).is_err());
    }

    #[test]
    fn test_reset() {
        let mut tracker = VelocityTracker::with_limits(1.0, 5.0, 1.0);
        let t0 = Instant::now();
        tracker.update(report(0.0, 0.0), t0).unwrap();
        tracker
            .update(report(1.0, 1.0), t0 + Duration::from_secs(1))
            .unwrap();

        tracker.reset();
        assert_eq!(tracker.max_acceleration(), 0.0);
        assert_eq!(tracker.smoothed(), (0.0, 0.0));
    }
}
