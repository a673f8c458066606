//! Video frame-rate meter.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

// ============================================================================
// FrameRateMeter
// ============================================================================

/// Counts frames and reports the rate once per interval.
///
/// The frame that opens a window is not counted, so `n` evenly spaced frames
/// after it over `t` seconds report `n / t`.
#[derive(Debug, Clone)]
pub struct FrameRateMeter {
    interval: Duration,
    window_start: Option<Instant>,
    frames: u32,
    last_rate: Option<f64>,
}

impl FrameRateMeter {
    /// Creates a meter that reports every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_start: None,
            frames: 0,
            last_rate: None,
        }
    }

    /// Records a frame received at `at`.
    ///
    /// Returns the frames-per-second figure when a window completes.
    pub fn record(&mut self, at: Instant) -> Option<f64> {
        let Some(start) = self.window_start else {
            self.window_start = Some(at);
            return None;
        };

        self.frames += 1;
        let elapsed = at.saturating_duration_since(start);
        if elapsed < self.interval || elapsed.is_zero() {
            return None;
        }

        let fps = f64::from(self.frames) / elapsed.as_secs_f64();
        self.frames = 0;
        self.window_start = Some(at);
        self.last_rate = Some(fps);
        Some(fps)
    }

    /// Last reported rate.
    #[inline]
    #[must_use]
    pub fn last_rate(&self) -> Option<f64> {
        self.last_rate
    }

    /// Starts over, e.g. after the feed was switched.
    pub fn reset(&mut self) {
        self.window_start = None;
        self.frames = 0;
        self.last_rate = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_once_per_interval() {
        let mut meter = FrameRateMeter::new(Duration::from_secs(2));
        let t0 = Instant::now();

        assert_eq!(meter.record(t0), None);
        let mut reports = Vec::new();
        for i in 1..=60 {
            if let Some(fps) = meter.record(t0 + Duration::from_millis(i * 1000 / 30)) {
                reports.push(fps);
            }
        }

        assert_eq!(reports.len(), 1);
        assert!((reports[0] - 30.0).abs() < 0.01);
        assert_eq!(meter.last_rate(), Some(reports[0]));
    }

    #[test]
    fn test_reset() {
        let mut meter = FrameRateMeter::new(Duration::from_millis(10));
        let t0 = Instant::now();
        meter.record(t0);
        meter.record(t0 + Duration::from_millis(20));
        assert!(meter.last_rate().is_some());

        meter.reset();
        assert_eq!(meter.last_rate(), None);
        assert_eq!(meter.record(t0 + Duration::from_millis(30)), None);
    }
}
