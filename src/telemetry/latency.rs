//! Round-trip latency probing.
//!
//! While the command channel is connected a [`LatencyProbe`] sends
//! `{"action":"PING","timestamp":T}` every interval. The robot answers with
//! `{"action":"PONG","timestamp":T}` and the latency is the receive time minus
//! `T`, both in milliseconds since the Unix epoch.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::protocol::Command;
use crate::transport::Connection;

// ============================================================================
// Clock
// ============================================================================

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Latency of a pong carrying `sent_ms`, received at `received_ms`.
///
/// Clock skew that would make the result negative yields zero.
#[inline]
#[must_use]
pub fn round_trip(sent_ms: u64, received_ms: u64) -> Duration {
    Duration::from_millis(received_ms.saturating_sub(sent_ms))
}

// ============================================================================
// LatencyProbe
// ============================================================================

/// Periodic PING sender for the command channel.
#[derive(Debug)]
pub struct LatencyProbe {
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LatencyProbe {
    /// Creates a stopped probe.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: Mutex::new(None),
        }
    }

    /// Probe interval.
    #[inline]
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts probing `connection`, replacing any running timer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, connection: Connection) {
        let handle = tokio::spawn(run(connection, self.interval));
        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
        debug!(interval_ms = self.interval.as_millis() as u64, "Latency probe started");
    }

    /// Stops the timer. Returns `true` if one was running.
    pub fn stop(&self) -> bool {
        match self.task.lock().take() {
            Some(handle) => {
                let running = !handle.is_finished();
                handle.abort();
                if running {
                    debug!("Latency probe stopped");
                }
                running
            }
            None => false,
        }
    }

    /// Returns `true` while the timer task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for LatencyProbe {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

async fn run(connection: Connection, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        if !connection.is_connected() {
            break;
        }

        let ping = Command::ping(epoch_millis());
        if connection.send(ping.to_frame()).is_err() {
            break;
        }
        trace!(channel = connection.label(), "Latency probe sent");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use url::Url;

    use crate::protocol::Frame;
    use crate::transport::{ConnectionConfig, MemoryConnector};

    #[test]
    fn test_round_trip() {
        assert_eq!(round_trip(1_000, 1_042), Duration::from_millis(42));
        assert_eq!(round_trip(1_042, 1_000), Duration::ZERO);
    }

    #[test]
    fn test_epoch_millis_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(epoch_millis() > 1_577_836_800_000);
    }

    #[tokio::test]
    async fn test_probe_sends_pings_and_stops() {
        let endpoint = Url::parse("ws://robot.local:9000").unwrap();
        let connector = Arc::new(MemoryConnector::new());
        let connection = Connection::new(
            ConnectionConfig::new(endpoint.clone(), "cmd", |_: Frame| {}),
            connector.clone(),
        );
        connection.connect().await.unwrap();
        let mut remote = connector.take_remote(&endpoint).unwrap();

        let probe = LatencyProbe::new(Duration::from_millis(10));
        probe.start(connection.clone());
        assert!(probe.is_running());

        let Some(Frame::Text(text)) = remote.next_sent().await else {
            panic!("expected a text frame");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["action"], "PING");
        assert!(value["timestamp"].as_u64().is_some());

        assert!(probe.stop());
        assert!(!probe.is_running());
        assert!(!probe.stop());
    }

    #[tokio::test]
    async fn test_probe_ends_when_connection_closes() {
        let endpoint = Url::parse("ws://robot.local:9000").unwrap();
        let connector = Arc::new(MemoryConnector::new());
        let connection = Connection::new(
            ConnectionConfig::new(endpoint, "cmd", |_: Frame| {}),
            connector,
        );
        connection.connect().await.unwrap();

        let probe = LatencyProbe::new(Duration::from_millis(5));
        probe.start(connection.clone());
        connection.close();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!probe.is_running());
    }
}
