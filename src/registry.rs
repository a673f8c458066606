//! Connection registry.
//!
//! Owns the three channels of a dashboard session and the latency probe of
//! the command channel. The registry is built once per session from
//! [`DashboardConfig`] and handed to whatever drives the UI.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │            ConnectionRegistry             │
//! │  ┌─────────────────────────────────────┐  │
//! │  │ Command        → Connection :9000   │──┼──► LatencyProbe
//! │  │ RawVideo       → Connection :9001   │  │
//! │  │ ProcessedVideo → Connection :9002   │  │
//! │  └─────────────────────────────────────┘  │
//! │                   │ on_message            │
//! │                   ▼                       │
//! │                Router ──► TelemetrySink   │
//! └───────────────────────────────────────────┘
//! ```
//!
//! Only one video feed is meant to be open at a time. See
//! [`VideoFeedState::plan`] for how [`ConnectionRegistry::switch_video_feed`]
//! moves between them.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::config::DashboardConfig;
use crate::error::Result;
use crate::identifiers::{ChannelKind, ListenerId};
use crate::protocol::Command;
use crate::router::{Router, TelemetrySink};
use crate::telemetry::LatencyProbe;
use crate::transport::{Connection, ConnectionConfig, ConnectionStatus, Connector, StatusEvent};

// ============================================================================
// VideoFeedState
// ============================================================================

/// Which video feed is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoFeedState {
    /// Raw camera feed open, processed closed.
    RawActive,
    /// Processed feed open, raw closed.
    ProcessedActive,
    /// Both closed.
    NoneActive,
}

/// Steps that switch the video feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedPlan {
    /// Channels to close, in order.
    pub close: &'static [ChannelKind],
    /// Channel to open afterwards.
    pub open: ChannelKind,
}

impl FeedPlan {
    /// Feed state once the plan has been carried out.
    #[must_use]
    pub const fn outcome(&self) -> VideoFeedState {
        match self.open {
            ChannelKind::ProcessedVideo => VideoFeedState::ProcessedActive,
            _ => VideoFeedState::RawActive,
        }
    }
}

impl VideoFeedState {
    /// Derives the state from the open flags of the two feeds.
    ///
    /// Both open is not a valid state; raw wins.
    #[must_use]
    pub const fn from_flags(raw_open: bool, processed_open: bool) -> Self {
        match (raw_open, processed_open) {
            (true, _) => VideoFeedState::RawActive,
            (false, true) => VideoFeedState::ProcessedActive,
            (false, false) => VideoFeedState::NoneActive,
        }
    }

    /// Plans a feed switch from the open flags of the two feeds.
    ///
    /// | raw | processed | close | open |
    /// |-----|-----------|-------|------|
    /// | open | closed | raw | processed |
    /// | closed | open | processed | raw |
    /// | closed | closed | - | raw |
    /// | open | open | raw, processed | raw |
    #[must_use]
    pub const fn plan(raw_open: bool, processed_open: bool) -> FeedPlan {
        match (raw_open, processed_open) {
            (true, false) => FeedPlan {
                close: &[ChannelKind::RawVideo],
                open: ChannelKind::ProcessedVideo,
            },
            (false, true) => FeedPlan {
                close: &[ChannelKind::ProcessedVideo],
                open: ChannelKind::RawVideo,
            },
            (false, false) => FeedPlan {
                close: &[],
                open: ChannelKind::RawVideo,
            },
            (true, true) => FeedPlan {
                close: &[ChannelKind::RawVideo, ChannelKind::ProcessedVideo],
                open: ChannelKind::RawVideo,
            },
        }
    }
}

// ============================================================================
// ConnectionRegistry
// ============================================================================

/// The command, raw video and processed video connections of one session.
pub struct ConnectionRegistry {
    /// One entry per [`ChannelKind`], filled in by `new`.
    connections: FxHashMap<ChannelKind, Connection>,

    /// Shared by every connection's message handler.
    router: Arc<Router>,

    /// PING timer, running while the command channel is connected.
    probe: Arc<LatencyProbe>,

    /// Subscriptions installed by `new`, removed on drop.
    internal_listeners: Vec<(ChannelKind, ListenerId)>,

    /// Serializes feed switches.
    switching: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("ConnectionRegistry");
        for kind in ChannelKind::ALL {
            s.field(kind.label(), &self.connection(kind).status());
        }
        s.field("probe", &self.probe).finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionRegistry - Constructor
// ============================================================================

impl ConnectionRegistry {
    /// Builds the three connections, all disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the settings are
    /// invalid or an endpoint cannot be built.
    pub fn new(
        config: &DashboardConfig,
        connector: Arc<dyn Connector>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<Self> {
        config.validate()?;

        let router = Arc::new(Router::new(sink, config.fps_update_interval));
        let mut connections = FxHashMap::default();

        for kind in ChannelKind::ALL {
            let endpoint = config.endpoint(kind)?;
            let router = Arc::clone(&router);
            let channel = if kind.is_video() {
                ConnectionConfig::new(endpoint, kind.label(), move |frame| {
                    router.route_video(kind, frame);
                })
            } else {
                ConnectionConfig::new(endpoint, kind.label(), move |frame| {
                    // Outcome is logged by the router
                    let _ = router.route_command(frame);
                })
            };
            let connection =
                Connection::with_reconnect(channel, Arc::clone(&connector), config.reconnect);
            connections.insert(kind, connection);
        }

        let mut registry = Self {
            connections,
            router,
            probe: Arc::new(LatencyProbe::new(config.ping_interval)),
            internal_listeners: Vec::new(),
            switching: tokio::sync::Mutex::new(()),
        };
        registry.wire_listeners();

        debug!(host = %config.host, "ConnectionRegistry created");
        Ok(registry)
    }

    fn wire_listeners(&mut self) {
        let command = self.connection(ChannelKind::Command).clone();
        let probe = Arc::clone(&self.probe);
        let probed = command.clone();
        let id = command.subscribe(move |event: &StatusEvent| match event.current {
            ConnectionStatus::Connected => probe.start(probed.clone()),
            ConnectionStatus::Disconnected => {
                probe.stop();
            }
            ConnectionStatus::Connecting => {}
        });
        self.internal_listeners.push((ChannelKind::Command, id));

        for kind in [ChannelKind::RawVideo, ChannelKind::ProcessedVideo] {
            let router = Arc::clone(&self.router);
            let id = self.connection(kind).subscribe(move |event: &StatusEvent| {
                if event.current == ConnectionStatus::Disconnected {
                    router.reset_video(kind);
                }
            });
            self.internal_listeners.push((kind, id));
        }
    }
}

// ============================================================================
// ConnectionRegistry - Accessors
// ============================================================================

impl ConnectionRegistry {
    /// Connection for a channel.
    #[must_use]
    pub fn connection(&self, kind: ChannelKind) -> &Connection {
        &self.connections[&kind]
    }

    /// Router shared by the connections.
    #[inline]
    #[must_use]
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Returns `true` while the latency probe is running.
    #[must_use]
    pub fn is_probing(&self) -> bool {
        self.probe.is_running()
    }

    /// Current video feed state.
    #[must_use]
    pub fn video_state(&self) -> VideoFeedState {
        VideoFeedState::from_flags(
            self.connection(ChannelKind::RawVideo).status().is_open(),
            self.connection(ChannelKind::ProcessedVideo).status().is_open(),
        )
    }

    /// Subscribes to status transitions of one channel.
    pub fn subscribe(
        &self,
        kind: ChannelKind,
        listener: impl Fn(&StatusEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.connection(kind).subscribe(listener)
    }

    /// Removes a subscription made with [`ConnectionRegistry::subscribe`].
    pub fn unsubscribe(&self, kind: ChannelKind, id: ListenerId) -> bool {
        self.connection(kind).unsubscribe(id)
    }
}

// ============================================================================
// ConnectionRegistry - Lifecycle
// ============================================================================

impl ConnectionRegistry {
    /// Connects the command channel and the raw video feed.
    ///
    /// Both are attempted even if one fails. If the processed feed is already
    /// open it is kept and the raw feed stays closed.
    ///
    /// # Errors
    ///
    /// Returns the command channel's error first, then the raw video one.
    pub async fn connect_all(&self) -> Result<()> {
        let _switching = self.switching.lock().await;

        let command = self.connection(ChannelKind::Command);
        if self.connection(ChannelKind::ProcessedVideo).status().is_open() {
            info!("Connecting command channel, keeping processed video feed");
            return command.connect().await;
        }

        info!("Connecting command and raw video channels");
        let (command, raw) = tokio::join!(
            command.connect(),
            self.connection(ChannelKind::RawVideo).connect(),
        );
        command.and(raw)
    }

    /// Toggles between the raw and processed video feeds.
    ///
    /// Returns the resulting state.
    ///
    /// # Errors
    ///
    /// Returns the error of the feed being opened. The feeds planned for
    /// closing are closed regardless.
    pub async fn switch_video_feed(&self) -> Result<VideoFeedState> {
        let _switching = self.switching.lock().await;

        let before = self.video_state();
        let plan = VideoFeedState::plan(
            self.connection(ChannelKind::RawVideo).status().is_open(),
            self.connection(ChannelKind::ProcessedVideo).status().is_open(),
        );

        for &kind in plan.close {
            self.connection(kind).close();
        }

        info!(from = ?before, to = ?plan.outcome(), "Switching video feed");
        self.connection(plan.open).connect().await?;
        Ok(plan.outcome())
    }

    /// Closes every channel and stops the latency probe.
    pub fn close_all(&self) {
        self.probe.stop();
        for kind in ChannelKind::ALL {
            self.connection(kind).close();
        }
        info!("All channels closed");
    }

    /// Encodes and sends a command on the command channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`](crate::Error::NotConnected) if the
    /// command channel is not connected.
    pub fn send_command(&self, command: &Command) -> Result<()> {
        self.connection(ChannelKind::Command)
            .send(command.to_frame())?;
        info!(channel = "cmd", action = %command.action(), "TX");
        Ok(())
    }
}

impl Drop for ConnectionRegistry {
    fn drop(&mut self) {
        for (kind, id) in self.internal_listeners.drain(..) {
            if let Some(connection) = self.connections.get(&kind) {
                connection.unsubscribe(id);
            }
        }
        self.probe.stop();
        for connection in self.connections.values() {
            connection.close();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use parking_lot::Mutex;
    use proptest::prelude::*;

    use crate::error::Error;
    use crate::protocol::{Frame, TelemetryRecord};
    use crate::router::NullSink;
    use crate::transport::MemoryConnector;

    #[derive(Default)]
    struct Recorder {
        telemetry: Mutex<Vec<TelemetryRecord>>,
        latencies: Mutex<Vec<Duration>>,
        frames: Mutex<usize>,
    }

    impl TelemetrySink for Recorder {
        fn on_latency(&self, latency: Duration) {
            self.latencies.lock().push(latency);
        }
        fn on_telemetry(&self, record: &TelemetryRecord) {
            self.telemetry.lock().push(record.clone());
        }
        fn on_video_frame(&self, _kind: ChannelKind, _frame: &[u8]) {
            *self.frames.lock() += 1;
        }
    }

    fn config() -> DashboardConfig {
        DashboardConfig::new().with_host("robot.local")
    }

    fn registry_with(
        config: &DashboardConfig,
        sink: Arc<dyn TelemetrySink>,
    ) -> (Arc<MemoryConnector>, ConnectionRegistry) {
        let connector = Arc::new(MemoryConnector::new());
        let registry = ConnectionRegistry::new(config, connector.clone(), sink).unwrap();
        (connector, registry)
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met in time");
    }

    fn record_statuses(
        registry: &ConnectionRegistry,
        kind: ChannelKind,
    ) -> Arc<Mutex<Vec<ConnectionStatus>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.subscribe(kind, move |event| sink.lock().push(event.current));
        seen
    }

    // ------------------------------------------------------------------------
    // VideoFeedState
    // ------------------------------------------------------------------------

    fn apply(plan: FeedPlan, raw: bool, processed: bool) -> (bool, bool) {
        let (mut raw, mut processed) = (raw, processed);
        for kind in plan.close {
            match kind {
                ChannelKind::RawVideo => raw = false,
                ChannelKind::ProcessedVideo => processed = false,
                ChannelKind::Command => {}
            }
        }
        match plan.open {
            ChannelKind::RawVideo => raw = true,
            ChannelKind::ProcessedVideo => processed = true,
            ChannelKind::Command => {}
        }
        (raw, processed)
    }

    #[test]
    fn test_plan_table() {
        assert_eq!(
            VideoFeedState::plan(true, false).outcome(),
            VideoFeedState::ProcessedActive
        );
        assert_eq!(
            VideoFeedState::plan(false, true).outcome(),
            VideoFeedState::RawActive
        );
        assert!(VideoFeedState::plan(false, false).close.is_empty());
        assert_eq!(
            VideoFeedState::plan(true, true).close,
            &[ChannelKind::RawVideo, ChannelKind::ProcessedVideo]
        );
    }

    proptest! {
        #[test]
        fn prop_plan_leaves_exactly_one_feed_open(raw: bool, processed: bool) {
            let plan = VideoFeedState::plan(raw, processed);
            prop_assert_eq!(plan, VideoFeedState::plan(raw, processed));

            let (raw_after, processed_after) = apply(plan, raw, processed);
            prop_assert!(raw_after ^ processed_after);
            prop_assert_eq!(
                VideoFeedState::from_flags(raw_after, processed_after),
                plan.outcome()
            );
        }

        #[test]
        fn prop_switching_twice_restores_single_feed(raw: bool) {
            let processed = !raw;
            let once = apply(VideoFeedState::plan(raw, processed), raw, processed);
            let twice = apply(VideoFeedState::plan(once.0, once.1), once.0, once.1);
            prop_assert_eq!(twice, (raw, processed));
        }
    }

    // ------------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_new_rejects_bad_config() {
        let config = config().with_host("");
        let connector = Arc::new(MemoryConnector::new());
        let err = ConnectionRegistry::new(&config, connector, Arc::new(NullSink)).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_connect_all_leaves_processed_closed() {
        let (connector, registry) = registry_with(&config(), Arc::new(NullSink));
        registry.connect_all().await.unwrap();

        assert!(registry.connection(ChannelKind::Command).is_connected());
        assert!(registry.connection(ChannelKind::RawVideo).is_connected());
        assert_eq!(
            registry.connection(ChannelKind::ProcessedVideo).status(),
            ConnectionStatus::Disconnected
        );
        assert_eq!(registry.video_state(), VideoFeedState::RawActive);
        assert_eq!(connector.open_count(), 2);
    }

    #[tokio::test]
    async fn test_connect_all_keeps_active_feed() {
        let (_connector, registry) = registry_with(&config(), Arc::new(NullSink));
        registry.connect_all().await.unwrap();
        assert_eq!(
            registry.switch_video_feed().await.unwrap(),
            VideoFeedState::ProcessedActive
        );

        registry.connect_all().await.unwrap();

        assert!(registry.connection(ChannelKind::Command).is_connected());
        assert!(registry.connection(ChannelKind::ProcessedVideo).is_connected());
        assert_eq!(
            registry.connection(ChannelKind::RawVideo).status(),
            ConnectionStatus::Disconnected
        );
        assert_eq!(registry.video_state(), VideoFeedState::ProcessedActive);
    }

    #[tokio::test]
    async fn test_send_command_not_connected() {
        let (_connector, registry) = registry_with(&config(), Arc::new(NullSink));
        let err = registry.send_command(&Command::Forward).unwrap_err();
        assert!(matches!(err, Error::NotConnected { .. }));
    }

    #[tokio::test]
    async fn test_forward_round_trip() {
        let recorder = Arc::new(Recorder::default());
        let config = config();
        let (connector, registry) = registry_with(&config, recorder.clone());
        registry.connect_all().await.unwrap();
        let mut remote = connector
            .take_remote(&config.endpoint(ChannelKind::Command).unwrap())
            .unwrap();

        registry.send_command(&Command::Forward).unwrap();
        assert_eq!(
            remote.next_sent().await,
            Some(Frame::Text(r#"{"action":"FORWARD"}"#.to_string()))
        );

        remote.push_text(
            r#"{"status":"ok","command":"FORWARD","velocities":{"left":0.5,"right":0.5},"duty_cycles":{"left":80}}"#,
        );
        eventually(|| !recorder.telemetry.lock().is_empty()).await;

        let record = recorder.telemetry.lock()[0].clone();
        assert_eq!(record.command.as_deref(), Some("FORWARD"));
        assert_eq!(record.velocities.left, Some(0.5));
        assert_eq!(record.duty_cycles.left, Some(80.0));
        assert_eq!(record.duty_cycles.right, None);
    }

    #[tokio::test]
    async fn test_video_frames_reach_sink() {
        let recorder = Arc::new(Recorder::default());
        let config = config();
        let (connector, registry) = registry_with(&config, recorder.clone());
        registry.connect_all().await.unwrap();
        let remote = connector
            .take_remote(&config.endpoint(ChannelKind::RawVideo).unwrap())
            .unwrap();

        remote.push(vec![0xff, 0xd8, 0xff]);
        remote.push(vec![0xff, 0xd8, 0xff]);
        eventually(|| *recorder.frames.lock() == 2).await;
    }

    #[tokio::test]
    async fn test_switch_from_raw_to_processed_and_back() {
        let (_connector, registry) = registry_with(&config(), Arc::new(NullSink));
        registry.connect_all().await.unwrap();
        let raw = record_statuses(&registry, ChannelKind::RawVideo);
        let processed = record_statuses(&registry, ChannelKind::ProcessedVideo);

        let state = registry.switch_video_feed().await.unwrap();
        assert_eq!(state, VideoFeedState::ProcessedActive);
        assert_eq!(*raw.lock(), vec![ConnectionStatus::Disconnected]);
        assert_eq!(
            *processed.lock(),
            vec![ConnectionStatus::Connecting, ConnectionStatus::Connected]
        );

        let state = registry.switch_video_feed().await.unwrap();
        assert_eq!(state, VideoFeedState::RawActive);
        assert_eq!(registry.video_state(), VideoFeedState::RawActive);
        assert_eq!(
            registry.connection(ChannelKind::ProcessedVideo).status(),
            ConnectionStatus::Disconnected
        );
    }

    #[tokio::test]
    async fn test_switch_with_no_feed_opens_raw() {
        let (_connector, registry) = registry_with(&config(), Arc::new(NullSink));
        assert_eq!(registry.video_state(), VideoFeedState::NoneActive);

        let state = registry.switch_video_feed().await.unwrap();
        assert_eq!(state, VideoFeedState::RawActive);
        assert!(registry.connection(ChannelKind::RawVideo).is_connected());
        assert!(!registry.connection(ChannelKind::Command).is_connected());
    }

    #[tokio::test]
    async fn test_switch_with_both_feeds_open() {
        let (_connector, registry) = registry_with(&config(), Arc::new(NullSink));
        registry
            .connection(ChannelKind::RawVideo)
            .connect()
            .await
            .unwrap();
        registry
            .connection(ChannelKind::ProcessedVideo)
            .connect()
            .await
            .unwrap();
        let raw = record_statuses(&registry, ChannelKind::RawVideo);

        let state = registry.switch_video_feed().await.unwrap();
        assert_eq!(state, VideoFeedState::RawActive);
        assert_eq!(
            *raw.lock(),
            vec![
                ConnectionStatus::Disconnected,
                ConnectionStatus::Connecting,
                ConnectionStatus::Connected
            ]
        );
        assert_eq!(
            registry.connection(ChannelKind::ProcessedVideo).status(),
            ConnectionStatus::Disconnected
        );
    }

    #[tokio::test]
    async fn test_switch_reports_open_failure() {
        let (connector, registry) = registry_with(&config(), Arc::new(NullSink));
        registry.connect_all().await.unwrap();
        connector.refuse_connections(true);

        let err = registry.switch_video_feed().await.unwrap_err();
        assert!(err.is_connection_error());
        assert_eq!(registry.video_state(), VideoFeedState::NoneActive);
    }

    #[tokio::test]
    async fn test_probe_follows_command_channel() {
        let recorder = Arc::new(Recorder::default());
        let config = config().with_ping_interval(Duration::from_millis(10));
        let (connector, registry) = registry_with(&config, recorder.clone());
        assert!(!registry.is_probing());

        registry.connect_all().await.unwrap();
        assert!(registry.is_probing());

        let mut remote = connector
            .take_remote(&config.endpoint(ChannelKind::Command).unwrap())
            .unwrap();
        let Some(Frame::Text(ping)) = remote.next_sent().await else {
            panic!("expected a PING frame");
        };
        let ping: serde_json::Value = serde_json::from_str(&ping).unwrap();
        assert_eq!(ping["action"], "PING");

        let pong = serde_json::json!({"action": "PONG", "timestamp": ping["timestamp"]});
        remote.push_text(pong.to_string());
        eventually(|| !recorder.latencies.lock().is_empty()).await;

        registry.connection(ChannelKind::Command).close();
        assert!(!registry.is_probing());
    }

    #[tokio::test]
    async fn test_close_all() {
        let (connector, registry) = registry_with(&config(), Arc::new(NullSink));
        registry.connect_all().await.unwrap();

        registry.close_all();
        registry.close_all();

        for kind in ChannelKind::ALL {
            assert_eq!(
                registry.connection(kind).status(),
                ConnectionStatus::Disconnected
            );
        }
        assert!(!registry.is_probing());

        let remote = connector
            .take_remote(&config().endpoint(ChannelKind::Command).unwrap())
            .unwrap();
        eventually(|| remote.is_released()).await;
    }
}
