//! Line-driven robot console.
//!
//! Demonstrates:
//! - Loading dashboard settings from a JSON file
//! - Connecting the command and raw video channels
//! - Sending typed commands and switching the video feed
//! - Printing telemetry through a `TelemetrySink`
//!
//! Usage:
//!   cargo run --example console
//!   cargo run --example console -- --debug
//!   cargo run --example console -- --settings ./rover.json --host 10.0.0.7
//!
//! Console input, one per line:
//!   FORWARD, DRIVE_STOP, SET_DUTY 40 60, CAM_MODE_2, ...   send a command
//!   connect | close | switch | status | save | quit

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rover_link::{
    ChannelKind, Command, ConnectionRegistry, HealthFlags, JsonFileStore, Result, SettingsStore,
    TelemetryRecord, TelemetrySink, VelocitySample, WsConnector,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_SETTINGS_PATH: &str = "./rover-link.json";

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    settings: PathBuf,
    host: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };
        Self {
            debug: args.iter().any(|a| a == "--debug"),
            settings: value_of("--settings")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH)),
            host: value_of("--host"),
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "rover_link=debug"
    } else {
        "rover_link=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// ConsoleSink
// ============================================================================

struct ConsoleSink;

impl TelemetrySink for ConsoleSink {
    fn on_latency(&self, latency: Duration) {
        println!("[Latency] {} ms", latency.as_millis());
    }

    fn on_telemetry(&self, record: &TelemetryRecord) {
        let command = record.command.as_deref().unwrap_or("?");
        println!(
            "[Telemetry] {command}: velocity L={:?} R={:?}, duty L={:?} R={:?}",
            record.velocities.left,
            record.velocities.right,
            record.duty_cycles.left,
            record.duty_cycles.right
        );
    }

    fn on_remote_error(&self, message: &str) {
        println!("[Robot] error: {message}");
    }

    fn on_health(&self, flags: &HealthFlags) {
        if flags.any_now() {
            println!(
                "[Health] under-voltage={} freq-capped={} throttled={}",
                flags.under_voltage.now, flags.freq_capped.now, flags.throttled.now
            );
        }
    }

    fn on_health_unavailable(&self, reason: &str) {
        println!("[Health] unavailable: {reason}");
    }

    fn on_velocity(&self, sample: &VelocitySample) {
        println!(
            "[Velocity] L={:.3} R={:.3} m/s (max accel {:.2} m/s^2)",
            sample.smoothed_left, sample.smoothed_right, sample.max_acceleration
        );
    }

    fn on_frame_rate(&self, kind: ChannelKind, fps: f64) {
        println!("[Video] {kind}: {fps:.1} fps");
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Rover console ===\n");

    let store = JsonFileStore::new(args.settings.clone());
    let mut config = store.load_or_default()?;
    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    println!("[Setup] Robot at {} (settings: {})", config.host, store.path().display());

    let registry = ConnectionRegistry::new(&config, Arc::new(WsConnector::new()), Arc::new(ConsoleSink))?;
    for kind in ChannelKind::ALL {
        registry.subscribe(kind, |event| {
            println!("[Status] {}: {} -> {}", event.label, event.previous, event.current);
        });
    }

    if config.connect_on_load {
        connect(&registry).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let line = line.trim();

        match line.to_ascii_lowercase().as_str() {
            "" => {}
            "quit" | "exit" => break,
            "connect" => connect(&registry).await,
            "close" => registry.close_all(),
            "switch" => match registry.switch_video_feed().await {
                Ok(state) => println!("[Video] now {state:?}"),
                Err(e) => println!("[Video] switch failed: {e}"),
            },
            "status" => {
                for kind in ChannelKind::ALL {
                    println!("        {kind}: {}", registry.connection(kind).status());
                }
                println!("        video: {:?}", registry.video_state());
            }
            "save" => match store.save(&config) {
                Ok(()) => println!("[Setup] Settings saved"),
                Err(e) => println!("[Setup] Save failed: {e}"),
            },
            _ => match line.parse::<Command>() {
                Ok(command) => {
                    if let Err(e) = registry.send_command(&command) {
                        println!("[TX] {e}");
                    }
                }
                Err(e) => println!("[Input] {e}"),
            },
        }
    }

    registry.close_all();
    println!("Bye");
    Ok(())
}

async fn connect(registry: &ConnectionRegistry) {
    if let Err(e) = registry.connect_all().await {
        println!("[Setup] Connect failed: {e}");
    }
}
