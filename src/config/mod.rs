//! Link configuration.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DashboardConfig`] | Robot address, channel ports, timer intervals |
//! | [`ReconnectConfig`] | Automatic reconnection policy |
//! | [`SettingsStore`] | Persistence boundary for saved settings |
//! | [`JsonFileStore`] | File-backed [`SettingsStore`] |

// ============================================================================
// Submodules
// ============================================================================

/// Automatic reconnection policy.
pub mod reconnect;

/// Dashboard settings.
pub mod settings;

/// Settings persistence.
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use reconnect::ReconnectConfig;
pub use settings::DashboardConfig;
pub use store::{JsonFileStore, SettingsStore};
