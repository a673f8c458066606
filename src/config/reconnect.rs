//! Automatic reconnection policy.
//!
//! Reconnection is off by default: a dropped channel stays `Disconnected`
//! until the operator reconnects it. When enabled, a dropped link is retried
//! at a fixed interval up to a bounded number of attempts. A manual `close()`
//! always wins over a pending retry.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::settings::secs;

// ============================================================================
// Constants
// ============================================================================

/// Default delay between attempts.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Default attempt budget.
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

// ============================================================================
// ReconnectConfig
// ============================================================================

/// Retry policy for links that drop unexpectedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconnectConfig {
    /// Retry dropped links automatically.
    pub enabled: bool,

    /// Delay before each attempt.
    #[serde(with = "secs")]
    pub interval: Duration,

    /// Attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::manual()
    }
}

impl ReconnectConfig {
    /// Manual reconnect only.
    #[inline]
    #[must_use]
    pub const fn manual() -> Self {
        Self {
            enabled: false,
            interval: DEFAULT_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Automatic reconnect with the given interval and attempt budget.
    #[inline]
    #[must_use]
    pub const fn automatic(interval: Duration, max_attempts: u32) -> Self {
        Self {
            enabled: true,
            interval,
            max_attempts,
        }
    }

    /// Returns `true` if another attempt is allowed after `attempts` tries.
    #[inline]
    #[must_use]
    pub const fn allows_attempt(&self, attempts: u32) -> bool {
        self.enabled && attempts < self.max_attempts
    }
}

// ============================================================================
// Tests
// ============================================================================
