//! Type-safe identifiers for link entities.
//!
//! | Type | Identifies |
//! |------|------------|
//! | [`ChannelKind`] | One of the three logical channels |
//! | [`ListenerId`] | A status listener registration |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// ChannelKind
// ============================================================================

/// Logical channel to the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKind {
    /// JSON command and telemetry channel.
    Command,
    /// Unprocessed camera frames.
    RawVideo,
    /// Frames annotated by the on-board detection model.
    ProcessedVideo,
}

impl ChannelKind {
    /// All channels, command first.
    pub const ALL: [ChannelKind; 3] = [
        ChannelKind::Command,
        ChannelKind::RawVideo,
        ChannelKind::ProcessedVideo,
    ];

    /// Short label used in logs and errors.
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ChannelKind::Command => "cmd",
            ChannelKind::RawVideo => "raw-video",
            ChannelKind::ProcessedVideo => "processed-video",
        }
    }

    /// Returns `true` for the two video channels.
    #[inline]
    #[must_use]
    pub const fn is_video(self) -> bool {
        matches!(self, ChannelKind::RawVideo | ChannelKind::ProcessedVideo)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// ListenerId
// ============================================================================

/// Global counter for listener IDs.
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned by a status subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocates a process-unique listener ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
