//! Settings persistence.
//!
//! The link only needs two operations from whatever stores the operator's
//! settings: load the saved object (if any) and save a new one.
//! [`JsonFileStore`] keeps them in a single JSON file.

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;

use super::settings::DashboardConfig;

// ============================================================================
// SettingsStore
// ============================================================================

/// Loads and saves [`DashboardConfig`].
pub trait SettingsStore: Send + Sync {
    /// Returns the saved settings, or `None` when nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if saved settings exist but cannot be read.
    fn load(&self) -> Result<Option<DashboardConfig>>;

    /// Persists `config`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be written.
    fn save(&self, config: &DashboardConfig) -> Result<()>;

    /// Returns saved settings, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Propagates [`SettingsStore::load`] errors.
    fn load_or_default(&self) -> Result<DashboardConfig> {
        Ok(self.load()?.unwrap_or_default())
    }
}

// ============================================================================
// JsonFileStore
// ============================================================================

/// Stores settings as pretty-printed JSON in one file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store backed by `path`. The file need not exist yet.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<Option<DashboardConfig>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No saved settings");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let config = serde_json::from_str(&text)?;
        debug!(path = %self.path.display(), "Loaded saved settings");
        Ok(Some(config))
    }

    fn save(&self, config: &DashboardConfig) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let text = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, text)?;
        info!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
