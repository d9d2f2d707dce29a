//! Settings Persistence System
//!
//! Session settings (history depth, task queue sizing) with:
//! - Atomic file writes (temp file + rename)
//! - Defaults for every missing field
//! - Clamping of out-of-range values on load and save
//!
//! Storage location: {settings_dir}/settings.json

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{fs::atomic_write_json_pretty, CoreResult};

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Editing session settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub history: HistorySettings,

    #[serde(default)]
    pub queue: QueueSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            history: HistorySettings::default(),
            queue: QueueSettings::default(),
        }
    }
}

impl SessionSettings {
    /// Clamps every value into its valid range.
    ///
    /// Bad values are corrected rather than rejected so an old or hand-edited
    /// file still loads.
    pub fn normalize(&mut self) {
        self.history.max_entries = self.history.max_entries.clamp(1, 1000);

        self.queue.num_workers = self.queue.num_workers.clamp(1, 16);
        self.queue.max_queue_size = self.queue.max_queue_size.clamp(1, 100_000);
        self.queue.idle_wait_ms = self.queue.idle_wait_ms.clamp(10, 5000);
    }

    /// Returns a normalized copy
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

// =============================================================================
// History Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistorySettings {
    /// Undoable commands kept before the oldest is dropped
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

fn default_max_entries() -> usize {
    crate::commands::DEFAULT_MAX_HISTORY
}

// =============================================================================
// Queue Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueSettings {
    /// Number of worker threads
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    /// Pending tasks allowed before `add_task` is refused
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Longest an idle worker sleeps before rescanning (milliseconds)
    #[serde(default = "default_idle_wait_ms")]
    pub idle_wait_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            max_queue_size: default_max_queue_size(),
            idle_wait_ms: default_idle_wait_ms(),
        }
    }
}

impl QueueSettings {
    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}

fn default_num_workers() -> usize {
    1
}

fn default_max_queue_size() -> usize {
    1000
}

fn default_idle_wait_ms() -> u64 {
    100
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Loads, saves and resets the settings file
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Creates a manager for `{settings_dir}/settings.json`
    pub fn new(settings_dir: impl AsRef<Path>) -> Self {
        Self {
            settings_path: settings_dir.as_ref().join(SETTINGS_FILE),
        }
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Loads settings, falling back to defaults if the file is missing or
    /// unreadable
    pub fn load(&self) -> SessionSettings {
        if !self.settings_path.exists() {
            info!("Settings file not found, using defaults");
            return SessionSettings::default();
        }

        match self.read() {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    path = %self.settings_path.display(),
                    "Failed to load settings, using defaults: {}",
                    e
                );
                SessionSettings::default()
            }
        }
    }

    fn read(&self) -> CoreResult<SessionSettings> {
        let content = fs::read_to_string(&self.settings_path)?;
        let mut settings: SessionSettings = serde_json::from_str(&content)?;

        if settings.version < SETTINGS_VERSION {
            info!(
                "Migrating settings from version {} to {}",
                settings.version, SETTINGS_VERSION
            );
            settings = migrate(settings);
        }

        Ok(settings.normalized())
    }

    /// Normalizes and writes settings atomically; returns what was written
    pub fn save(&self, settings: &SessionSettings) -> CoreResult<SessionSettings> {
        let normalized = settings.clone().normalized();
        atomic_write_json_pretty(&self.settings_path, &normalized)?;
        info!("Settings saved to {:?}", self.settings_path);
        Ok(normalized)
    }

    /// Deletes the settings file and returns defaults
    pub fn reset(&self) -> CoreResult<SessionSettings> {
        if self.settings_path.exists() {
            fs::remove_file(&self.settings_path)?;
            info!("Settings file deleted");
        }
        Ok(SessionSettings::default())
    }
}

fn migrate(mut settings: SessionSettings) -> SessionSettings {
    settings.version = SETTINGS_VERSION;
    settings
}
