//! Application settings management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::platform;

/// Directory name used under the user's config directory
const SETTINGS_DIR: &str = "PodmanStatusBar";

/// Settings file name
const SETTINGS_FILE: &str = "settings.json";

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Executable resolution
    /// Name handed to the lookup utility
    pub binary_name: String,
    /// Path-resolution utility (`which` / `where`)
    pub lookup_program: PathBuf,
    /// Path used when the lookup yields nothing usable
    pub fallback_path: PathBuf,

    // Timing
    /// Interval between periodic probes in ms
    pub poll_interval_ms: u64,
    /// How long a positive reading must hold before the VM counts as running (ms)
    pub confirm_delay_ms: u64,
    /// Delay between a start/stop command and its follow-up probe (ms)
    pub follow_up_delay_ms: u64,

    // Advanced
    /// Enable debug logging
    pub debug_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            binary_name: "podman".to_string(),
            lookup_program: platform::lookup_program(),
            fallback_path: platform::default_executable_path(),

            poll_interval_ms: 5000,
            confirm_delay_ms: 5000,
            follow_up_delay_ms: 2000,

            debug_logging: false,
        }
    }
}

impl Settings {
    /// Location of the optional settings file
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
    }

    /// Load settings from the settings file, falling back to defaults when it does not exist
    pub fn load() -> Result<Self> {
        let Some(path) = Self::settings_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Parse settings from JSON; absent fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let mut settings: Settings =
            serde_json::from_str(json).context("Failed to deserialize settings")?;
        settings.validate();
        Ok(settings)
    }

    /// Validate settings and fix any invalid values
    pub fn validate(&mut self) {
        self.poll_interval_ms = self.poll_interval_ms.max(500);
        self.confirm_delay_ms = self.confirm_delay_ms.max(100);
        self.follow_up_delay_ms = self.follow_up_delay_ms.max(100);

        if self.binary_name.trim().is_empty() {
            self.binary_name = Self::default().binary_name;
        }
        if self.fallback_path.as_os_str().is_empty() {
            self.fallback_path = platform::default_executable_path();
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }

    pub fn follow_up_delay(&self) -> Duration {
        Duration::from_millis(self.follow_up_delay_ms)
    }
}
