use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Preferred stream quality passed to the provider, e.g. "best" or "1080".
    pub quality: String,
    /// Start `play` from the stored timestamp when the episode matches history.
    pub auto_resume: bool,
    pub fullscreen: bool,
    pub skip_intro_seconds: u32,
    pub skip_outro_seconds: u32,
    pub auto_next_episode: bool,
    /// Seconds between progress writes while the player runs.
    pub save_progress_interval: u64,
    /// Entries watched for fewer seconds are left out of continue-watching.
    pub minimal_progress_threshold: u32,
    pub history_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: "best".to_string(),
            auto_resume: true,
            fullscreen: false,
            skip_intro_seconds: 0,
            skip_outro_seconds: 0,
            auto_next_episode: true,
            save_progress_interval: 10,
            minimal_progress_threshold: 30,
            history_limit: 100,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings at {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid settings in {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize settings")
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.save_progress_interval.max(1))
    }
}
