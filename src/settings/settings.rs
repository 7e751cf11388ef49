// Settings management and persistence
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::generation::{CancelPolicy, SimulatorConfig};
use crate::metadata::TrackInfo;
use crate::player::PlayerConfig;

/// Simulated generation timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub tick_interval_ms: u64,
    pub step_percent: f64,
    pub total_wait_ms: u64,
    pub cancel_policy: CancelPolicy,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 30,
            step_percent: 0.5,
            total_wait_ms: 5000,
            cancel_policy: CancelPolicy::Abort,
        }
    }
}

impl GenerationSettings {
    pub fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            // A zero period would make tokio's interval panic
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(1)),
            step_percent: self.step_percent,
            total_wait: Duration::from_millis(self.total_wait_ms),
            cancel_policy: self.cancel_policy,
        }
    }
}

/// Player screen settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Bundled track. Relative paths are looked up next to the executable
    /// first, then in the working directory.
    pub asset_path: PathBuf,
    pub poll_interval_ms: u64,
    pub skip_seconds: u64,
    pub initial_volume: f32,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            asset_path: PathBuf::from("assets").join("file.mp3"),
            poll_interval_ms: 100,
            skip_seconds: 10,
            initial_volume: 0.8,
        }
    }
}

impl PlaybackSettings {
    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            skip_interval: Duration::from_secs(self.skip_seconds),
        }
    }

    pub fn resolve_asset(&self) -> PathBuf {
        if self.asset_path.is_absolute() {
            return self.asset_path.clone();
        }

        let beside_exe = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(&self.asset_path)));
        match beside_exe {
            Some(path) if path.exists() => path,
            _ => self.asset_path.clone(),
        }
    }
}

/// Shown when the asset carries no tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackSettings {
    pub title: String,
    pub artist: String,
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self {
            title: "Royalty (NCS)".to_string(),
            artist: "Maestro Chives and Neoni".to_string(),
        }
    }
}

impl TrackSettings {
    pub fn track_info(&self) -> TrackInfo {
        TrackInfo::new(self.title.clone(), self.artist.clone())
    }
}

/// Main application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub version: i32, // Settings schema version for future migrations
    pub generation: GenerationSettings,
    pub playback: PlaybackSettings,
    pub track: TrackSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: 1,
            generation: GenerationSettings::default(),
            playback: PlaybackSettings::default(),
            track: TrackSettings::default(),
        }
    }
}

impl AppSettings {
    /// Per-user settings directory, if the platform has one
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("musicai"))
    }

    pub fn get_settings_path(app_dir: &Path) -> PathBuf {
        app_dir.join("settings.json")
    }

    /// Load settings from file, or return defaults if the file doesn't exist
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = Self::get_settings_path(app_dir);

        if !path.exists() {
            debug!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;

        let settings: AppSettings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {:?}", path))?;

        info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn save(&self, app_dir: &Path) -> Result<()> {
        fs::create_dir_all(app_dir)
            .with_context(|| format!("Failed to create settings directory {:?}", app_dir))?;

        let path = Self::get_settings_path(app_dir);
        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write settings file {:?}", path))?;

        info!("Saved settings to {:?}", path);
        Ok(())
    }
}
