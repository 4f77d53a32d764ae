use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{CyberdeckError, Result};

const APP_DIR: &str = "cyberdeck";
const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub meditation: MeditationConfig,
    pub playback: PlaybackConfig,
    pub backlight: BacklightConfig,
    pub probe: ProbeConfig,
}

impl AppConfig {
    /// Location of the per-user configuration file, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Loads the configuration from `path`, or from [`Self::default_path`]
    /// when no explicit path is given. A missing default file yields the
    /// built-in defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Checks the invariants the playback loop relies on.
    pub fn validate(&self) -> Result<()> {
        let playback = &self.playback;
        if playback.tick_interval_ms == 0 {
            return Err(CyberdeckError::InvalidConfig(
                "playback.tick_interval_ms must be positive".to_string(),
            ));
        }
        if playback.heartbeat_ticks == 0 || playback.dim_ticks == 0 {
            return Err(CyberdeckError::InvalidConfig(
                "playback tick periods must be positive".to_string(),
            ));
        }
        if playback.heartbeat_ticks % playback.dim_ticks != 0 {
            return Err(CyberdeckError::InvalidConfig(format!(
                "playback.heartbeat_ticks ({}) must be a multiple of playback.dim_ticks ({})",
                playback.heartbeat_ticks, playback.dim_ticks
            )));
        }
        Ok(())
    }
}

/// Where clips live and how long a session runs by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeditationConfig {
    pub clip_directory: PathBuf,
    pub alarm_path: PathBuf,
    pub default_minutes: u32,
}

impl Default for MeditationConfig {
    fn default() -> Self {
        let audio = audio_directory();
        Self {
            clip_directory: audio.join("meditations"),
            alarm_path: audio.join("alarm.mp3"),
            default_minutes: 60,
        }
    }
}

fn audio_directory() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("audio")
}

/// Configuration of the external player and the breathing duty cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub player: String,
    pub tick_interval_ms: u64,
    /// Ticks between heartbeats; the backlight is switched on at each one.
    pub heartbeat_ticks: u64,
    /// Ticks between dims; must divide `heartbeat_ticks`.
    pub dim_ticks: u64,
}

impl PlaybackConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            player: "cvlc".to_string(),
            tick_interval_ms: 500,
            heartbeat_ticks: 90,
            dim_ticks: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacklightConfig {
    pub power_path: PathBuf,
}

impl Default for BacklightConfig {
    fn default() -> Self {
        Self {
            power_path: PathBuf::from("/sys/class/backlight/rpi_backlight/bl_power"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub ffprobe: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ffprobe: "ffprobe".to_string(),
        }
    }
}
