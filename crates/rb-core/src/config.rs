//! Configuration system for the retrobridge runtime

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub pacing: PacingConfig,
    pub audio: AudioConfig,
    pub input: InputConfig,
    pub save_states: SaveStateConfig,
    pub debug: DebugConfig,
}

/// Slowest emulation rate the pacer accepts
pub const MIN_RATE: f64 = 0.01;
/// Fastest emulation rate the pacer accepts
pub const MAX_RATE: f64 = 64.0;

/// Whether `rate` is a usable emulation rate multiplier
pub fn rate_in_range(rate: f64) -> bool {
    (MIN_RATE..=MAX_RATE).contains(&rate)
}

/// Frame pacing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Most frames advanced in one scheduler tick; older backlog is dropped
    pub backlog_ceiling: u32,
    /// Rate multiplier used while fast-forwarding, in `MIN_RATE..=MAX_RATE`
    pub fast_forward_rate: f64,
    /// Suppress video rendering for catch-up frames
    pub frame_skip: bool,
    /// Nudge the frame interval towards the audio device clock
    pub audio_sync: bool,
    /// Largest relative interval adjustment applied by `audio_sync`
    pub max_rate_adjust: f64,
}

/// Audio hand-off settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
    /// Ring buffer length; bounds worst-case audio latency
    pub buffer_ms: u32,
}

/// Input settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub max_players: usize,
}

/// Save state settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveStateConfig {
    pub directory: PathBuf,
    pub verify_checksum: bool,
    /// Keep an automatic save state when a running game is stopped
    pub auto_save_on_stop: bool,
}

/// Debug settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
}

/// Logging level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// Default implementations

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            backlog_ceiling: 4,
            fast_forward_rate: 4.0,
            frame_skip: true,
            audio_sync: true,
            max_rate_adjust: 0.005,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_ms: 100,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { max_players: 4 }
    }
}

impl Default for SaveStateConfig {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("retrobridge");

        Self {
            directory: base.join("states"),
            verify_checksum: true,
            auto_save_on_stop: false,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> Result<Self, BridgeError> {
        let path = Self::config_path();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Self::from_toml_str(&content)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, BridgeError> {
        let config: Config =
            toml::from_str(content).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), BridgeError> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| BridgeError::Config(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("retrobridge")
            .join("config.toml")
    }

    /// Reject values the runtime cannot honor
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.pacing.backlog_ceiling == 0 {
            return Err(BridgeError::Config(
                "pacing.backlog_ceiling must be at least 1".to_string(),
            ));
        }
        if !rate_in_range(self.pacing.fast_forward_rate) {
            return Err(BridgeError::Config(format!(
                "pacing.fast_forward_rate must be in {}..={}",
                MIN_RATE, MAX_RATE
            )));
        }
        if !(0.0..0.1).contains(&self.pacing.max_rate_adjust) {
            return Err(BridgeError::Config(
                "pacing.max_rate_adjust must be in [0, 0.1)".to_string(),
            ));
        }
        if self.audio.buffer_ms == 0 {
            return Err(BridgeError::Config(
                "audio.buffer_ms must be at least 1".to_string(),
            ));
        }
        if self.input.max_players == 0 || self.input.max_players > crate::MAX_PLAYERS {
            return Err(BridgeError::Config(format!(
                "input.max_players must be in 1..={}",
                crate::MAX_PLAYERS
            )));
        }
        Ok(())
    }
}
