//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where show files are stored.
    pub shows_dir: PathBuf,

    /// Playback behaviour defaults.
    #[serde(default)]
    pub playback: PlaybackDefaults,

    /// Output device selection.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Playback behaviour flags and timer cadences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackDefaults {
    /// Replay the primary video from zero when it ends.
    pub loop_video: bool,

    /// Wrap to the first slot of a row after the last one ends.
    pub loop_playlist: bool,

    /// Start the next slot in the row when media ends naturally.
    pub auto_play: bool,

    /// Secondary output is snapped to the primary beyond this drift.
    pub drift_threshold_ms: u64,

    /// Video position timer period.
    pub video_tick_ms: u64,

    /// Audio position timer period.
    pub audio_tick_ms: u64,
}

/// Which devices the outputs are bound to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Display index for the mirrored secondary output (`None` = no mirror).
    pub secondary_display_index: Option<usize>,

    /// Audio output device index (`None` = system default).
    pub audio_device_index: Option<usize>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "cuegrid=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            shows_dir: dirs_default_shows(),
            playback: PlaybackDefaults::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            loop_video: false,
            loop_playlist: false,
            auto_play: true,
            drift_threshold_ms: 100,
            video_tick_ms: 250,
            audio_tick_ms: 250,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("cuegrid").join("config.json")
}

/// Default shows directory.
fn dirs_default_shows() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("cuegrid").join("shows")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{ "shows_dir": "/srv/shows", "playback": { "loop_playlist": true } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.shows_dir, PathBuf::from("/srv/shows"));
        assert!(config.playback.loop_playlist);
        assert!(config.playback.auto_play);
        assert_eq!(config.playback.drift_threshold_ms, 100);
        assert_eq!(config.output, OutputConfig::default());
        assert_eq!(config.logging.level, "info");
    }
}
