//! Show documents: the grid and its settings as stored on disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::grid::SlotGrid;
use crate::settings::SettingsManager;

/// Errors loading or saving a show file.
#[derive(Debug, thiserror::Error)]
pub enum ShowError {
    #[error("I/O error at {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid show file {}: {source}", path.display())]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported show version {0}")]
    UnsupportedVersion(String),
}

pub const SHOW_VERSION: &str = "1.0";

/// Top-level show file (`<name>.cuegrid.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    /// Schema version.
    pub version: String,

    /// Human-readable show name.
    pub name: String,

    /// Unique show identifier.
    pub id: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Last modified timestamp (ISO 8601).
    pub modified_at: String,

    /// Grid cells and trigger lanes.
    #[serde(default)]
    pub grid: SlotGrid,

    /// Per-slot and master settings.
    #[serde(default)]
    pub settings: SettingsManager,

    /// Looping and auto-play behaviour.
    #[serde(default)]
    pub playback: PlaybackFlags,
}

/// Show-wide playback behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackFlags {
    /// Replay the primary video from zero when it ends.
    pub loop_video: bool,

    /// Wrap to the first slot of a row after the last one ends.
    pub loop_playlist: bool,

    /// Start the next slot in the row when media ends naturally.
    pub auto_play: bool,
}

impl Default for PlaybackFlags {
    fn default() -> Self {
        Self {
            loop_video: false,
            loop_playlist: false,
            auto_play: true,
        }
    }
}

impl Show {
    /// Create an empty show.
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: SHOW_VERSION.to_string(),
            name: name.into(),
            id: show_id(),
            created_at: now.clone(),
            modified_at: now,
            grid: SlotGrid::new(),
            settings: SettingsManager::new(),
            playback: PlaybackFlags::default(),
        }
    }

    /// Load a show file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ShowError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ShowError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let show: Show = serde_json::from_str(&json).map_err(|e| ShowError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        if show.version.split('.').next() != SHOW_VERSION.split('.').next() {
            return Err(ShowError::UnsupportedVersion(show.version));
        }
        Ok(show)
    }

    /// Save the show, creating parent directories as needed.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), ShowError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ShowError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        self.modified_at = chrono::Utc::now().to_rfc3339();
        let json = serde_json::to_string_pretty(self).map_err(|e| ShowError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| ShowError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Report slots whose media file does not exist. Relative paths are
    /// resolved against `base_dir`.
    pub fn validate_media(&self, base_dir: &Path) -> Vec<String> {
        self.grid
            .iter()
            .filter_map(|slot| {
                let path = slot.media_path()?;
                let resolved = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    base_dir.join(path)
                };
                (!resolved.exists()).then(|| {
                    format!("{}: media file not found: {}", slot.key, resolved.display())
                })
            })
            .collect()
    }
}

fn show_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!(
        "{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
        (seed & 0xFFFFFFFF) as u32,
        ((seed >> 32) & 0xFFFF) as u16,
        ((seed >> 48) & 0x0FFF) as u16,
        (((seed >> 60) & 0x3F) | 0x80) as u16,
        (seed >> 76) & 0xFFFFFFFFFFFF,
    )
}
