//! Slot identity and content types.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Which collection a slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotScope {
    /// A cell of the main cue grid.
    Grid,
    /// A lane of a trigger column.
    Trigger,
}

/// Lane of a trigger column. The lane index is the slot row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerLane {
    Video,
    Image,
    Audio,
}

impl TriggerLane {
    pub const ALL: [TriggerLane; 3] = [TriggerLane::Video, TriggerLane::Image, TriggerLane::Audio];

    pub fn row(self) -> u32 {
        match self {
            TriggerLane::Video => 0,
            TriggerLane::Image => 1,
            TriggerLane::Audio => 2,
        }
    }

    pub fn from_row(row: u32) -> Option<Self> {
        match row {
            0 => Some(TriggerLane::Video),
            1 => Some(TriggerLane::Image),
            2 => Some(TriggerLane::Audio),
            _ => None,
        }
    }

    /// The only media kind a lane accepts.
    pub fn accepts(self) -> MediaKind {
        match self {
            TriggerLane::Video => MediaKind::Video,
            TriggerLane::Image => MediaKind::Image,
            TriggerLane::Audio => MediaKind::Audio,
        }
    }
}

/// Stable identity of a slot, used as the key for all playback state.
///
/// Ordering is `(scope, column, row)`, so grid slots sort by column first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub scope: SlotScope,
    pub column: u32,
    pub row: u32,
}

impl SlotKey {
    /// Key of a grid cell, `Slot_<column>_<row>`.
    pub fn grid(column: u32, row: u32) -> Self {
        Self {
            scope: SlotScope::Grid,
            column,
            row,
        }
    }

    /// Key of a trigger lane, `Trigger_<column>_<lane>`.
    pub fn trigger(column: u32, lane: TriggerLane) -> Self {
        Self {
            scope: SlotScope::Trigger,
            column,
            row: lane.row(),
        }
    }

    pub fn is_trigger(&self) -> bool {
        self.scope == SlotScope::Trigger
    }

    /// Trigger column owning this key, if it is a trigger lane.
    pub fn trigger_column(&self) -> Option<u32> {
        self.is_trigger().then_some(self.column)
    }

    pub fn trigger_lane(&self) -> Option<TriggerLane> {
        if self.is_trigger() {
            TriggerLane::from_row(self.row)
        } else {
            None
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.scope {
            SlotScope::Grid => "Slot",
            SlotScope::Trigger => "Trigger",
        };
        write!(f, "{prefix}_{}_{}", self.column, self.row)
    }
}

/// Error returned when a string is not a valid slot key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid slot key: {0:?}")]
pub struct ParseSlotKeyError(pub String);

impl FromStr for SlotKey {
    type Err = ParseSlotKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSlotKeyError(s.to_string());
        let mut parts = s.split('_');
        let scope = match parts.next() {
            Some("Slot") => SlotScope::Grid,
            Some("Trigger") => SlotScope::Trigger,
            _ => return Err(err()),
        };
        let column = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let row: u32 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        if parts.next().is_some() {
            return Err(err());
        }
        if scope == SlotScope::Trigger && TriggerLane::from_row(row).is_none() {
            return Err(err());
        }
        Ok(Self { scope, column, row })
    }
}

impl Serialize for SlotKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Kind of asset a slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
    Text,
}

impl MediaKind {
    /// Kinds with a time axis support pause/resume and resume positions.
    pub fn is_timed(self) -> bool {
        matches!(self, MediaKind::Video | MediaKind::Audio)
    }

    /// Kinds that occupy the primary surface.
    pub fn is_visual(self) -> bool {
        !matches!(self, MediaKind::Audio)
    }
}

/// Where a text card is anchored on the primary surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPosition {
    Top,
    #[default]
    Center,
    Bottom,
}

/// Text card shown on the overlay layer of the primary surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,

    #[serde(default = "default_font_family")]
    pub font_family: String,

    #[serde(default = "default_font_size")]
    pub font_size: f64,

    /// Colour as `#RRGGBB` or `#AARRGGBB`.
    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub position: TextPosition,
}

fn default_font_family() -> String {
    "Sans".to_string()
}

fn default_font_size() -> f64 {
    48.0
}

fn default_color() -> String {
    "#FFFFFF".to_string()
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_family: default_font_family(),
            font_size: default_font_size(),
            color: default_color(),
            position: TextPosition::default(),
        }
    }
}

/// Asset held by a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SlotContent {
    Video { path: PathBuf },
    Audio { path: PathBuf },
    Image { path: PathBuf },
    Text(TextContent),
}

impl SlotContent {
    pub fn kind(&self) -> MediaKind {
        match self {
            SlotContent::Video { .. } => MediaKind::Video,
            SlotContent::Audio { .. } => MediaKind::Audio,
            SlotContent::Image { .. } => MediaKind::Image,
            SlotContent::Text(_) => MediaKind::Text,
        }
    }

    /// Underlying media file. `None` for text.
    pub fn media_path(&self) -> Option<&Path> {
        match self {
            SlotContent::Video { path } | SlotContent::Audio { path } | SlotContent::Image { path } => {
                Some(path)
            }
            SlotContent::Text(_) => None,
        }
    }
}

/// A single addressable cell holding one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSlot {
    pub key: SlotKey,

    pub content: SlotContent,

    /// Label shown on the grid button.
    #[serde(default)]
    pub display_name: String,
}

impl MediaSlot {
    pub fn new(key: SlotKey, content: SlotContent) -> Self {
        let display_name = match &content {
            SlotContent::Text(t) => t.text.lines().next().unwrap_or_default().to_string(),
            other => other
                .media_path()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        Self {
            key,
            content,
            display_name,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.content.kind()
    }

    pub fn media_path(&self) -> Option<&Path> {
        self.content.media_path()
    }

    pub fn column(&self) -> u32 {
        self.key.column
    }

    pub fn row(&self) -> u32 {
        self.key.row
    }
}
