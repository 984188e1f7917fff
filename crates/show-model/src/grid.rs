//! The slot store: grid cells and trigger lanes.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::slot::{MediaKind, MediaSlot, SlotKey, SlotScope, TriggerLane};

/// Errors raised when editing the grid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("slot {key} is a trigger lane that only accepts {expected:?}, got {actual:?}")]
    LaneMismatch {
        key: SlotKey,
        expected: MediaKind,
        actual: MediaKind,
    },

    #[error("slot key {0} has no trigger lane")]
    InvalidLane(SlotKey),
}

/// Ordered collection of slots; at most one slot per key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<MediaSlot>", into = "Vec<MediaSlot>")]
pub struct SlotGrid {
    slots: BTreeMap<SlotKey, MediaSlot>,
}

/// The constituent slots of one trigger column.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerColumn {
    pub column: u32,
    pub video: Option<MediaSlot>,
    pub image: Option<MediaSlot>,
    pub audio: Option<MediaSlot>,
}

impl TriggerColumn {
    /// The slot that occupies the primary surface: video wins over image.
    pub fn visual(&self) -> Option<&MediaSlot> {
        self.video.as_ref().or(self.image.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.image.is_none() && self.audio.is_none()
    }
}

impl SlotGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &SlotKey) -> Option<&MediaSlot> {
        self.slots.get(key)
    }

    /// Insert or replace the slot at `slot.key`, returning the previous one.
    pub fn insert(&mut self, slot: MediaSlot) -> Result<Option<MediaSlot>, GridError> {
        if slot.key.scope == SlotScope::Trigger {
            let lane = slot
                .key
                .trigger_lane()
                .ok_or(GridError::InvalidLane(slot.key))?;
            if lane.accepts() != slot.kind() {
                return Err(GridError::LaneMismatch {
                    key: slot.key,
                    expected: lane.accepts(),
                    actual: slot.kind(),
                });
            }
        }
        Ok(self.slots.insert(slot.key, slot))
    }

    pub fn remove(&mut self, key: &SlotKey) -> Option<MediaSlot> {
        self.slots.remove(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slots in `(scope, column, row)` order.
    pub fn iter(&self) -> impl Iterator<Item = &MediaSlot> {
        self.slots.values()
    }

    /// Grid slots of one row, ordered by column.
    pub fn row(&self, row: u32) -> Vec<&MediaSlot> {
        self.slots
            .values()
            .filter(|s| s.key.scope == SlotScope::Grid && s.key.row == row)
            .collect()
    }

    /// Resolve the lanes of a trigger column.
    pub fn trigger_column(&self, column: u32) -> TriggerColumn {
        let lane = |lane| self.slots.get(&SlotKey::trigger(column, lane)).cloned();
        TriggerColumn {
            column,
            video: lane(TriggerLane::Video),
            image: lane(TriggerLane::Image),
            audio: lane(TriggerLane::Audio),
        }
    }

    /// Columns that have at least one trigger lane assigned.
    pub fn trigger_columns(&self) -> Vec<u32> {
        let mut columns: Vec<u32> = self
            .slots
            .keys()
            .filter(|k| k.is_trigger())
            .map(|k| k.column)
            .collect();
        columns.dedup();
        columns
    }
}

impl From<Vec<MediaSlot>> for SlotGrid {
    fn from(slots: Vec<MediaSlot>) -> Self {
        let mut grid = SlotGrid::new();
        for slot in slots {
            let key = slot.key;
            if let Err(e) = grid.insert(slot) {
                tracing::warn!(slot = %key, error = %e, "Dropping invalid slot");
            }
        }
        grid
    }
}

impl From<SlotGrid> for Vec<MediaSlot> {
    fn from(grid: SlotGrid) -> Self {
        grid.slots.into_values().collect()
    }
}

/// Read/write access to the slot store, shared between the UI and the engine.
pub trait SlotStore: Send + Sync {
    fn get_media_slot(&self, key: &SlotKey) -> Option<MediaSlot>;

    fn slots(&self) -> Vec<MediaSlot>;

    fn add_slot(&self, slot: MediaSlot) -> Result<Option<MediaSlot>, GridError>;

    fn remove_slot(&self, key: &SlotKey) -> Option<MediaSlot>;

    /// Grid slots of one row, ordered by column.
    fn row(&self, row: u32) -> Vec<MediaSlot> {
        self.slots()
            .into_iter()
            .filter(|s| s.key.scope == SlotScope::Grid && s.key.row == row)
            .collect()
    }

    fn trigger_column(&self, column: u32) -> TriggerColumn {
        let lane = |lane| self.get_media_slot(&SlotKey::trigger(column, lane));
        TriggerColumn {
            column,
            video: lane(TriggerLane::Video),
            image: lane(TriggerLane::Image),
            audio: lane(TriggerLane::Audio),
        }
    }
}

/// A [`SlotGrid`] behind a lock, usable as a [`SlotStore`].
#[derive(Debug, Default)]
pub struct SharedGrid {
    inner: RwLock<SlotGrid>,
}

impl SharedGrid {
    pub fn new(grid: SlotGrid) -> Self {
        Self {
            inner: RwLock::new(grid),
        }
    }

    /// Copy of the current grid, e.g. for saving.
    pub fn snapshot(&self) -> SlotGrid {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, SlotGrid> {
        // A panicking writer cannot leave a BTreeMap half-updated.
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SlotGrid> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl SlotStore for SharedGrid {
    fn get_media_slot(&self, key: &SlotKey) -> Option<MediaSlot> {
        self.read().get(key).cloned()
    }

    fn slots(&self) -> Vec<MediaSlot> {
        self.read().iter().cloned().collect()
    }

    fn add_slot(&self, slot: MediaSlot) -> Result<Option<MediaSlot>, GridError> {
        self.write().insert(slot)
    }

    fn remove_slot(&self, key: &SlotKey) -> Option<MediaSlot> {
        self.write().remove(key)
    }

    fn row(&self, row: u32) -> Vec<MediaSlot> {
        self.read().row(row).into_iter().cloned().collect()
    }

    fn trigger_column(&self, column: u32) -> TriggerColumn {
        self.read().trigger_column(column)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::slot::SlotContent;

    fn video(key: SlotKey, path: &str) -> MediaSlot {
        MediaSlot::new(
            key,
            SlotContent::Video {
                path: PathBuf::from(path),
            },
        )
    }

    fn audio(key: SlotKey, path: &str) -> MediaSlot {
        MediaSlot::new(
            key,
            SlotContent::Audio {
                path: PathBuf::from(path),
            },
        )
    }

    #[test]
    fn test_one_slot_per_key() {
        let mut grid = SlotGrid::new();
        assert!(grid.insert(video(SlotKey::grid(0, 0), "a.mp4")).unwrap().is_none());
        let previous = grid.insert(audio(SlotKey::grid(0, 0), "b.mp3")).unwrap();
        assert_eq!(previous.unwrap().kind(), MediaKind::Video);
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn test_row_is_ordered_by_column() {
        let mut grid = SlotGrid::new();
        grid.insert(video(SlotKey::grid(3, 1), "c.mp4")).unwrap();
        grid.insert(video(SlotKey::grid(0, 1), "a.mp4")).unwrap();
        grid.insert(video(SlotKey::grid(1, 2), "x.mp4")).unwrap();
        grid.insert(video(SlotKey::grid(2, 1), "b.mp4")).unwrap();
        grid.insert(video(SlotKey::trigger(1, TriggerLane::Video), "t.mp4"))
            .unwrap();

        let columns: Vec<u32> = grid.row(1).iter().map(|s| s.column()).collect();
        assert_eq!(columns, vec![0, 2, 3]);
    }

    #[test]
    fn test_trigger_lane_kind_is_enforced() {
        let mut grid = SlotGrid::new();
        let err = grid
            .insert(audio(SlotKey::trigger(0, TriggerLane::Video), "bg.mp3"))
            .unwrap_err();
        assert!(matches!(err, GridError::LaneMismatch { .. }));
    }

    #[test]
    fn test_trigger_column_resolution() {
        let mut grid = SlotGrid::new();
        grid.insert(video(SlotKey::trigger(2, TriggerLane::Video), "t.mp4"))
            .unwrap();
        grid.insert(audio(SlotKey::trigger(2, TriggerLane::Audio), "t.mp3"))
            .unwrap();

        let trigger = grid.trigger_column(2);
        assert_eq!(trigger.visual().unwrap().kind(), MediaKind::Video);
        assert!(trigger.audio.is_some());
        assert!(grid.trigger_column(5).is_empty());
        assert_eq!(grid.trigger_columns(), vec![2]);
    }

    #[test]
    fn test_shared_grid_store() {
        let store = SharedGrid::new(SlotGrid::new());
        store.add_slot(audio(SlotKey::grid(0, 0), "bg.mp3")).unwrap();
        store.add_slot(audio(SlotKey::grid(1, 0), "voice.mp3")).unwrap();
        assert_eq!(store.row(0).len(), 2);
        assert!(store.remove_slot(&SlotKey::grid(0, 0)).is_some());
        assert!(store.get_media_slot(&SlotKey::grid(0, 0)).is_none());
        assert_eq!(store.snapshot().len(), 1);
    }
}
