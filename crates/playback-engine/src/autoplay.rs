//! Auto-play chaining along a grid row.

use std::collections::HashSet;

use cuegrid_show_model::{MediaSlot, SlotKey};

/// Output a chain runs on. A chain on one surface must not start another
/// chain on the same surface before it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainSurface {
    Primary,
    Audio,
}

#[derive(Debug, Default)]
pub struct AutoPlayChainer {
    in_progress: HashSet<ChainSurface>,
}

impl AutoPlayChainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `surface` for a chain step. Returns `false` when a step is
    /// already running there.
    pub fn begin(&mut self, surface: ChainSurface) -> bool {
        let claimed = self.in_progress.insert(surface);
        if !claimed {
            tracing::debug!(?surface, "Auto-play already in progress");
        }
        claimed
    }

    pub fn finish(&mut self, surface: ChainSurface) {
        self.in_progress.remove(&surface);
    }

    pub fn is_chaining(&self, surface: ChainSurface) -> bool {
        self.in_progress.contains(&surface)
    }
}

/// Pick the slot to start after `ended` finished.
///
/// Looks right of `ended` in its row first. With `wrap`, falls back to the
/// first eligible slot of the row, which may be `ended` itself.
pub fn next_in_row(
    row: &[MediaSlot],
    ended: SlotKey,
    wrap: bool,
    eligible: impl Fn(&MediaSlot) -> bool,
) -> Option<SlotKey> {
    let mut ordered: Vec<&MediaSlot> = row.iter().filter(|s| s.row() == ended.row).collect();
    ordered.sort_by_key(|s| s.column());

    let after = ordered
        .iter()
        .filter(|s| s.column() > ended.column)
        .find(|s| eligible(s))
        .map(|s| s.key);
    if after.is_some() || !wrap {
        return after;
    }
    ordered.iter().find(|s| eligible(s)).map(|s| s.key)
}

#[cfg(test)]
mod tests {
    use cuegrid_show_model::SlotContent;

    use super::*;

    fn row() -> Vec<MediaSlot> {
        [(0, "a.mp4"), (1, "b.mp4"), (3, "c.mp4")]
            .into_iter()
            .map(|(column, path)| {
                MediaSlot::new(
                    SlotKey::grid(column, 0),
                    SlotContent::Video { path: path.into() },
                )
            })
            .collect()
    }

    #[test]
    fn test_next_skips_gaps() {
        let next = next_in_row(&row(), SlotKey::grid(1, 0), false, |_| true);
        assert_eq!(next, Some(SlotKey::grid(3, 0)));
    }

    #[test]
    fn test_last_slot_stops_without_wrap() {
        assert_eq!(next_in_row(&row(), SlotKey::grid(3, 0), false, |_| true), None);
    }

    #[test]
    fn test_last_slot_wraps_to_first_eligible() {
        let next = next_in_row(&row(), SlotKey::grid(3, 0), true, |s| s.column() != 0);
        assert_eq!(next, Some(SlotKey::grid(1, 0)));
    }

    #[test]
    fn test_blocked_slots_are_skipped() {
        let next = next_in_row(&row(), SlotKey::grid(0, 0), false, |s| s.column() != 1);
        assert_eq!(next, Some(SlotKey::grid(3, 0)));
    }

    #[test]
    fn test_guard_is_per_surface() {
        let mut chainer = AutoPlayChainer::new();
        assert!(chainer.begin(ChainSurface::Primary));
        assert!(!chainer.begin(ChainSurface::Primary));
        assert!(chainer.begin(ChainSurface::Audio));
        chainer.finish(ChainSurface::Primary);
        assert!(!chainer.is_chaining(ChainSurface::Primary));
        assert!(chainer.begin(ChainSurface::Primary));
    }
}
