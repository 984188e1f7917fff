use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use cuegrid_playback_engine::MediaStateTracker;
use cuegrid_show_model::SlotKey;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Save(u32, u64),
    Clear(u32),
    Remember(u32, u64),
    Forget(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u32..4, 0u64..600_000).prop_map(|(c, ms)| Op::Save(c, ms)),
        (0u32..4).prop_map(Op::Clear),
        (0u32..4, 0u64..600_000).prop_map(|(c, ms)| Op::Remember(c, ms)),
        (0u32..4).prop_map(Op::Forget),
    ]
}

// Every column's slot plays a file of its own.
fn file(column: u32) -> PathBuf {
    PathBuf::from(format!("clip-{column}.mp4"))
}

proptest! {
    #[test]
    fn slot_positions_read_back_what_was_saved(ops in prop::collection::vec(op(), 0..60)) {
        let mut tracker = MediaStateTracker::<()>::new();
        let mut slots: HashMap<u32, Duration> = HashMap::new();
        let mut files: HashMap<u32, Duration> = HashMap::new();

        for op in &ops {
            match *op {
                Op::Save(c, ms) => {
                    tracker.save_slot_position(SlotKey::grid(c, 0), Duration::from_millis(ms));
                    slots.insert(c, Duration::from_millis(ms));
                }
                Op::Clear(c) => {
                    tracker.clear_slot_position(&SlotKey::grid(c, 0));
                    slots.remove(&c);
                }
                Op::Remember(c, ms) => {
                    tracker.remember_position(SlotKey::grid(c, 0), &file(c), Duration::from_millis(ms));
                    slots.insert(c, Duration::from_millis(ms));
                    files.insert(c, Duration::from_millis(ms));
                }
                Op::Forget(c) => {
                    tracker.forget_position(&SlotKey::grid(c, 0), Some(&file(c)));
                    slots.remove(&c);
                    files.remove(&c);
                }
            }
        }

        for c in 0..4 {
            let key = SlotKey::grid(c, 0);
            let slot = slots.get(&c).copied().unwrap_or_default();
            prop_assert_eq!(tracker.get_slot_position(&key), slot);
            prop_assert_eq!(tracker.get_file_resume_position(&file(c)), files.get(&c).copied());

            // A cold start prefers the slot's own non-zero position.
            let expected = if slot.is_zero() {
                files.get(&c).copied().unwrap_or_default()
            } else {
                slot
            };
            prop_assert_eq!(tracker.resume_position_for(&key, &file(c)), expected);
        }
    }

    #[test]
    fn active_file_registration_is_idempotent(ops in prop::collection::vec((0u8..5, any::<bool>()), 0..50)) {
        let mut tracker = MediaStateTracker::<()>::new();
        let mut expected = std::collections::BTreeSet::new();
        for (n, register) in &ops {
            let path = PathBuf::from(format!("f{n}.mp3"));
            if *register {
                tracker.register_active_file(&path);
                expected.insert(path);
            } else {
                tracker.unregister_active_file(&path);
                expected.remove(&path);
            }
        }
        for n in 0..5u8 {
            let path = PathBuf::from(format!("f{n}.mp3"));
            prop_assert_eq!(tracker.is_file_already_playing(&path), expected.contains(&path));
        }
        prop_assert_eq!(tracker.active_files().count(), expected.len());
    }
}
