//! Create a new show file.

use std::path::PathBuf;

use cuegrid_show_model::{MediaSlot, Show, SlotContent, SlotKey, TextContent, TriggerLane};

pub fn run(name: String, output: PathBuf, sample: bool) -> anyhow::Result<()> {
    let path = output.join(format!("{name}.cuegrid.json"));
    println!("Creating show '{}' at {}", name, path.display());

    let mut show = Show::new(&name);
    if sample {
        for slot in sample_slots() {
            show.grid
                .insert(slot)
                .map_err(|e| anyhow::anyhow!("Failed to place sample slot: {e}"))?;
        }
    }
    show.save(&path)
        .map_err(|e| anyhow::anyhow!("Failed to write show: {e}"))?;

    println!("Show created successfully:");
    println!("  ID: {}", show.id);
    println!("  Version: {}", show.version);
    println!("  Slots: {}", show.grid.len());
    if sample {
        println!();
        println!("Sample media (place these files next to the show):");
        for slot in show.grid.iter() {
            if let Some(path) = slot.media_path() {
                println!("  {} -> {}", slot.key, path.display());
            }
        }
    }

    Ok(())
}

fn sample_slots() -> Vec<MediaSlot> {
    vec![
        MediaSlot::new(
            SlotKey::grid(0, 0),
            SlotContent::Video {
                path: "media/opening.mp4".into(),
            },
        ),
        MediaSlot::new(
            SlotKey::grid(1, 0),
            SlotContent::Image {
                path: "media/title.png".into(),
            },
        ),
        MediaSlot::new(
            SlotKey::grid(2, 0),
            SlotContent::Video {
                path: "media/act-one.mp4".into(),
            },
        ),
        MediaSlot::new(
            SlotKey::grid(3, 0),
            SlotContent::Audio {
                path: "media/theme.mp3".into(),
            },
        ),
        MediaSlot::new(SlotKey::grid(4, 0), SlotContent::Text(TextContent::new("Intermission"))),
        MediaSlot::new(
            SlotKey::trigger(0, TriggerLane::Video),
            SlotContent::Video {
                path: "media/sting.mp4".into(),
            },
        ),
        MediaSlot::new(
            SlotKey::trigger(0, TriggerLane::Audio),
            SlotContent::Audio {
                path: "media/sting.mp3".into(),
            },
        ),
    ]
}
