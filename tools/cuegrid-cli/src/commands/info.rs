//! Show show information.

use std::collections::BTreeSet;
use std::path::PathBuf;

use cuegrid_show_model::{MediaSlot, Show, SlotContent};

pub fn run(path: PathBuf, json: bool) -> anyhow::Result<()> {
    let show = Show::load(&path).map_err(|e| anyhow::anyhow!("Failed to load show: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&show)?);
        return Ok(());
    }

    println!("Show: {}", show.name);
    println!("  ID: {}", show.id);
    println!("  Version: {}", show.version);
    println!("  Created: {}", show.created_at);
    println!("  Modified: {}", show.modified_at);
    println!();

    println!("Playback:");
    println!("  Loop video: {}", show.playback.loop_video);
    println!("  Loop playlist: {}", show.playback.loop_playlist);
    println!("  Auto-play: {}", show.playback.auto_play);
    println!();

    let master = &show.settings.master;
    println!("Master settings:");
    println!(
        "  Volume: {:.2}  Opacity: {:.2}  Scale: {:.2}  Rotation: {:.1}",
        master.volume, master.opacity, master.scale, master.rotation
    );
    println!("  Personal overrides: {}", show.settings.personal.len());
    println!();

    let rows: BTreeSet<u32> = show
        .grid
        .iter()
        .filter(|slot| !slot.key.is_trigger())
        .map(MediaSlot::row)
        .collect();
    println!("Grid ({} slots):", show.grid.len());
    for row in rows {
        println!("  Row {row}:");
        for slot in show.grid.row(row) {
            println!("    {}", describe(slot));
        }
    }

    let columns = show.grid.trigger_columns();
    if !columns.is_empty() {
        println!();
        println!("Trigger columns:");
        for column in columns {
            println!("  Column {column}:");
            let lanes = show.grid.trigger_column(column);
            for slot in [&lanes.video, &lanes.image, &lanes.audio].into_iter().flatten() {
                println!("    {}", describe(slot));
            }
        }
    }

    Ok(())
}

fn describe(slot: &MediaSlot) -> String {
    match &slot.content {
        SlotContent::Text(text) => format!("{}  text  \"{}\"", slot.key, text.text),
        content => format!(
            "{}  {:?}  {} ({})",
            slot.key,
            content.kind(),
            slot.display_name,
            content
                .media_path()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        ),
    }
}
