//! Walk a row of a show through the engine with headless outputs.
//!
//! Media files are never opened: every timed file is assumed to last
//! `clip_secs`, and the simulated clocks report end of media so the
//! auto-play chain can be followed from the terminal.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cuegrid_common::config::AppConfig;
use cuegrid_output_core::{displays_or_default, select_secondary_display};
use cuegrid_output_headless::{HeadlessAudio, HeadlessDevices, HeadlessSurface, MediaLibrary};
use cuegrid_playback_engine::{
    Collaborators, Engine, EngineConfig, EngineEvent, EventSink, Orchestrator, Outputs,
    TimerKind, Unattended,
};
use cuegrid_show_model::{SharedGrid, SharedSettings, Show, SlotContent};
use tokio::sync::broadcast::{self, error::TryRecvError};

const STEP: Duration = Duration::from_millis(250);

pub async fn run(
    config: &AppConfig,
    path: PathBuf,
    row: u32,
    loop_playlist: bool,
    clip_secs: u64,
    max_secs: u64,
) -> anyhow::Result<()> {
    let show = Show::load(&path).map_err(|e| anyhow::anyhow!("Failed to load show: {e}"))?;
    let first = show
        .grid
        .row(row)
        .first()
        .map(|slot| slot.key)
        .ok_or_else(|| anyhow::anyhow!("Row {row} has no slots"))?;

    let clip = Duration::from_secs(clip_secs.max(1));
    let library = MediaLibrary::new();
    for slot in show.grid.iter() {
        match &slot.content {
            SlotContent::Video { path } => {
                library.add_video(path.clone(), clip);
            }
            SlotContent::Audio { path } => {
                library.add_audio(path.clone(), clip);
            }
            SlotContent::Image { path } => {
                library.add_image(path.clone());
            }
            SlotContent::Text(_) => {}
        }
    }

    let primary = HeadlessSurface::new("primary", library.clone());
    let audio = HeadlessAudio::new(library.clone());
    let mut outputs = Outputs::new(
        Box::new(primary.clone()),
        Arc::new(audio.clone()),
        Duration::from_millis(config.playback.drift_threshold_ms),
    );
    outputs.audio_device = config.output.audio_device_index;

    let collaborators = Collaborators {
        store: Arc::new(SharedGrid::new(show.grid.clone())),
        settings: Arc::new(SharedSettings::new(show.settings.clone())),
        probe: Arc::new(library.clone()),
        dialogs: Arc::new(Unattended),
    };
    let mut flags = show.playback;
    flags.auto_play = true;
    flags.loop_playlist |= loop_playlist;

    let orchestrator = Orchestrator::new(collaborators, outputs, flags, EventSink::new(1024));
    let (handle, task) = Engine::spawn(orchestrator, EngineConfig::manual());
    let mut events = handle.subscribe();

    let displays = displays_or_default(&HeadlessDevices::dual_display());
    let secondary = match select_secondary_display(&displays, config.output.secondary_display_index)
    {
        Some(display) => {
            println!("Mirroring to display #{} ({})", display.index, display.name);
            let surface = HeadlessSurface::new("secondary", library.clone());
            handle.attach_secondary(Box::new(surface.clone())).await?;
            Some(surface)
        }
        None => None,
    };

    println!(
        "Rehearsing '{}' row {} ({}s per clip{})",
        show.name,
        row,
        clip.as_secs(),
        if flags.loop_playlist { ", looping" } else { "" }
    );
    println!("{}", "=".repeat(50));

    let outcome = handle.activate(first).await?;
    println!("[00:00] {first}: {outcome:?}");

    let limit = Duration::from_secs(max_secs);
    let mut elapsed = Duration::ZERO;
    loop {
        let snapshot = handle.snapshot().await?;
        print_events(&mut events, elapsed);
        if snapshot.active_files.is_empty() {
            println!("\nNothing left playing after {}s.", elapsed.as_secs());
            break;
        }
        if elapsed >= limit {
            println!("\nStopping after {}s of simulated time.", elapsed.as_secs());
            break;
        }

        elapsed += STEP;
        if let Some(surface) = &secondary {
            surface.advance(STEP);
        }
        if primary.advance(STEP) {
            handle.primary_ended().await?;
        }
        for container in audio.advance(STEP) {
            handle.audio_ended(container).await?;
        }
        if elapsed.subsec_millis() == 0 {
            handle.post_tick(TimerKind::Video);
            handle.post_tick(TimerKind::Audio);
        }
    }

    handle.stop_all().await?;
    handle.snapshot().await?;
    print_events(&mut events, elapsed);
    task.shutdown().await?;

    Ok(())
}

fn print_events(events: &mut broadcast::Receiver<EngineEvent>, at: Duration) {
    let stamp = cuegrid_common::clock::format_timestamp(at, false);
    loop {
        match events.try_recv() {
            Ok(EngineEvent::HighlightingChanged {
                main,
                audio,
                triggers,
            }) => {
                let main = main.map(|k| k.to_string()).unwrap_or_else(|| "-".into());
                let audio: Vec<String> = audio.iter().map(ToString::to_string).collect();
                print!("[{stamp}] main: {main}  audio: [{}]", audio.join(", "));
                if !triggers.is_empty() {
                    print!("  triggers: {triggers:?}");
                }
                println!();
            }
            Ok(EngineEvent::PositionUpdated { timer, label, .. }) => {
                tracing::debug!(?timer, %label, "Position");
            }
            Ok(EngineEvent::SliderUpdated { .. }) => {}
            Ok(EngineEvent::Notice(notice)) => println!("[{stamp}] [WARN] {notice}"),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event printer fell behind");
            }
            Err(_) => break,
        }
    }
}
