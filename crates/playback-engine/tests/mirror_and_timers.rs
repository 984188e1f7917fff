mod common;

use std::path::{Path, PathBuf};

use common::*;
use cuegrid_output_core::VisualSurface;
use cuegrid_output_headless::SurfaceCall;
use cuegrid_playback_engine::{EngineEvent, Outcome, TimerKind};
use cuegrid_show_model::{PlaybackFlags, SlotKey};

#[tokio::test]
async fn test_secondary_attached_mid_playback_catches_up() {
    let key = SlotKey::grid(0, 0);
    let rig = Rig::new([video(key, "a.mp4")]);
    let mut o = rig.orchestrator(PlaybackFlags::default());
    let secondary = rig.secondary();

    o.activate(key.into()).await.unwrap();
    rig.primary.advance(secs(3));
    o.attach_secondary(Box::new(secondary.clone()));

    assert!(o.snapshot().mirror_attached);
    assert_eq!(secondary.video_source(), Some(PathBuf::from("a.mp4")));
    assert_eq!(secondary.position(), secs(3));
    assert!(secondary.is_playing());
}

#[tokio::test]
async fn test_tick_snaps_drifting_secondary_once() {
    let key = SlotKey::grid(0, 0);
    let rig = Rig::new([video(key, "a.mp4")]);
    let mut o = rig.orchestrator(PlaybackFlags::default());
    let secondary = rig.secondary();

    o.activate(key.into()).await.unwrap();
    o.attach_secondary(Box::new(secondary.clone()));
    secondary.clear_calls();

    // Only the primary clock moves, so the mirror falls behind.
    rig.primary.advance(secs(2));
    let report = o.tick(TimerKind::Video).unwrap();
    assert_eq!(report.label, "00:02 / 00:10");
    assert!((report.fraction - 0.2).abs() < 1e-9);
    assert_eq!(secondary.calls(), vec![SurfaceCall::Seek(secs(2))]);
    assert_eq!(o.outputs().mirror.snaps(), 1);

    o.tick(TimerKind::Video).unwrap();
    assert_eq!(o.outputs().mirror.snaps(), 1);
}

#[tokio::test]
async fn test_mirror_follows_transport_and_clears_on_stop() {
    let key = SlotKey::grid(0, 0);
    let rig = Rig::new([video(key, "a.mp4"), image(SlotKey::grid(1, 0), "still.png")]);
    let mut o = rig.orchestrator(PlaybackFlags::default());
    let secondary = rig.secondary();
    o.attach_secondary(Box::new(secondary.clone()));

    o.activate(key.into()).await.unwrap();
    assert_eq!(secondary.video_source(), Some(PathBuf::from("a.mp4")));
    assert!(secondary.is_playing());

    o.pause(key.into()).unwrap();
    assert!(!secondary.is_playing());

    o.activate(SlotKey::grid(1, 0).into()).await.unwrap();
    assert!(secondary.video_source().is_none());
    assert!(secondary.calls().contains(&SurfaceCall::ShowImage("still.png".into())));
}

#[tokio::test]
async fn test_failing_secondary_never_disturbs_primary() {
    let key = SlotKey::grid(0, 0);
    let rig = Rig::new([video(key, "a.mp4")]);
    let mut o = rig.orchestrator(PlaybackFlags::default());
    let secondary = rig.secondary();
    o.attach_secondary(Box::new(secondary.clone()));
    secondary.set_failing(true);

    assert_eq!(o.activate(key.into()).await.unwrap(), Outcome::Started);
    assert!(rig.primary.is_playing());
    assert!(o.outputs().mirror.failures() > 0);

    let detached = o.detach_secondary();
    assert!(detached.is_some());
    assert!(!o.snapshot().mirror_attached);
}

#[tokio::test]
async fn test_drag_suppresses_ticks_until_release() {
    let key = SlotKey::grid(0, 0);
    let rig = Rig::new([video(key, "a.mp4")]);
    let mut o = rig.orchestrator(PlaybackFlags::default());
    let mut rx = rig.events.subscribe();

    o.activate(key.into()).await.unwrap();
    o.begin_drag(TimerKind::Video);
    assert!(o.is_dragging(TimerKind::Video));
    assert!(o.tick(TimerKind::Video).is_none());

    assert_eq!(o.end_drag(TimerKind::Video, secs(7)).unwrap(), Outcome::Seeked);
    assert_eq!(rig.primary.position(), secs(7));
    let report = o.tick(TimerKind::Video).unwrap();
    assert_eq!(report.label, "00:07 / 00:10");

    let positions: Vec<String> = std::iter::from_fn(|| rx.try_recv().ok())
        .filter_map(|event| match event {
            EngineEvent::PositionUpdated { label, .. } => Some(label),
            _ => None,
        })
        .collect();
    assert_eq!(positions, vec!["00:07 / 00:10".to_string()]);
}

#[tokio::test]
async fn test_audio_timer_tracks_latest_channel() {
    let bg = SlotKey::grid(0, 0);
    let voice = SlotKey::grid(1, 0);
    let rig = Rig::new([audio(bg, "bg.mp3"), audio(voice, "voice.mp3")]);
    let mut o = rig.orchestrator(PlaybackFlags::default());

    assert!(o.tick(TimerKind::Audio).is_none());
    o.activate(bg.into()).await.unwrap();
    o.activate(voice.into()).await.unwrap();
    rig.audio.advance(secs(1));

    let report = o.tick(TimerKind::Audio).unwrap();
    assert_eq!(report.reading.duration, Some(secs(5)));
    assert_eq!(report.label, "00:01 / 00:05");
    assert!(o.tick(TimerKind::Video).is_none());
}

#[tokio::test]
async fn test_seek_paused_audio_updates_resume_point() {
    let bg = SlotKey::grid(0, 0);
    let rig = Rig::new([audio(bg, "bg.mp3")]);
    let mut o = rig.orchestrator(PlaybackFlags::default());

    o.activate(bg.into()).await.unwrap();
    o.pause(bg.into()).unwrap();
    assert_eq!(o.seek(bg.into(), secs(20)).unwrap(), Outcome::Seeked);

    assert_eq!(rig.audio.sink_for(Path::new("bg.mp3")).unwrap().position, secs(20));
    assert_eq!(o.outputs().tracker.get_slot_position(&bg), secs(20));
}
