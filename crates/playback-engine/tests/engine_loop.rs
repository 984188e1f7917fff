mod common;

use std::time::Duration;

use common::*;
use cuegrid_common::error::CueError;
use cuegrid_playback_engine::{
    Engine, EngineConfig, EngineEvent, Notice, Outcome, Target, TimerKind,
};
use cuegrid_show_model::{PlaybackFlags, SlotContent, SlotKey, SlotStore};

fn position_labels(rx: &mut tokio::sync::broadcast::Receiver<EngineEvent>) -> Vec<String> {
    std::iter::from_fn(|| rx.try_recv().ok())
        .filter_map(|event| match event {
            EngineEvent::PositionUpdated { label, .. } => Some(label),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_verbs_and_end_reports_go_through_one_queue() {
    let key = SlotKey::grid(0, 0);
    let rig = Rig::new([video(key, "a.mp4")]);
    let (handle, task) = Engine::spawn(
        rig.orchestrator(PlaybackFlags::default()),
        EngineConfig::manual(),
    );

    assert_eq!(handle.activate(key).await.unwrap(), Outcome::Started);
    rig.primary.advance(secs(10));
    handle.primary_ended().await.unwrap();

    // The snapshot is answered after the end report was handled.
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.main.is_none());
    assert!(snapshot.active_files.is_empty());

    task.shutdown().await.unwrap();
    assert!(matches!(handle.snapshot().await, Err(CueError::EngineStopped)));
    assert!(!handle.post_tick(TimerKind::Video));
}

#[tokio::test]
async fn test_concurrent_clients_are_serialized() {
    let bg = SlotKey::grid(0, 0);
    let voice = SlotKey::grid(1, 0);
    let rig = Rig::new([audio(bg, "bg.mp3"), audio(voice, "voice.mp3")]);
    let (handle, task) = Engine::spawn(
        rig.orchestrator(PlaybackFlags::default()),
        EngineConfig::manual(),
    );

    let first = tokio::spawn({
        let handle = handle.clone();
        async move { handle.activate(bg).await }
    });
    let second = tokio::spawn({
        let handle = handle.clone();
        async move { handle.activate(voice).await }
    });
    assert_eq!(first.await.unwrap().unwrap(), Outcome::Started);
    assert_eq!(second.await.unwrap().unwrap(), Outcome::Started);

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.audio, vec![(bg, false), (voice, false)]);
    assert_eq!(rig.audio.sinks().len(), 2);

    task.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_ticks_are_suppressed_while_dragging() {
    let key = SlotKey::grid(0, 0);
    let rig = Rig::new([video(key, "a.mp4")]);
    let (handle, task) = Engine::spawn(
        rig.orchestrator(PlaybackFlags::default()),
        EngineConfig::manual(),
    );
    handle.activate(key).await.unwrap();
    let mut rx = handle.subscribe();

    handle.begin_drag(TimerKind::Video).await.unwrap();
    assert!(handle.post_tick(TimerKind::Video));
    handle.snapshot().await.unwrap();
    assert!(position_labels(&mut rx).is_empty());

    assert_eq!(
        handle.end_drag(TimerKind::Video, secs(5)).await.unwrap(),
        Outcome::Seeked
    );
    assert!(handle.post_tick(TimerKind::Video));
    handle.snapshot().await.unwrap();
    assert_eq!(position_labels(&mut rx), vec!["00:05 / 00:10".to_string()]);

    task.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_background_ticker_publishes_positions() {
    let key = SlotKey::grid(0, 0);
    let rig = Rig::new([video(key, "a.mp4")]);
    let config = EngineConfig {
        video_tick: Some(Duration::from_millis(10)),
        audio_tick: None,
        queue_depth: 16,
    };
    let (handle, task) = Engine::spawn(rig.orchestrator(PlaybackFlags::default()), config);
    let mut rx = handle.subscribe();

    handle.activate(key).await.unwrap();
    rig.primary.advance(secs(1));

    let seen = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(EngineEvent::PositionUpdated { label, .. }) = rx.recv().await {
                if label == "00:01 / 00:10" {
                    return label;
                }
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(seen, "00:01 / 00:10");

    task.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_flags_and_secondary_through_handle() {
    let key = SlotKey::grid(0, 0);
    let rig = Rig::new([video(key, "a.mp4")]);
    let (handle, task) = Engine::spawn(
        rig.orchestrator(PlaybackFlags::default()),
        EngineConfig::manual(),
    );

    handle.set_flags(flags(true, false, true)).await.unwrap();
    handle
        .attach_secondary(Box::new(rig.secondary()))
        .await
        .unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.flags.loop_video);
    assert!(snapshot.mirror_attached);

    assert!(handle.detach_secondary().await.unwrap().is_some());
    assert!(!handle.snapshot().await.unwrap().mirror_attached);

    task.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_open_asset_picker_does_not_block_other_commands() {
    let clip = SlotKey::grid(0, 0);
    let empty = SlotKey::grid(1, 0);
    let rig = Rig::new([video(clip, "a.mp4")]);
    rig.dialogs.hold_picks();
    rig.dialogs.queue_pick(SlotContent::Audio {
        path: "bg.mp3".into(),
    });
    let (handle, task) = Engine::spawn(
        rig.orchestrator(PlaybackFlags::default()),
        EngineConfig::manual(),
    );
    assert_eq!(handle.activate(clip).await.unwrap(), Outcome::Started);

    let picking = tokio::spawn({
        let handle = handle.clone();
        async move { handle.activate(empty).await }
    });
    tokio::time::timeout(Duration::from_secs(2), async {
        while rig.dialogs.picks_asked() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();

    // The picker is still open; the engine keeps serving everyone else.
    let stopped = tokio::time::timeout(Duration::from_secs(2), handle.stop(clip))
        .await
        .unwrap();
    assert_eq!(stopped.unwrap(), Outcome::Stopped);
    assert!(!picking.is_finished());

    rig.dialogs.release_picks();
    assert_eq!(picking.await.unwrap().unwrap(), Outcome::Assigned);
    assert!(rig.store.get_media_slot(&empty).is_some());

    task.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_slow_file_check_does_not_block_snapshots() {
    let clip = SlotKey::grid(0, 0);
    let rig = Rig::new([video(clip, "a.mp4")]);
    rig.library.set_probe_delay(secs(5));
    let (handle, task) = Engine::spawn(
        rig.orchestrator(PlaybackFlags::default()),
        EngineConfig::manual(),
    );

    let starting = tokio::spawn({
        let handle = handle.clone();
        async move { handle.activate(clip).await }
    });
    tokio::task::yield_now().await;

    let snapshot = tokio::time::timeout(Duration::from_secs(1), handle.snapshot())
        .await
        .unwrap()
        .unwrap();
    assert!(snapshot.main.is_none());
    assert!(!starting.is_finished());

    // Shutting down abandons the pending start.
    task.shutdown().await.unwrap();
    assert!(matches!(
        starting.await.unwrap(),
        Err(CueError::EngineStopped)
    ));
}

#[tokio::test]
async fn test_second_activate_during_load_is_superseded() {
    let clip = SlotKey::grid(0, 0);
    let rig = Rig::new([video(clip, "a.mp4")]);
    rig.library.set_probe_delay(Duration::from_millis(50));
    let (handle, task) = Engine::spawn(
        rig.orchestrator(PlaybackFlags::default()),
        EngineConfig::manual(),
    );
    let mut rx = handle.subscribe();

    let first = tokio::spawn({
        let handle = handle.clone();
        async move { handle.activate(clip).await }
    });
    let second = tokio::spawn({
        let handle = handle.clone();
        async move { handle.activate(clip).await }
    });
    let outcomes = [first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];

    let superseded = Outcome::Refused(Notice::Superseded(Target::Slot(clip)));
    assert!(outcomes.contains(&Outcome::Started));
    assert!(outcomes.contains(&superseded));
    assert!(drain_notices(&mut rx).contains(&Notice::Superseded(Target::Slot(clip))));

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.main, Some(clip));
    assert_eq!(snapshot.active_files.len(), 1);

    task.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_lost_primary_fails_the_verb_but_not_the_engine() {
    let key = SlotKey::grid(0, 0);
    let rig = Rig::new([video(key, "a.mp4")]);
    rig.primary.set_failing(true);
    let (handle, task) = Engine::spawn(
        rig.orchestrator(PlaybackFlags::default()),
        EngineConfig::manual(),
    );

    let err = handle.activate(key).await.unwrap_err();
    assert!(matches!(err, CueError::Surface { .. }));
    assert!(err.is_transient());

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.main.is_none());
    assert!(snapshot.active_files.is_empty());

    task.shutdown().await.unwrap();
}
