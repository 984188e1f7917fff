#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cuegrid_output_headless::{HeadlessAudio, HeadlessSurface, MediaLibrary};
use cuegrid_playback_engine::{
    Collaborators, Dialogs, EngineEvent, EventSink, Notice, Orchestrator, Outputs, Target,
};
use cuegrid_show_model::{
    MediaSlot, PlaybackFlags, SettingsManager, SharedGrid, SharedSettings, SlotContent, SlotGrid,
    SlotKey, TextContent, TriggerLane,
};
use tokio::sync::{broadcast, Notify};

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

pub fn video(key: SlotKey, path: &str) -> MediaSlot {
    MediaSlot::new(key, SlotContent::Video { path: path.into() })
}

pub fn audio(key: SlotKey, path: &str) -> MediaSlot {
    MediaSlot::new(key, SlotContent::Audio { path: path.into() })
}

pub fn image(key: SlotKey, path: &str) -> MediaSlot {
    MediaSlot::new(key, SlotContent::Image { path: path.into() })
}

pub fn text(key: SlotKey, body: &str) -> MediaSlot {
    MediaSlot::new(key, SlotContent::Text(TextContent::new(body)))
}

pub fn lane(column: u32, lane: TriggerLane) -> SlotKey {
    SlotKey::trigger(column, lane)
}

/// Operator prompts answered from a script.
#[derive(Debug, Default)]
pub struct ScriptedDialogs {
    picks: Mutex<VecDeque<SlotContent>>,
    decline_delete: AtomicBool,
    hold: AtomicBool,
    release: Notify,
    asked: AtomicUsize,
}

impl ScriptedDialogs {
    pub fn queue_pick(&self, content: SlotContent) {
        self.picks.lock().unwrap().push_back(content);
    }

    pub fn decline_deletes(&self) {
        self.decline_delete.store(true, Ordering::SeqCst);
    }

    /// Keep the asset picker open until [`release_picks`](Self::release_picks).
    pub fn hold_picks(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release_picks(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    /// How many times the asset picker was opened.
    pub fn picks_asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Dialogs for ScriptedDialogs {
    async fn pick_asset(&self, _key: SlotKey) -> Option<SlotContent> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        if self.hold.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        self.picks.lock().unwrap().pop_front()
    }

    async fn confirm_delete(&self, _target: Target) -> bool {
        !self.decline_delete.load(Ordering::SeqCst)
    }
}

/// Headless outputs, a shared grid and a scripted operator.
pub struct Rig {
    pub library: MediaLibrary,
    pub primary: HeadlessSurface,
    pub audio: HeadlessAudio,
    pub store: Arc<SharedGrid>,
    pub settings: Arc<SharedSettings>,
    pub dialogs: Arc<ScriptedDialogs>,
    pub events: EventSink,
}

impl Rig {
    pub fn new(slots: impl IntoIterator<Item = MediaSlot>) -> Self {
        let library = MediaLibrary::new();
        library
            .add_video("a.mp4", secs(10))
            .add_video("b.mp4", secs(10))
            .add_video("c.mp4", secs(10))
            .add_audio("bg.mp3", secs(60))
            .add_audio("voice.mp3", secs(5))
            .add_image("still.png");

        let mut grid = SlotGrid::new();
        for slot in slots {
            grid.insert(slot).unwrap();
        }

        Self {
            primary: HeadlessSurface::new("primary", library.clone()),
            audio: HeadlessAudio::new(library.clone()),
            store: Arc::new(SharedGrid::new(grid)),
            settings: Arc::new(SharedSettings::new(SettingsManager::new())),
            dialogs: Arc::new(ScriptedDialogs::default()),
            events: EventSink::new(1024),
            library,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn orchestrator(&self, flags: PlaybackFlags) -> Orchestrator {
        let outputs = Outputs::new(
            Box::new(self.primary.clone()),
            Arc::new(self.audio.clone()),
            Duration::from_millis(100),
        );
        let collaborators = Collaborators {
            store: self.store.clone(),
            settings: self.settings.clone(),
            probe: Arc::new(self.library.clone()),
            dialogs: self.dialogs.clone(),
        };
        Orchestrator::new(collaborators, outputs, flags, self.events.clone())
    }

    pub fn secondary(&self) -> HeadlessSurface {
        HeadlessSurface::new("secondary", self.library.clone())
    }
}

pub fn flags(loop_video: bool, loop_playlist: bool, auto_play: bool) -> PlaybackFlags {
    PlaybackFlags {
        loop_video,
        loop_playlist,
        auto_play,
    }
}

/// Notices received so far.
pub fn drain_notices(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<Notice> {
    let mut notices = vec![];
    while let Ok(event) = rx.try_recv() {
        if let EngineEvent::Notice(notice) = event {
            notices.push(notice);
        }
    }
    notices
}
