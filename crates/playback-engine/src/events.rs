//! Events published to the presentation layer.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::broadcast;

use cuegrid_show_model::SlotKey;

use crate::orchestrator::Target;
use crate::timer::TimerKind;
use crate::trigger::TriggerState;

/// User-visible refusal or degradation. Never an error: the show goes on.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// The file is already playing from another slot.
    DuplicateFile { path: PathBuf, holder: SlotKey },
    /// Nothing assigned to activate.
    Empty(Target),
    /// The slot or column changed while its media was being opened.
    Superseded(Target),
    /// The media could not be opened.
    Unplayable { key: SlotKey, message: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::DuplicateFile { path, holder } => {
                write!(f, "{} is already playing in {holder}", path.display())
            }
            Notice::Empty(target) => write!(f, "{target} is empty"),
            Notice::Superseded(target) => write!(f, "{target} changed while loading"),
            Notice::Unplayable { key, message } => write!(f, "{key} cannot be played: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Position label for a timer, e.g. `"01:05 / 03:00"`.
    PositionUpdated {
        timer: TimerKind,
        label: String,
        position: Duration,
        duration: Option<Duration>,
    },
    /// Slider value in `0.0..=1.0`.
    SliderUpdated { timer: TimerKind, fraction: f64 },
    /// What the grid should highlight.
    HighlightingChanged {
        main: Option<SlotKey>,
        audio: Vec<SlotKey>,
        triggers: Vec<(u32, TriggerState)>,
    },
    Notice(Notice),
}

/// Sending half of the event bus. Publishing with no subscribers is fine.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn emit(&self, event: EngineEvent) {
        // No receivers is not an error for the engine.
        let _ = self.tx.send(event);
    }

    pub fn notice(&self, notice: Notice) {
        tracing::info!(%notice, "Playback notice");
        self.emit(EngineEvent::Notice(notice));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(256)
    }
}
