//! Cuegrid Playback Engine
//!
//! Coordinates what plays where when the operator fires a cue. The engine
//! owns the primary visual output, its mirrored secondary, and one audio
//! sink per playing audio slot, and keeps the bookkeeping about them
//! consistent across start, pause, stop, restart, end of media and
//! auto-play chaining.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Engine task                       │
//! │   EngineHandle ──► command queue ──► Orchestrator   │
//! │   (verbs, ticks,                     │   │   │      │
//! │    end of media)                     │   │   │      │
//! │        ┌─────────────────────────────┘   │   └────┐ │
//! │        ▼                                 ▼        ▼ │
//! │  ┌──────────────┐  ┌────────────────┐  ┌─────────┐  │
//! │  │ MediaState   │  │ TriggerState   │  │ AutoPlay│  │
//! │  │ Tracker      │  │ Machine        │  │ Chainer │  │
//! │  └──────┬───────┘  └────────────────┘  └─────────┘  │
//! │         ▼                                           │
//! │  ┌──────────────┐  ┌────────────────┐  ┌─────────┐  │
//! │  │ Primary      │─►│ DualOutput     │  │ Audio   │  │
//! │  │ surface      │  │ Synchronizer   │  │ sinks   │  │
//! │  └──────────────┘  └────────────────┘  └─────────┘  │
//! └──────────────────────────┬──────────────────────────┘
//!                            ▼
//!                  EngineEvent broadcast
//! ```

pub mod autoplay;
pub mod capability;
pub mod dialogs;
pub mod engine;
pub mod events;
pub mod mirror;
pub mod orchestrator;
pub mod state;
pub mod timer;
pub mod trigger;

pub use autoplay::{AutoPlayChainer, ChainSurface};
pub use capability::{Outputs, PlaybackCapability};
pub use dialogs::{Dialogs, Unattended};
pub use engine::{Engine, EngineCommand, EngineConfig, EngineHandle, EngineTask};
pub use events::{EngineEvent, EventSink, Notice};
pub use mirror::{DriftCheck, DualOutputSynchronizer};
pub use orchestrator::{
    Collaborators, Load, Loaded, Loader, Orchestrator, Outcome, PlaybackSnapshot, ProbeRequest,
    Step, Target,
};
pub use state::MediaStateTracker;
pub use timer::{PositionAccessor, PositionService, TickReport, TimerKind, TimerReading};
pub use trigger::{TriggerState, TriggerStateMachine};
