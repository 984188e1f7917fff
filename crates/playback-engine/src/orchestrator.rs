//! Playback orchestration: the verbs the operator fires.
//!
//! The orchestrator is the single mutator of playback state. It resolves a
//! target, decides between cold start and toggle, applies the duplicate-file
//! rule, and dispatches to the per-kind [`PlaybackCapability`].
//!
//! Verbs never await. Whatever needs a media probe or an operator prompt
//! returns a [`Step::Pending`] carrying a [`Load`]; the caller runs it with a
//! [`Loader`] and hands the [`Loaded`] result to [`Orchestrator::complete`],
//! which checks that the target is still what it was before applying it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use cuegrid_common::error::{CueError, CueResult};
use cuegrid_output_core::{ContainerId, MediaProbe, VisualSurface};
use cuegrid_show_model::{
    ElementSettings, MediaKind, MediaSlot, PlaybackFlags, SettingsSource, SlotContent, SlotKey,
    SlotStore, TriggerColumn, TriggerLane,
};
use crate::autoplay::{next_in_row, AutoPlayChainer, ChainSurface};
use crate::capability::{capability_for, AudioPlayback, Outputs, PlaybackCapability};
use crate::dialogs::Dialogs;
use crate::events::{EngineEvent, EventSink, Notice};
use crate::mirror::DriftCheck;
use crate::timer::{PositionAccessor, PositionService, TickReport, TimerKind, TimerReading};
use crate::trigger::{TriggerState, TriggerStateMachine};

/// What a verb is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Slot(SlotKey),
    Trigger(u32),
}

impl From<SlotKey> for Target {
    fn from(key: SlotKey) -> Self {
        match key.trigger_column() {
            Some(column) => Target::Trigger(column),
            None => Target::Slot(key),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Slot(key) => write!(f, "{key}"),
            Target::Trigger(column) => write!(f, "trigger column {column}"),
        }
    }
}

/// Result of a verb.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Started,
    Paused,
    Resumed,
    Stopped,
    Restarted,
    Looped,
    Assigned,
    Deleted,
    Seeked,
    SettingsApplied,
    /// Refused for a reason the operator can act on.
    Refused(Notice),
    /// Nothing to do; stale or redundant request.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartMode {
    /// Honor the duplicate rule and cached positions.
    Resume,
    /// Take the file over from any other holder and play from zero.
    FromZero,
}

/// Work a verb hands off before it can finish.
#[derive(Debug, Clone)]
pub enum Load {
    PickAsset(SlotKey),
    ConfirmDelete(Target),
    Probe(ProbeRequest),
}

impl Load {
    pub fn target(&self) -> Target {
        match self {
            Load::PickAsset(key) => Target::Slot(*key),
            Load::ConfirmDelete(target) => *target,
            Load::Probe(request) => request.target(),
        }
    }
}

/// A cold start waiting on its files being probed.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    start: Starting,
    mode: StartMode,
    chain: Option<ChainSurface>,
}

#[derive(Debug, Clone)]
enum Starting {
    Slot(MediaSlot),
    Column(u32, TriggerColumn),
}

impl ProbeRequest {
    pub fn target(&self) -> Target {
        match &self.start {
            Starting::Slot(slot) => Target::Slot(slot.key),
            Starting::Column(column, _) => Target::Trigger(*column),
        }
    }

    /// Slots whose files get probed, visual lane first.
    pub fn slots(&self) -> Vec<&MediaSlot> {
        match &self.start {
            Starting::Slot(slot) => vec![slot],
            Starting::Column(_, lanes) => {
                lanes.visual().into_iter().chain(lanes.audio.as_ref()).collect()
            }
        }
    }

    fn needs_probe(&self) -> bool {
        self.slots().iter().any(|s| s.media_path().is_some())
    }
}

/// Result of a [`Load`].
#[derive(Debug)]
pub enum Loaded {
    Asset {
        key: SlotKey,
        /// `None` when the operator cancelled.
        content: Option<SlotContent>,
    },
    DeleteConfirmed {
        target: Target,
        confirmed: bool,
    },
    Probed {
        request: ProbeRequest,
        /// First file that failed to probe.
        refusal: Option<Notice>,
    },
}

/// How far a verb got without awaiting.
#[derive(Debug)]
pub enum Step {
    Done(Outcome),
    /// No outcome until the load completes.
    Pending(Load),
    /// The verb is done; the auto-play start it kicked off waits on the load.
    Continue(Outcome, Load),
}

impl Step {
    fn chained(outcome: Outcome, load: Option<Load>) -> Self {
        match load {
            Some(load) => Step::Continue(outcome, load),
            None => Step::Done(outcome),
        }
    }
}

/// Runs [`Load`]s. Holds no playback state, so it can run on any task.
#[derive(Clone)]
pub struct Loader {
    probe: Arc<dyn MediaProbe>,
    dialogs: Arc<dyn Dialogs>,
}

impl Loader {
    pub async fn run(&self, load: Load) -> Loaded {
        match load {
            Load::PickAsset(key) => Loaded::Asset {
                key,
                content: self.dialogs.pick_asset(key).await,
            },
            Load::ConfirmDelete(target) => Loaded::DeleteConfirmed {
                target,
                confirmed: self.dialogs.confirm_delete(target).await,
            },
            Load::Probe(request) => {
                let refusal = probe_all(self.probe.as_ref(), request.slots()).await;
                Loaded::Probed { request, refusal }
            }
        }
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader").finish_non_exhaustive()
    }
}

/// Point-in-time view of playback state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackSnapshot {
    pub main: Option<SlotKey>,
    pub visual: Option<SlotKey>,
    pub video_paused: bool,
    /// Audio channels and whether each is paused.
    pub audio: Vec<(SlotKey, bool)>,
    pub active_files: Vec<PathBuf>,
    pub triggers: Vec<(u32, TriggerState)>,
    pub active_column: Option<u32>,
    pub last_used_column: Option<u32>,
    pub flags: PlaybackFlags,
    pub mirror_attached: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct Highlight {
    main: Option<SlotKey>,
    audio: Vec<SlotKey>,
    triggers: Vec<(u32, TriggerState)>,
}

/// Collaborators the orchestrator reads from or prompts.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn SlotStore>,
    pub settings: Arc<dyn SettingsSource>,
    pub probe: Arc<dyn MediaProbe>,
    pub dialogs: Arc<dyn Dialogs>,
}

pub struct Orchestrator {
    store: Arc<dyn SlotStore>,
    settings: Arc<dyn SettingsSource>,
    loader: Loader,
    outputs: Outputs,
    triggers: TriggerStateMachine,
    chainer: AutoPlayChainer,
    positions: PositionService,
    flags: PlaybackFlags,
    events: EventSink,
    highlight: Option<Highlight>,
}

impl Orchestrator {
    pub fn new(
        collaborators: Collaborators,
        outputs: Outputs,
        flags: PlaybackFlags,
        events: EventSink,
    ) -> Self {
        Self {
            store: collaborators.store,
            settings: collaborators.settings,
            loader: Loader {
                probe: collaborators.probe,
                dialogs: collaborators.dialogs,
            },
            outputs,
            triggers: TriggerStateMachine::new(),
            chainer: AutoPlayChainer::new(),
            positions: PositionService::new(),
            flags,
            events,
            highlight: None,
        }
    }

    pub fn loader(&self) -> Loader {
        self.loader.clone()
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    pub fn triggers(&self) -> &TriggerStateMachine {
        &self.triggers
    }

    pub fn flags(&self) -> PlaybackFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: PlaybackFlags) {
        tracing::info!(?flags, "Playback flags changed");
        self.flags = flags;
    }

    pub fn is_dragging(&self, timer: TimerKind) -> bool {
        self.positions.is_dragging(timer)
    }

    // Verbs

    /// Fire a slot or trigger column: cold start when idle, toggle when
    /// active, prompt for an asset when empty.
    pub fn begin_activate(&mut self, target: Target) -> CueResult<Step> {
        let result = match normalize(target) {
            Target::Slot(key) => self.activate_slot(key, None),
            Target::Trigger(column) => self.activate_trigger(column),
        };
        self.settle();
        result
    }

    /// [`begin_activate`](Self::begin_activate), running any load inline.
    pub async fn activate(&mut self, target: Target) -> CueResult<Outcome> {
        let step = self.begin_activate(target)?;
        self.drive(step).await
    }

    pub fn pause(&mut self, target: Target) -> CueResult<Outcome> {
        let result = match normalize(target) {
            Target::Slot(key) => self
                .pause_key(&key)
                .map(|paused| if paused { Outcome::Paused } else { Outcome::Unchanged }),
            Target::Trigger(column) if self.triggers.state(column) == TriggerState::Playing => {
                self.pause_trigger(column)
            }
            Target::Trigger(_) => Ok(Outcome::Unchanged),
        };
        self.settle();
        result
    }

    /// Reload from zero regardless of state. Skips the duplicate rule: a
    /// file held elsewhere is taken over.
    pub fn begin_restart(&mut self, target: Target) -> CueResult<Step> {
        let result = match normalize(target) {
            Target::Slot(key) => self.restart_slot(key),
            Target::Trigger(column) => self.restart_trigger(column),
        };
        self.settle();
        result
    }

    pub async fn restart(&mut self, target: Target) -> CueResult<Outcome> {
        let step = self.begin_restart(target)?;
        self.drive(step).await
    }

    pub fn stop(&mut self, target: Target) -> CueResult<Outcome> {
        let result = match normalize(target) {
            Target::Slot(key) => self
                .stop_key(&key)
                .map(|stopped| if stopped { Outcome::Stopped } else { Outcome::Unchanged }),
            Target::Trigger(column) => self.stop_trigger(column),
        };
        self.settle();
        result
    }

    /// Remove a slot (or every lane of a trigger column) once the operator
    /// confirms.
    pub fn begin_delete(&mut self, target: Target) -> CueResult<Step> {
        let target = normalize(target);
        if self.nothing_to_delete(target) {
            return Ok(Step::Done(Outcome::Unchanged));
        }
        Ok(Step::Pending(Load::ConfirmDelete(target)))
    }

    pub async fn delete(&mut self, target: Target) -> CueResult<Outcome> {
        let step = self.begin_delete(target)?;
        self.drive(step).await
    }

    /// Apply the result of a [`Load`]. The target may have changed while the
    /// load ran; a start that no longer applies is refused as superseded.
    pub fn complete(&mut self, loaded: Loaded) -> CueResult<Outcome> {
        let result = match loaded {
            Loaded::Asset { key, content } => self.assign(key, content),
            Loaded::DeleteConfirmed { target, confirmed } => self.finish_delete(target, confirmed),
            Loaded::Probed { request, refusal } => {
                let chain = request.chain;
                let result = match refusal {
                    Some(notice) => Ok(self.refuse(notice)),
                    None => self.start(request),
                };
                if let Some(surface) = chain {
                    self.chainer.finish(surface);
                }
                result
            }
        };
        self.settle();
        result
    }

    /// Run a step's load on the calling task and complete it.
    pub async fn drive(&mut self, step: Step) -> CueResult<Outcome> {
        match step {
            Step::Done(outcome) => Ok(outcome),
            Step::Pending(load) => {
                let loaded = self.loader.run(load).await;
                self.complete(loaded)
            }
            Step::Continue(outcome, load) => {
                let loaded = self.loader.run(load).await;
                self.complete(loaded)?;
                Ok(outcome)
            }
        }
    }

    /// Move a playing or paused video/audio to `position`.
    pub fn seek(&mut self, target: Target, position: Duration) -> CueResult<Outcome> {
        let key = match normalize(target) {
            Target::Slot(key) => Some(key),
            Target::Trigger(column) => self.trigger_live_key(column),
        };
        let result = match key {
            Some(key) => self.seek_key(&key, position),
            None => Ok(Outcome::Unchanged),
        };
        self.settle();
        result
    }

    /// Re-apply element settings to a live surface.
    pub fn apply_settings(&mut self, key: SlotKey) -> CueResult<Outcome> {
        let settings = self.settings.final_settings(&key);
        let result = match self.live_kind(&key) {
            Some(MediaKind::Video | MediaKind::Image) => {
                self.outputs.mirror.apply_settings(&settings);
                self.outputs
                    .primary
                    .apply_settings(&settings)
                    .map(|()| Outcome::SettingsApplied)
            }
            Some(MediaKind::Audio) => match self.outputs.tracker.audio_channel_mut(&key) {
                Some(sink) => sink
                    .apply_settings(&settings)
                    .map(|()| Outcome::SettingsApplied),
                None => Ok(Outcome::Unchanged),
            },
            Some(MediaKind::Text) | None => Ok(Outcome::Unchanged),
        };
        if matches!(result, Ok(Outcome::SettingsApplied)) {
            tracing::debug!(slot = %key, ?settings, "Applied element settings");
        }
        result
    }

    /// Panic button: stop every channel and clear the primary. Resume
    /// positions are kept.
    pub fn stop_all(&mut self) -> CueResult<Outcome> {
        tracing::info!("Stopping all playback");
        let mut result = Ok(());
        for key in self.outputs.tracker.audio_keys() {
            result = result.and(AudioPlayback.stop(&mut self.outputs, &key));
        }
        if let Some(main) = self.outputs.tracker.main_occupant().cloned() {
            result = result.and(capability_for(main.kind).stop(&mut self.outputs, &main.key));
        }
        self.triggers.stop_all();
        self.settle();
        result.map(|()| Outcome::Stopped)
    }

    pub fn begin_drag(&mut self, timer: TimerKind) {
        self.positions.begin_drag(timer);
    }

    /// Slider released: seek whatever the timer tracks.
    pub fn end_drag(&mut self, timer: TimerKind, position: Duration) -> CueResult<Outcome> {
        self.positions.end_drag(timer);
        let key = match timer {
            TimerKind::Video => self
                .outputs
                .tracker
                .main_occupant()
                .filter(|m| m.kind == MediaKind::Video)
                .map(|m| m.key),
            TimerKind::Audio => self.tracked_audio_key(),
        };
        match key {
            Some(key) => self.seek_key(&key, position),
            None => Ok(Outcome::Unchanged),
        }
    }

    pub fn attach_secondary(&mut self, surface: Box<dyn VisualSurface>) {
        let main = self.outputs.tracker.main_occupant().cloned();
        let playing = main.as_ref().is_some_and(|m| m.kind == MediaKind::Video)
            && !self.outputs.tracker.is_video_paused();
        let settings = main
            .as_ref()
            .map(|m| self.settings.final_settings(&m.key))
            .unwrap_or_default();
        self.outputs.mirror.attach(
            surface,
            self.outputs.primary.as_ref(),
            playing,
            self.outputs.overlay.as_ref(),
            &settings,
        );
    }

    pub fn detach_secondary(&mut self) -> Option<Box<dyn VisualSurface>> {
        self.outputs.mirror.detach()
    }

    // Timers and end-of-media

    /// One timer tick: publish the position and, for video, keep the
    /// secondary in step.
    pub fn tick(&mut self, timer: TimerKind) -> Option<TickReport> {
        let report = self.positions.tick(timer, &self.outputs)?;
        for event in report.events() {
            self.events.emit(event);
        }
        if timer == TimerKind::Video {
            let source = self.outputs.primary_source();
            let position = self.outputs.primary.position();
            if let DriftCheck::Snapped { drift_ms } =
                self.outputs.mirror.check_drift(source.as_deref(), position)
            {
                tracing::debug!(drift_ms, "Secondary output resynchronized");
            }
        }
        Some(report)
    }

    /// The primary surface reached the end of its video.
    pub fn begin_primary_ended(&mut self) -> CueResult<Step> {
        let result = self.handle_primary_ended();
        self.settle();
        result
    }

    pub async fn primary_ended(&mut self) -> CueResult<Outcome> {
        let step = self.begin_primary_ended()?;
        self.drive(step).await
    }

    /// An audio sink reached the end of its file.
    pub fn begin_audio_ended(&mut self, container: ContainerId) -> CueResult<Step> {
        let result = self.handle_audio_ended(container);
        self.settle();
        result
    }

    pub async fn audio_ended(&mut self, container: ContainerId) -> CueResult<Outcome> {
        let step = self.begin_audio_ended(container)?;
        self.drive(step).await
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let tracker = &self.outputs.tracker;
        let mut active_files: Vec<PathBuf> = tracker.active_files().map(Path::to_path_buf).collect();
        active_files.sort();
        PlaybackSnapshot {
            main: tracker.current_main_media(),
            visual: tracker.current_visual_content(),
            video_paused: tracker.is_video_paused(),
            audio: tracker
                .audio_keys()
                .into_iter()
                .map(|k| (k, tracker.is_audio_paused(&k)))
                .collect(),
            active_files,
            triggers: self.triggers.engaged(),
            active_column: self.triggers.active_column(),
            last_used_column: self.triggers.last_used_column(),
            flags: self.flags,
            mirror_attached: self.outputs.mirror.is_attached(),
        }
    }

    // Slots

    fn activate_slot(&mut self, key: SlotKey, chain: Option<ChainSurface>) -> CueResult<Step> {
        let Some(slot) = self.store.get_media_slot(&key) else {
            tracing::info!(slot = %key, "Empty slot, asking for an asset");
            return Ok(Step::Pending(Load::PickAsset(key)));
        };
        let capability = capability_for(slot.kind());
        if capability.is_active(&self.outputs, &key) {
            return self.toggle(&slot).map(Step::Done);
        }
        self.cold_start(slot, StartMode::Resume, chain)
    }

    fn assign(&mut self, key: SlotKey, content: Option<SlotContent>) -> CueResult<Outcome> {
        let Some(content) = content else {
            return Ok(Outcome::Unchanged);
        };
        if self.store.get_media_slot(&key).is_some() {
            return Ok(self.refuse(Notice::Superseded(Target::Slot(key))));
        }
        self.store
            .add_slot(MediaSlot::new(key, content))
            .map_err(|e| CueError::show(e.to_string()))?;
        tracing::info!(slot = %key, "Asset assigned");
        Ok(Outcome::Assigned)
    }

    fn toggle(&mut self, slot: &MediaSlot) -> CueResult<Outcome> {
        let key = slot.key;
        let capability = capability_for(slot.kind());
        if !slot.kind().is_timed() {
            capability.stop(&mut self.outputs, &key)?;
            return Ok(Outcome::Stopped);
        }
        if capability.is_paused(&self.outputs, &key) {
            capability.resume(&mut self.outputs, &key)?;
            Ok(Outcome::Resumed)
        } else {
            capability.pause(&mut self.outputs, &key)?;
            Ok(Outcome::Paused)
        }
    }

    fn cold_start(
        &mut self,
        slot: MediaSlot,
        mode: StartMode,
        chain: Option<ChainSurface>,
    ) -> CueResult<Step> {
        if mode == StartMode::Resume {
            if let Some(notice) = self.duplicate_notice(&slot) {
                return Ok(Step::Done(self.refuse(notice)));
            }
        }
        self.probe_then_start(ProbeRequest {
            start: Starting::Slot(slot),
            mode,
            chain,
        })
    }

    /// Text has nothing to probe and starts right away.
    fn probe_then_start(&mut self, request: ProbeRequest) -> CueResult<Step> {
        if request.needs_probe() {
            return Ok(Step::Pending(Load::Probe(request)));
        }
        self.start(request).map(Step::Done)
    }

    fn start(&mut self, request: ProbeRequest) -> CueResult<Outcome> {
        let mode = request.mode;
        match request.start {
            Starting::Slot(slot) => self.start_slot(slot, mode),
            Starting::Column(column, lanes) => self.start_column(column, lanes, mode),
        }
    }

    fn start_slot(&mut self, slot: MediaSlot, mode: StartMode) -> CueResult<Outcome> {
        let key = slot.key;
        let started_elsewhere = capability_for(slot.kind()).is_active(&self.outputs, &key);
        if started_elsewhere || self.store.get_media_slot(&key).as_ref() != Some(&slot) {
            return Ok(self.refuse(Notice::Superseded(Target::Slot(key))));
        }

        match self.start_part(&slot, mode)? {
            Ok(()) if mode == StartMode::FromZero => Ok(Outcome::Restarted),
            Ok(()) => Ok(Outcome::Started),
            Err(notice) => Ok(self.refuse(notice)),
        }
    }

    fn restart_slot(&mut self, key: SlotKey) -> CueResult<Step> {
        let Some(slot) = self.store.get_media_slot(&key) else {
            return Ok(Step::Done(self.refuse(Notice::Empty(Target::Slot(key)))));
        };
        self.stop_key(&key)?;
        self.outputs.tracker.forget_position(&key, slot.media_path());
        self.cold_start(slot, StartMode::FromZero, None)
    }

    fn nothing_to_delete(&self, target: Target) -> bool {
        delete_keys(target)
            .iter()
            .all(|k| self.store.get_media_slot(k).is_none())
    }

    fn finish_delete(&mut self, target: Target, confirmed: bool) -> CueResult<Outcome> {
        if !confirmed {
            tracing::debug!(%target, "Delete cancelled");
            return Ok(Outcome::Unchanged);
        }
        if self.nothing_to_delete(target) {
            return Ok(Outcome::Unchanged);
        }

        let mut result = Ok(());
        for key in &delete_keys(target) {
            let path = self
                .store
                .get_media_slot(key)
                .and_then(|s| s.media_path().map(Path::to_path_buf));
            result = result.and(self.stop_key(key).map(|_| ()));
            self.outputs.tracker.forget_position(key, path.as_deref());
            self.store.remove_slot(key);
        }
        if let Target::Trigger(column) = target {
            self.triggers.remove(column);
        }
        tracing::info!(%target, "Deleted");
        result.map(|()| Outcome::Deleted)
    }

    /// Start one slot on its output. The outer result carries faults, the
    /// inner one a refusal.
    fn start_part(
        &mut self,
        slot: &MediaSlot,
        mode: StartMode,
    ) -> CueResult<Result<(), Notice>> {
        match mode {
            StartMode::Resume => {
                if let Some(notice) = self.duplicate_notice(slot) {
                    return Ok(Err(notice));
                }
            }
            StartMode::FromZero => self.take_over(slot)?,
        }

        let kind = slot.kind();
        if kind != MediaKind::Audio {
            self.evict_main()?;
        }
        let settings: ElementSettings = self.settings.final_settings(&slot.key);
        let from = match (slot.media_path(), mode) {
            (Some(path), StartMode::Resume) if kind.is_timed() => {
                self.outputs.tracker.resume_position_for(&slot.key, path)
            }
            _ => Duration::ZERO,
        };
        capability_for(kind).start(&mut self.outputs, slot, &settings, from)?;
        Ok(Ok(()))
    }

    /// Refusal for a timed file already playing from another slot.
    fn duplicate_notice(&self, slot: &MediaSlot) -> Option<Notice> {
        if !slot.kind().is_timed() {
            return None;
        }
        let path = slot.media_path()?;
        if !self.outputs.tracker.is_file_already_playing(path) {
            return None;
        }
        let holder = self.outputs.tracker.holder_of(path)?;
        (holder != slot.key).then(|| Notice::DuplicateFile {
            path: path.to_path_buf(),
            holder,
        })
    }

    fn take_over(&mut self, slot: &MediaSlot) -> CueResult<()> {
        let Some(path) = slot.media_path().filter(|_| slot.kind().is_timed()) else {
            return Ok(());
        };
        match self.outputs.tracker.holder_of(path) {
            Some(holder) if holder != slot.key => {
                tracing::info!(slot = %slot.key, %holder, "Taking over file from other slot");
                self.stop_key(&holder).map(|_| ())
            }
            _ => Ok(()),
        }
    }

    fn evict_main(&mut self) -> CueResult<()> {
        match self.outputs.tracker.current_main_media() {
            Some(key) => {
                tracing::debug!(slot = %key, "Evicting primary occupant");
                self.stop_key(&key).map(|_| ())
            }
            None => Ok(()),
        }
    }

    // Keys, independent of the store

    /// Kind of whatever `key` is currently playing, if anything.
    fn live_kind(&self, key: &SlotKey) -> Option<MediaKind> {
        if let Some(main) = self.outputs.tracker.main_occupant() {
            if main.key == *key {
                return Some(main.kind);
            }
        }
        self.outputs
            .tracker
            .is_audio_media(key)
            .then_some(MediaKind::Audio)
    }

    fn is_live(&self, key: &SlotKey) -> bool {
        self.live_kind(key).is_some()
    }

    fn stop_key(&mut self, key: &SlotKey) -> CueResult<bool> {
        let Some(kind) = self.live_kind(key) else {
            return Ok(false);
        };
        let result = capability_for(kind).stop(&mut self.outputs, key);
        if let Some(column) = key.trigger_column() {
            self.settle_trigger(column);
        }
        result.map(|()| true)
    }

    fn pause_key(&mut self, key: &SlotKey) -> CueResult<bool> {
        match self.live_kind(key) {
            Some(kind) => capability_for(kind).pause(&mut self.outputs, key),
            None => Ok(false),
        }
    }

    fn resume_key(&mut self, key: &SlotKey) -> CueResult<bool> {
        match self.live_kind(key) {
            Some(kind) => capability_for(kind).resume(&mut self.outputs, key),
            None => Ok(false),
        }
    }

    fn seek_key(&mut self, key: &SlotKey, position: Duration) -> CueResult<Outcome> {
        match self.live_kind(key) {
            Some(MediaKind::Video) => {
                self.outputs.primary.seek(position)?;
                let source = self.outputs.primary_source();
                self.outputs.mirror.seek(source.as_deref(), position);
                if let Some(path) = source.filter(|_| self.outputs.tracker.is_video_paused()) {
                    self.outputs.tracker.remember_position(*key, &path, position);
                }
            }
            Some(MediaKind::Audio) => {
                if let Some(sink) = self.outputs.tracker.audio_channel_mut(key) {
                    sink.seek(position)?;
                }
                let paused_path = self
                    .outputs
                    .tracker
                    .audio_channel_path(key)
                    .filter(|_| self.outputs.tracker.is_audio_paused(key))
                    .map(Path::to_path_buf);
                if let Some(path) = paused_path {
                    self.outputs.tracker.remember_position(*key, &path, position);
                }
            }
            Some(MediaKind::Image | MediaKind::Text) | None => return Ok(Outcome::Unchanged),
        }
        tracing::debug!(slot = %key, ?position, "Seeked");
        Ok(Outcome::Seeked)
    }

    fn tracked_audio_key(&self) -> Option<SlotKey> {
        let tracker = &self.outputs.tracker;
        tracker
            .current_audio_content()
            .or_else(|| tracker.audio_keys().last().copied())
    }

    // Trigger columns

    fn activate_trigger(&mut self, column: u32) -> CueResult<Step> {
        match self.triggers.state(column) {
            TriggerState::Playing => self.pause_trigger(column).map(Step::Done),
            TriggerState::Paused => self.resume_trigger(column).map(Step::Done),
            TriggerState::Idle => self.start_trigger(column, StartMode::Resume),
        }
    }

    fn pause_trigger(&mut self, column: u32) -> CueResult<Outcome> {
        let mut result = Ok(());
        for key in lane_keys(column) {
            result = result.and(self.pause_key(&key).map(|_| ()));
        }
        self.triggers.pause(column);
        result.map(|()| Outcome::Paused)
    }

    fn resume_trigger(&mut self, column: u32) -> CueResult<Outcome> {
        let mut result = Ok(());
        for key in lane_keys(column) {
            result = result.and(self.resume_key(&key).map(|_| ()));
        }
        self.triggers.resume(column);
        result.map(|()| Outcome::Resumed)
    }

    fn start_trigger(&mut self, column: u32, mode: StartMode) -> CueResult<Step> {
        let lanes = self.store.trigger_column(column);
        if lanes.is_empty() {
            return Ok(Step::Done(self.refuse(Notice::Empty(Target::Trigger(column)))));
        }
        self.probe_then_start(ProbeRequest {
            start: Starting::Column(column, lanes),
            mode,
            chain: None,
        })
    }

    fn start_column(
        &mut self,
        column: u32,
        lanes: TriggerColumn,
        mode: StartMode,
    ) -> CueResult<Outcome> {
        let target = Target::Trigger(column);
        if self.store.trigger_column(column) != lanes
            || self.triggers.state(column) != TriggerState::Idle
        {
            return Ok(self.refuse(Notice::Superseded(target)));
        }

        // Another column loses the primary surface; its audio keeps going.
        let mut evicted = Vec::new();
        for (other, _) in self.triggers.engaged() {
            if other != column {
                self.stop_trigger_visual(other)?;
                evicted.push(other);
            }
        }

        let mut started = false;
        let mut refusal = None;
        if let Some(visual) = lanes.visual() {
            match self.start_part(visual, mode)? {
                Ok(()) => started = true,
                Err(notice) => refusal = Some(notice),
            }
        }
        if let Some(audio) = &lanes.audio {
            if self.outputs.tracker.is_audio_media(&audio.key) {
                tracing::debug!(column, "Trigger audio still present, continuing it");
                AudioPlayback.resume(&mut self.outputs, &audio.key)?;
                started = true;
            } else {
                match self.start_part(audio, mode)? {
                    Ok(()) => started = true,
                    Err(notice) => refusal = refusal.or(Some(notice)),
                }
            }
        }

        if !started {
            // The evicted columns already lost the screen.
            for other in evicted {
                tracing::debug!(column = other, "Evicted trigger column goes idle");
                self.triggers.stop(other);
            }
            return Ok(self.refuse(refusal.unwrap_or(Notice::Empty(target))));
        }
        if let Some(notice) = refusal {
            self.events.notice(notice);
        }
        let outcome = self.triggers.start(column);
        tracing::info!(column, evicted = ?outcome.evicted, "Trigger column playing");
        Ok(match mode {
            StartMode::Resume => Outcome::Started,
            StartMode::FromZero => Outcome::Restarted,
        })
    }

    fn restart_trigger(&mut self, column: u32) -> CueResult<Step> {
        self.stop_trigger(column)?;
        let lanes = self.store.trigger_column(column);
        for slot in [&lanes.video, &lanes.image, &lanes.audio].into_iter().flatten() {
            self.outputs.tracker.forget_position(&slot.key, slot.media_path());
        }
        self.start_trigger(column, StartMode::FromZero)
    }

    fn stop_trigger(&mut self, column: u32) -> CueResult<Outcome> {
        // Stopping lanes settles the column, so read its state first.
        let engaged = self.triggers.state(column) != TriggerState::Idle;
        let mut stopped = false;
        let mut result = Ok(());
        for key in lane_keys(column) {
            match self.stop_key(&key) {
                Ok(lane_stopped) => stopped |= lane_stopped,
                Err(e) => result = result.and(Err(e)),
            }
        }
        self.triggers.stop(column);
        result.map(|()| {
            if engaged || stopped {
                Outcome::Stopped
            } else {
                Outcome::Unchanged
            }
        })
    }

    fn stop_trigger_visual(&mut self, column: u32) -> CueResult<()> {
        for lane in [TriggerLane::Video, TriggerLane::Image] {
            self.stop_key(&SlotKey::trigger(column, lane))?;
        }
        Ok(())
    }

    /// Drive a column to Idle once none of its lanes is playing.
    fn settle_trigger(&mut self, column: u32) {
        let live = lane_keys(column).iter().any(|k| self.is_live(k));
        if !live && self.triggers.state(column) != TriggerState::Idle {
            tracing::debug!(column, "Trigger column finished");
            self.triggers.stop(column);
        }
    }

    /// Lane to seek for a column: its video on the primary, else its audio.
    fn trigger_live_key(&self, column: u32) -> Option<SlotKey> {
        [TriggerLane::Video, TriggerLane::Audio]
            .into_iter()
            .map(|lane| SlotKey::trigger(column, lane))
            .find(|key| self.is_live(key))
    }

    // End of media

    fn handle_primary_ended(&mut self) -> CueResult<Step> {
        let Some(main) = self
            .outputs
            .tracker
            .main_occupant()
            .filter(|m| m.kind == MediaKind::Video)
            .cloned()
        else {
            tracing::debug!("Ignoring end of media: no video on the primary");
            return Ok(Step::Done(Outcome::Unchanged));
        };
        if !self.outputs.primary.has_ended() {
            let position = self.outputs.primary.position();
            tracing::debug!(slot = %main.key, ?position, "Ignoring stale end of media");
            return Ok(Step::Done(Outcome::Unchanged));
        }

        let source = self.outputs.primary_source();
        if self.flags.loop_video {
            tracing::debug!(slot = %main.key, "Looping video");
            self.outputs.primary.seek(Duration::ZERO)?;
            self.outputs.primary.play()?;
            self.outputs.mirror.on_primary_ended(source.as_deref(), true);
            return Ok(Step::Done(Outcome::Looped));
        }

        self.outputs.mirror.on_primary_ended(source.as_deref(), false);
        tracing::info!(slot = %main.key, "Video finished");
        self.stop_key(&main.key)?;
        self.outputs
            .tracker
            .forget_position(&main.key, main.path.as_deref());

        let next = if !main.key.is_trigger() && self.flags.auto_play {
            self.chain(ChainSurface::Primary, main.key)?
        } else {
            None
        };
        Ok(Step::chained(Outcome::Stopped, next))
    }

    fn handle_audio_ended(&mut self, container: ContainerId) -> CueResult<Step> {
        let Some(key) = self.outputs.tracker.audio_key_for_container(container) else {
            tracing::debug!(?container, "Ignoring end of media for released container");
            return Ok(Step::Done(Outcome::Unchanged));
        };
        let path = self
            .outputs
            .tracker
            .audio_channel_path(&key)
            .map(Path::to_path_buf);
        tracing::info!(slot = %key, "Audio finished");
        self.outputs.release_channel(&key);
        self.outputs.tracker.forget_position(&key, path.as_deref());

        let next = match key.trigger_column() {
            Some(column) => {
                self.settle_trigger(column);
                None
            }
            None if self.flags.auto_play => self.chain(ChainSurface::Audio, key)?,
            None => None,
        };
        Ok(Step::chained(Outcome::Stopped, next))
    }

    /// Start the slot after `ended`. A start waiting on its probe keeps the
    /// surface claimed until [`complete`](Self::complete) applies it.
    fn chain(&mut self, surface: ChainSurface, ended: SlotKey) -> CueResult<Option<Load>> {
        if !self.chainer.begin(surface) {
            return Ok(None);
        }
        let row = self.store.row(ended.row);
        let next = next_in_row(&row, ended, self.flags.loop_playlist, |slot| {
            self.is_chain_eligible(slot)
        });
        let step = match next {
            Some(next) => {
                tracing::info!(from = %ended, to = %next, "Auto-playing next slot");
                self.activate_slot(next, Some(surface))
            }
            None => {
                tracing::info!(row = ended.row, "End of row reached");
                Ok(Step::Done(Outcome::Unchanged))
            }
        };
        match step {
            Ok(Step::Pending(load @ Load::Probe(_))) => Ok(Some(load)),
            other => {
                self.chainer.finish(surface);
                other.map(|_| None)
            }
        }
    }

    fn is_chain_eligible(&self, slot: &MediaSlot) -> bool {
        if self.is_live(&slot.key) {
            return false;
        }
        !(slot.kind().is_timed()
            && slot
                .media_path()
                .is_some_and(|p| self.outputs.tracker.is_file_already_playing(p)))
    }

    // Bookkeeping after every verb

    fn refuse(&self, notice: Notice) -> Outcome {
        self.events.notice(notice.clone());
        Outcome::Refused(notice)
    }

    fn settle(&mut self) {
        let healed = self.heal_orphans();
        debug_assert_eq!(healed, 0, "audio channel without an active file");
        self.publish_highlighting();
    }

    /// Remove audio channels whose file is no longer active. Returns how
    /// many were removed.
    fn heal_orphans(&mut self) -> usize {
        let orphans = self.outputs.tracker.remove_orphaned_channels();
        for (key, channel) in &orphans {
            tracing::warn!(slot = %key, path = %channel.path.display(), "Removing orphaned audio channel");
            self.outputs.audio.release(channel.container);
        }
        orphans.len()
    }

    fn publish_highlighting(&mut self) {
        let current = Highlight {
            main: self.outputs.tracker.current_main_media(),
            audio: self.outputs.tracker.audio_keys(),
            triggers: self.triggers.engaged(),
        };
        if self.highlight.as_ref() == Some(&current) {
            return;
        }
        self.events.emit(EngineEvent::HighlightingChanged {
            main: current.main,
            audio: current.audio.clone(),
            triggers: current.triggers.clone(),
        });
        self.highlight = Some(current);
    }
}

impl PositionAccessor for Outputs {
    fn read(&self, timer: TimerKind) -> Option<TimerReading> {
        match timer {
            TimerKind::Video => {
                let main = self.tracker.main_occupant()?;
                (main.kind == MediaKind::Video).then(|| TimerReading {
                    position: self.primary.position(),
                    duration: self.primary.duration(),
                })
            }
            TimerKind::Audio => {
                let key = self
                    .tracker
                    .current_audio_content()
                    .or_else(|| self.tracker.audio_keys().last().copied())?;
                let sink = self.tracker.try_get_audio_channel(&key)?;
                Some(TimerReading {
                    position: sink.position(),
                    duration: sink.duration(),
                })
            }
        }
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("outputs", &self.outputs)
            .field("triggers", &self.triggers)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

/// Probe every file; the first failure becomes a refusal.
async fn probe_all(probe: &dyn MediaProbe, slots: Vec<&MediaSlot>) -> Option<Notice> {
    for slot in slots {
        let Some(path) = slot.media_path() else {
            continue;
        };
        if let Err(e) = probe.probe(path).await {
            tracing::warn!(slot = %slot.key, path = %path.display(), error = %e, "Media probe failed");
            return Some(Notice::Unplayable {
                key: slot.key,
                message: e.to_string(),
            });
        }
    }
    None
}

fn normalize(target: Target) -> Target {
    match target {
        Target::Slot(key) => Target::from(key),
        trigger => trigger,
    }
}

fn lane_keys(column: u32) -> [SlotKey; 3] {
    TriggerLane::ALL.map(|lane| SlotKey::trigger(column, lane))
}

fn delete_keys(target: Target) -> Vec<SlotKey> {
    match target {
        Target::Slot(key) => vec![key],
        Target::Trigger(column) => lane_keys(column).to_vec(),
    }
}
