//! The engine command loop.
//!
//! A single task owns the [`Orchestrator`] and consumes [`EngineCommand`]s
//! one at a time: operator verbs, timer ticks and end-of-media reports all
//! go through the same queue, so no two commands ever interleave their
//! state changes. [`EngineHandle`] is the cloneable client side.
//!
//! Media probes and operator prompts run in their own tasks. The loop keeps
//! serving commands meanwhile and applies each result when it arrives.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};

use cuegrid_common::config::PlaybackDefaults;
use cuegrid_common::error::{CueError, CueResult};
use cuegrid_output_core::{ContainerId, VisualSurface};
use cuegrid_show_model::{PlaybackFlags, SlotKey};

use crate::events::{EngineEvent, EventSink};
use crate::orchestrator::{
    Load, Loaded, Loader, Orchestrator, Outcome, PlaybackSnapshot, Step, Target,
};
use crate::timer::{spawn_ticker, TimerKind};

type Reply<T> = oneshot::Sender<CueResult<T>>;

/// Everything the engine task can be asked to do.
pub enum EngineCommand {
    Activate { target: Target, reply: Reply<Outcome> },
    Pause { target: Target, reply: Reply<Outcome> },
    Restart { target: Target, reply: Reply<Outcome> },
    Stop { target: Target, reply: Reply<Outcome> },
    Delete { target: Target, reply: Reply<Outcome> },
    Seek { target: Target, position: Duration, reply: Reply<Outcome> },
    StopAll { reply: Reply<Outcome> },
    ApplySettings { key: SlotKey, reply: Reply<Outcome> },
    BeginDrag(TimerKind),
    EndDrag { timer: TimerKind, position: Duration, reply: Reply<Outcome> },
    SetFlags(PlaybackFlags),
    AttachSecondary(Box<dyn VisualSurface>),
    DetachSecondary { reply: Reply<Option<Box<dyn VisualSurface>>> },
    Tick(TimerKind),
    PrimaryEnded,
    AudioEnded(ContainerId),
    Snapshot { reply: Reply<PlaybackSnapshot> },
}

impl EngineCommand {
    fn name(&self) -> &'static str {
        match self {
            EngineCommand::Activate { .. } => "activate",
            EngineCommand::Pause { .. } => "pause",
            EngineCommand::Restart { .. } => "restart",
            EngineCommand::Stop { .. } => "stop",
            EngineCommand::Delete { .. } => "delete",
            EngineCommand::Seek { .. } => "seek",
            EngineCommand::StopAll { .. } => "stop_all",
            EngineCommand::ApplySettings { .. } => "apply_settings",
            EngineCommand::BeginDrag(_) => "begin_drag",
            EngineCommand::EndDrag { .. } => "end_drag",
            EngineCommand::SetFlags(_) => "set_flags",
            EngineCommand::AttachSecondary(_) => "attach_secondary",
            EngineCommand::DetachSecondary { .. } => "detach_secondary",
            EngineCommand::Tick(_) => "tick",
            EngineCommand::PrimaryEnded => "primary_ended",
            EngineCommand::AudioEnded(_) => "audio_ended",
            EngineCommand::Snapshot { .. } => "snapshot",
        }
    }
}

impl std::fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Engine task settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Video timer period; `None` disables the ticker.
    pub video_tick: Option<Duration>,
    /// Audio timer period; `None` disables the ticker.
    pub audio_tick: Option<Duration>,
    /// Command queue depth.
    pub queue_depth: usize,
}

impl EngineConfig {
    pub fn from_defaults(defaults: &PlaybackDefaults) -> Self {
        Self {
            video_tick: Some(Duration::from_millis(defaults.video_tick_ms.max(1))),
            audio_tick: Some(Duration::from_millis(defaults.audio_tick_ms.max(1))),
            ..Self::default()
        }
    }

    /// No background tickers; ticks are posted by hand.
    pub fn manual() -> Self {
        Self {
            video_tick: None,
            audio_tick: None,
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            video_tick: Some(Duration::from_millis(250)),
            audio_tick: Some(Duration::from_millis(250)),
            queue_depth: 64,
        }
    }
}

pub struct Engine;

impl Engine {
    /// Move `orchestrator` into its own task and start the tickers.
    pub fn spawn(orchestrator: Orchestrator, config: EngineConfig) -> (EngineHandle, EngineTask) {
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = EngineHandle {
            tx,
            events: orchestrator.events().clone(),
        };

        let join = tokio::spawn(run(orchestrator, rx, shutdown_rx));
        let tickers = [
            (TimerKind::Video, config.video_tick),
            (TimerKind::Audio, config.audio_tick),
        ]
        .into_iter()
        .filter_map(|(timer, period)| Some(spawn_ticker(handle.clone(), timer, period?)))
        .collect();

        tracing::info!(?config, "Playback engine started");
        (
            handle,
            EngineTask {
                join,
                tickers,
                shutdown_tx,
            },
        )
    }
}

/// Owner side of the engine task. Dropping it stops the engine.
pub struct EngineTask {
    join: JoinHandle<()>,
    tickers: Vec<JoinHandle<()>>,
    shutdown_tx: oneshot::Sender<()>,
}

impl EngineTask {
    pub async fn shutdown(self) -> Result<(), tokio::task::JoinError> {
        let _ = self.shutdown_tx.send(());
        for ticker in &self.tickers {
            ticker.abort();
        }
        self.join.await
    }

    pub fn abort(self) {
        for ticker in &self.tickers {
            ticker.abort();
        }
        self.join.abort();
    }
}

async fn run(
    mut orchestrator: Orchestrator,
    mut rx: mpsc::Receiver<EngineCommand>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut loads = Loads::new(orchestrator.loader());
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                tracing::info!("Playback engine shutdown requested");
                break;
            }
            Some(joined) = loads.tasks.join_next(), if !loads.tasks.is_empty() => match joined {
                Ok(done) => {
                    let result = orchestrator.complete(done.loaded);
                    finish(done.command, done.reply, result);
                }
                Err(e) => tracing::error!(error = %e, "Load task failed"),
            },
            command = rx.recv() => match command {
                Some(command) => dispatch(&mut orchestrator, &mut loads, command),
                None => {
                    tracing::info!("All engine handles dropped; stopping");
                    break;
                }
            }
        }
    }
    if !loads.tasks.is_empty() {
        tracing::debug!(pending = loads.tasks.len(), "Abandoning pending loads");
    }
}

/// Probes and operator prompts in flight. Dropping the set aborts them.
struct Loads {
    loader: Loader,
    tasks: JoinSet<LoadDone>,
}

struct LoadDone {
    command: &'static str,
    loaded: Loaded,
    reply: Option<Reply<Outcome>>,
}

impl Loads {
    fn new(loader: Loader) -> Self {
        Self {
            loader,
            tasks: JoinSet::new(),
        }
    }

    /// Route a verb's step: answer now, or run its load and answer when the
    /// result has been applied.
    fn proceed(
        &mut self,
        command: &'static str,
        reply: Option<Reply<Outcome>>,
        step: CueResult<Step>,
    ) {
        match step {
            Ok(Step::Done(outcome)) => finish(command, reply, Ok(outcome)),
            Ok(Step::Pending(load)) => self.spawn(command, load, reply),
            Ok(Step::Continue(outcome, load)) => {
                finish(command, reply, Ok(outcome));
                self.spawn(command, load, None);
            }
            Err(e) => finish(command, reply, Err(e)),
        }
    }

    fn spawn(&mut self, command: &'static str, load: Load, reply: Option<Reply<Outcome>>) {
        tracing::debug!(command, target = %load.target(), "Waiting on load");
        let loader = self.loader.clone();
        self.tasks.spawn(async move {
            let loaded = loader.run(load).await;
            LoadDone {
                command,
                loaded,
                reply,
            }
        });
    }
}

fn dispatch(orchestrator: &mut Orchestrator, loads: &mut Loads, command: EngineCommand) {
    let name = command.name();
    if !matches!(command, EngineCommand::Tick(_)) {
        tracing::trace!(command = name, "Engine command");
    }
    match command {
        EngineCommand::Activate { target, reply } => {
            loads.proceed(name, Some(reply), orchestrator.begin_activate(target))
        }
        EngineCommand::Pause { target, reply } => respond(name, reply, orchestrator.pause(target)),
        EngineCommand::Restart { target, reply } => {
            loads.proceed(name, Some(reply), orchestrator.begin_restart(target))
        }
        EngineCommand::Stop { target, reply } => respond(name, reply, orchestrator.stop(target)),
        EngineCommand::Delete { target, reply } => {
            loads.proceed(name, Some(reply), orchestrator.begin_delete(target))
        }
        EngineCommand::Seek {
            target,
            position,
            reply,
        } => respond(name, reply, orchestrator.seek(target, position)),
        EngineCommand::StopAll { reply } => respond(name, reply, orchestrator.stop_all()),
        EngineCommand::ApplySettings { key, reply } => {
            respond(name, reply, orchestrator.apply_settings(key))
        }
        EngineCommand::BeginDrag(timer) => orchestrator.begin_drag(timer),
        EngineCommand::EndDrag {
            timer,
            position,
            reply,
        } => respond(name, reply, orchestrator.end_drag(timer, position)),
        EngineCommand::SetFlags(flags) => orchestrator.set_flags(flags),
        EngineCommand::AttachSecondary(surface) => orchestrator.attach_secondary(surface),
        EngineCommand::DetachSecondary { reply } => {
            respond(name, reply, Ok(orchestrator.detach_secondary()))
        }
        EngineCommand::Tick(timer) => {
            orchestrator.tick(timer);
        }
        EngineCommand::PrimaryEnded => {
            loads.proceed(name, None, orchestrator.begin_primary_ended())
        }
        EngineCommand::AudioEnded(container) => {
            loads.proceed(name, None, orchestrator.begin_audio_ended(container))
        }
        EngineCommand::Snapshot { reply } => respond(name, reply, Ok(orchestrator.snapshot())),
    }
}

fn finish(command: &'static str, reply: Option<Reply<Outcome>>, result: CueResult<Outcome>) {
    match reply {
        Some(reply) => respond(command, reply, result),
        None => report(command, result),
    }
}

fn respond<T>(command: &'static str, reply: Reply<T>, result: CueResult<T>) {
    if let Err(e) = &result {
        log_failure(command, e);
    }
    // The caller may have stopped waiting.
    let _ = reply.send(result);
}

/// Log the result of a command nobody waits on.
fn report(command: &'static str, result: CueResult<Outcome>) {
    match result {
        Ok(outcome) => tracing::debug!(command, ?outcome, "Playback command handled"),
        Err(e) => log_failure(command, &e),
    }
}

fn log_failure(command: &'static str, error: &CueError) {
    if error.is_transient() {
        tracing::warn!(command, %error, "Playback command hit a lost output");
    } else {
        tracing::error!(command, %error, "Playback command failed");
    }
}

/// Cloneable client of a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
    events: EventSink,
}

impl EngineHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub async fn activate(&self, target: impl Into<Target>) -> CueResult<Outcome> {
        let target = target.into();
        self.request(|reply| EngineCommand::Activate { target, reply })
            .await
    }

    pub async fn pause(&self, target: impl Into<Target>) -> CueResult<Outcome> {
        let target = target.into();
        self.request(|reply| EngineCommand::Pause { target, reply }).await
    }

    pub async fn restart(&self, target: impl Into<Target>) -> CueResult<Outcome> {
        let target = target.into();
        self.request(|reply| EngineCommand::Restart { target, reply })
            .await
    }

    pub async fn stop(&self, target: impl Into<Target>) -> CueResult<Outcome> {
        let target = target.into();
        self.request(|reply| EngineCommand::Stop { target, reply }).await
    }

    pub async fn delete(&self, target: impl Into<Target>) -> CueResult<Outcome> {
        let target = target.into();
        self.request(|reply| EngineCommand::Delete { target, reply })
            .await
    }

    pub async fn seek(&self, target: impl Into<Target>, position: Duration) -> CueResult<Outcome> {
        let target = target.into();
        self.request(|reply| EngineCommand::Seek {
            target,
            position,
            reply,
        })
        .await
    }

    pub async fn stop_all(&self) -> CueResult<Outcome> {
        self.request(|reply| EngineCommand::StopAll { reply }).await
    }

    pub async fn apply_settings(&self, key: SlotKey) -> CueResult<Outcome> {
        self.request(|reply| EngineCommand::ApplySettings { key, reply })
            .await
    }

    pub async fn begin_drag(&self, timer: TimerKind) -> CueResult<()> {
        self.post(EngineCommand::BeginDrag(timer)).await
    }

    pub async fn end_drag(&self, timer: TimerKind, position: Duration) -> CueResult<Outcome> {
        self.request(|reply| EngineCommand::EndDrag {
            timer,
            position,
            reply,
        })
        .await
    }

    pub async fn set_flags(&self, flags: PlaybackFlags) -> CueResult<()> {
        self.post(EngineCommand::SetFlags(flags)).await
    }

    pub async fn attach_secondary(&self, surface: Box<dyn VisualSurface>) -> CueResult<()> {
        self.post(EngineCommand::AttachSecondary(surface)).await
    }

    pub async fn detach_secondary(&self) -> CueResult<Option<Box<dyn VisualSurface>>> {
        self.request(|reply| EngineCommand::DetachSecondary { reply })
            .await
    }

    /// Report that the primary video reached its end.
    pub async fn primary_ended(&self) -> CueResult<()> {
        self.post(EngineCommand::PrimaryEnded).await
    }

    /// Report that the audio sink in `container` reached its end.
    pub async fn audio_ended(&self, container: ContainerId) -> CueResult<()> {
        self.post(EngineCommand::AudioEnded(container)).await
    }

    pub async fn snapshot(&self) -> CueResult<PlaybackSnapshot> {
        self.request(|reply| EngineCommand::Snapshot { reply }).await
    }

    /// Queue a timer tick without waiting. A full queue drops the tick.
    /// Returns `false` once the engine is gone.
    pub fn post_tick(&self, timer: TimerKind) -> bool {
        match self.tx.try_send(EngineCommand::Tick(timer)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::trace!(?timer, "Engine busy, dropping tick");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    async fn post(&self, command: EngineCommand) -> CueResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| CueError::EngineStopped)
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> EngineCommand) -> CueResult<T> {
        let (reply, rx) = oneshot::channel();
        self.post(build(reply)).await?;
        rx.await.map_err(|_| CueError::EngineStopped)?
    }
}
