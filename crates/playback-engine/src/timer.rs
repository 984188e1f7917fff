//! Position timers.
//!
//! Two fixed-period timers (video and audio) live for the whole process.
//! They only post ticks to the engine; the engine reads the current data
//! source through a [`PositionAccessor`] so the timers never need to know
//! what is playing.

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use cuegrid_common::clock::{format_position, slider_fraction};

use crate::engine::EngineHandle;
use crate::events::EngineEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    Video,
    Audio,
}

/// Position and duration of whatever a timer is tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerReading {
    pub position: Duration,
    pub duration: Option<Duration>,
}

/// Read-only view of playback positions.
pub trait PositionAccessor {
    /// `None` when nothing is playing for this timer.
    fn read(&self, timer: TimerKind) -> Option<TimerReading>;
}

/// What one tick produced for display.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub timer: TimerKind,
    pub reading: TimerReading,
    pub label: String,
    pub fraction: f64,
}

impl TickReport {
    pub fn events(&self) -> [EngineEvent; 2] {
        [
            EngineEvent::PositionUpdated {
                timer: self.timer,
                label: self.label.clone(),
                position: self.reading.position,
                duration: self.reading.duration,
            },
            EngineEvent::SliderUpdated {
                timer: self.timer,
                fraction: self.fraction,
            },
        ]
    }
}

/// Turns timer ticks into display values, suppressed while the operator
/// drags the matching slider.
#[derive(Debug, Default)]
pub struct PositionService {
    video_dragging: bool,
    audio_dragging: bool,
}

impl PositionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_drag(&mut self, timer: TimerKind) {
        *self.flag(timer) = true;
    }

    /// Returns whether a drag was in progress.
    pub fn end_drag(&mut self, timer: TimerKind) -> bool {
        std::mem::take(self.flag(timer))
    }

    pub fn is_dragging(&self, timer: TimerKind) -> bool {
        match timer {
            TimerKind::Video => self.video_dragging,
            TimerKind::Audio => self.audio_dragging,
        }
    }

    pub fn tick(&self, timer: TimerKind, accessor: &dyn PositionAccessor) -> Option<TickReport> {
        if self.is_dragging(timer) {
            return None;
        }
        let reading = accessor.read(timer)?;
        Some(TickReport {
            timer,
            reading,
            label: format_position(reading.position, reading.duration),
            fraction: slider_fraction(reading.position, reading.duration),
        })
    }

    fn flag(&mut self, timer: TimerKind) -> &mut bool {
        match timer {
            TimerKind::Video => &mut self.video_dragging,
            TimerKind::Audio => &mut self.audio_dragging,
        }
    }
}

/// Post a tick for `timer` every `period` until the engine goes away.
pub fn spawn_ticker(handle: EngineHandle, timer: TimerKind, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if !handle.post_tick(timer) {
                tracing::debug!(?timer, "Engine gone, stopping ticker");
                break;
            }
        }
    })
}
