//! Trigger column lifecycle.
//!
//! ```text
//!   Idle ──start──▶ Playing ──pause──▶ Paused
//!    ▲                 ▲ ◀──resume────────┘
//!    └──────stop───────┴─────────stop─────┘
//! ```
//!
//! Only one column may be Playing or Paused at a time. Transitions that do
//! not apply to the current state are ignored: callbacks from the UI can
//! arrive after the state they were computed from has changed.

use std::collections::BTreeMap;

use serde::Serialize;

/// Lifecycle state of one trigger column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Result of starting or restarting a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOutcome {
    /// Column forced to Idle to make room, if any.
    pub evicted: Option<u32>,
}

#[derive(Debug, Default)]
pub struct TriggerStateMachine {
    active_column: Option<u32>,
    last_used_column: Option<u32>,
    states: BTreeMap<u32, TriggerState>,
}

impl TriggerStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, column: u32) -> TriggerState {
        self.states.get(&column).copied().unwrap_or_default()
    }

    pub fn active_column(&self) -> Option<u32> {
        self.active_column
    }

    pub fn last_used_column(&self) -> Option<u32> {
        self.last_used_column
    }

    /// Columns that are not Idle.
    pub fn engaged(&self) -> Vec<(u32, TriggerState)> {
        self.states
            .iter()
            .filter(|(_, s)| **s != TriggerState::Idle)
            .map(|(c, s)| (*c, *s))
            .collect()
    }

    /// Start `column`, first driving any other engaged column to Idle.
    pub fn start(&mut self, column: u32) -> StartOutcome {
        let evicted = self
            .engaged()
            .into_iter()
            .map(|(c, _)| c)
            .find(|c| *c != column);
        if let Some(other) = evicted {
            tracing::debug!(column = other, "Evicting trigger column");
            self.states.insert(other, TriggerState::Idle);
            if self.active_column == Some(other) {
                self.active_column = None;
            }
        }
        self.states.insert(column, TriggerState::Playing);
        self.active_column = Some(column);
        self.last_used_column = Some(column);
        StartOutcome { evicted }
    }

    /// Playing → Paused. Returns whether the transition happened.
    pub fn pause(&mut self, column: u32) -> bool {
        self.transition(column, TriggerState::Playing, TriggerState::Paused)
    }

    /// Paused → Playing. Returns whether the transition happened.
    pub fn resume(&mut self, column: u32) -> bool {
        self.transition(column, TriggerState::Paused, TriggerState::Playing)
    }

    /// Any state → Idle. Returns the state the column was in.
    pub fn stop(&mut self, column: u32) -> TriggerState {
        let previous = self.state(column);
        self.states.insert(column, TriggerState::Idle);
        if self.active_column == Some(column) {
            self.active_column = None;
        }
        previous
    }

    /// Back to Idle, then immediately Playing from zero.
    pub fn restart(&mut self, column: u32) -> StartOutcome {
        self.stop(column);
        self.start(column)
    }

    /// Drive every column to Idle.
    pub fn stop_all(&mut self) {
        for state in self.states.values_mut() {
            *state = TriggerState::Idle;
        }
        self.active_column = None;
    }

    /// Forget a deleted column entirely.
    pub fn remove(&mut self, column: u32) {
        self.stop(column);
        self.states.remove(&column);
        if self.last_used_column == Some(column) {
            self.last_used_column = None;
        }
    }

    fn transition(&mut self, column: u32, from: TriggerState, to: TriggerState) -> bool {
        if self.state(column) != from {
            tracing::debug!(column, ?from, ?to, actual = ?self.state(column), "Ignoring stale trigger transition");
            return false;
        }
        self.states.insert(column, to);
        true
    }
}
