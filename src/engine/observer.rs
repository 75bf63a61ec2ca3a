//! Change notifications for displayed engine state.
//!
//! Observers receive one [`StateChange`] per field that changed, in the order
//! the engine published them. A subscriber that drops its receiver is removed
//! on the next publish.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::cycle::CycleState;

#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    Temperature(u32),
    CycleState(CycleState),
    CyclePosition(f64),
    Enabled(bool),
    Blocked(bool),
    PreviewMode(bool),
    CyclePreview(bool),
    StatusText(String),
    /// The display backend refused a value. Not a state field; reported on every failure.
    SinkFailed(String),
}

impl StateChange {
    /// Name of the field this change refers to.
    pub fn field(&self) -> &'static str {
        match self {
            StateChange::Temperature(_) => "temperature",
            StateChange::CycleState(_) => "cycle_state",
            StateChange::CyclePosition(_) => "cycle_position",
            StateChange::Enabled(_) => "is_enabled",
            StateChange::Blocked(_) => "is_blocked",
            StateChange::PreviewMode(_) => "is_preview_mode_enabled",
            StateChange::CyclePreview(_) => "is_cycle_preview_running",
            StateChange::StatusText(_) => "status_text",
            StateChange::SinkFailed(_) => "sink_error",
        }
    }
}

#[derive(Debug, Default)]
pub struct Observers {
    senders: Vec<Sender<StateChange>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<StateChange> {
        let (tx, rx) = mpsc::channel();
        self.senders.push(tx);
        rx
    }

    pub fn emit(&mut self, change: StateChange) {
        self.senders.retain(|tx| tx.send(change.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Drop every subscriber; their receivers see a disconnect.
    pub fn clear(&mut self) {
        self.senders.clear();
    }
}
