//! Event loop that owns the engine.
//!
//! [`EngineRunner`] is the engine's single scheduling context. It sleeps on a
//! command channel until the next engine deadline (or block poll), services
//! whatever is due and goes back to sleep. Everything else in the process
//! talks to the engine through a cloneable [`EngineHandle`].
//!
//! ```text
//!  signals / CLI ──▶ EngineHandle ──(EngineCommand)──▶ EngineRunner ──▶ TemperatureEngine
//!                                                          │
//!                                          BlockSource ──▶ BlockGate
//! ```

use anyhow::{Context, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::backend::BlockSource;
use crate::config::TemperatureConfig;
use crate::constants::{BLOCK_POLL_INTERVAL_SECS, DEFAULT_FULLSCREEN_BLOCKING, IDLE_WAIT_SECS};
use crate::engine::{BlockGate, EngineSnapshot, PeriodicTimer, StateChange, TemperatureEngine};
use crate::error::TimerError;
use crate::logger::Log;

/// Requests handled on the runner thread.
pub enum EngineCommand {
    SetEnabled(bool),
    ToggleEnabled,
    SetBlocked(bool),
    DisableFor(Duration, Sender<Result<(), TimerError>>),
    StartPreview,
    StartTemperaturePreview(u32),
    StopPreview,
    Reconfigure(TemperatureConfig),
    Subscribe(Sender<Receiver<StateChange>>),
    Snapshot(Sender<EngineSnapshot>),
    Shutdown,
}

struct BlockPolling {
    source: Box<dyn BlockSource>,
    timer: PeriodicTimer,
}

pub struct EngineRunner {
    engine: TemperatureEngine,
    commands: Receiver<EngineCommand>,
    gate: BlockGate,
    block: Option<BlockPolling>,
}

impl EngineRunner {
    pub fn new(engine: TemperatureEngine) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::channel();
        let setting = engine
            .config()
            .map(TemperatureConfig::fullscreen_blocking)
            .unwrap_or(DEFAULT_FULLSCREEN_BLOCKING);

        let runner = Self {
            engine,
            commands: rx,
            gate: BlockGate::new(setting),
            block: None,
        };
        (runner, EngineHandle { commands: tx })
    }

    /// Poll `source` every `interval` and feed it through the block gate.
    pub fn with_block_source(mut self, source: Box<dyn BlockSource>, interval: Duration) -> Self {
        Log::log_debug(&format!("Polling {} every {:?}", source.name(), interval));
        self.block = Some(BlockPolling {
            source,
            timer: PeriodicTimer::new(interval),
        });
        self
    }

    /// Like [`with_block_source`](Self::with_block_source) with the default interval.
    pub fn with_default_block_source(self, source: Box<dyn BlockSource>) -> Self {
        self.with_block_source(source, Duration::from_secs(BLOCK_POLL_INTERVAL_SECS))
    }

    pub fn spawn(self) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("lightcycle-engine".to_string())
            .spawn(move || self.run())
            .context("Failed to spawn engine thread")
    }

    /// Run until `Shutdown` arrives or every handle is dropped.
    pub fn run(mut self) {
        let now = Instant::now();
        self.engine.start_at(now);
        if let Some(block) = &mut self.block {
            if let Err(e) = block.timer.start(now) {
                Log::log_error(&format!("Could not schedule fullscreen polling: {}", e));
            }
        }

        loop {
            let timeout = self
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_secs(IDLE_WAIT_SECS));

            match self.commands.recv_timeout(timeout) {
                Ok(EngineCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(command) => self.handle(command, Instant::now()),
                Err(RecvTimeoutError::Timeout) => {}
            }

            let now = Instant::now();
            self.engine.poll_at(now);
            self.poll_block(now);
        }

        self.engine.shutdown();
    }

    fn next_deadline(&self) -> Option<Instant> {
        let block = self.block.as_ref().and_then(|block| block.timer.deadline());
        match (self.engine.next_deadline(), block) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn handle(&mut self, command: EngineCommand, now: Instant) {
        match command {
            EngineCommand::SetEnabled(enabled) => self.engine.set_enabled_at(enabled, now),
            EngineCommand::ToggleEnabled => self.engine.toggle_enabled_at(now),
            EngineCommand::SetBlocked(blocked) => self.engine.set_blocked_at(blocked, now),
            EngineCommand::DisableFor(duration, reply) => {
                let result = self.engine.disable_temporarily_at(duration, now);
                if let Err(e) = &result {
                    Log::log_error(&format!("Could not disable temporarily: {}", e));
                }
                let _ = reply.send(result);
            }
            EngineCommand::StartPreview => self.engine.start_preview_at(now),
            EngineCommand::StartTemperaturePreview(temperature) => {
                self.engine.start_temperature_preview_at(temperature, now)
            }
            EngineCommand::StopPreview => self.engine.stop_preview_at(now),
            EngineCommand::Reconfigure(config) => {
                let flipped = self.gate.set_setting(config.fullscreen_blocking());
                self.engine.reconfigure_at(config, now);
                if let Some(blocked) = flipped {
                    self.engine.set_blocked_at(blocked, now);
                }
            }
            EngineCommand::Subscribe(reply) => {
                let _ = reply.send(self.engine.subscribe());
            }
            EngineCommand::Snapshot(reply) => {
                let _ = reply.send(self.engine.snapshot());
            }
            EngineCommand::Shutdown => {}
        }
    }

    fn poll_block(&mut self, now: Instant) {
        let Some(block) = &mut self.block else {
            return;
        };
        if !block.timer.fire_if_due(now) {
            return;
        }

        let raw = block.source.poll();
        if let Some(blocked) = self.gate.push(raw) {
            self.engine.set_blocked_at(blocked, now);
        }
    }
}

/// Cloneable sender side of the runner.
#[derive(Clone)]
pub struct EngineHandle {
    commands: Sender<EngineCommand>,
}

impl EngineHandle {
    fn send(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow::anyhow!("Engine has stopped"))
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.send(EngineCommand::SetEnabled(enabled))
    }

    pub fn toggle_enabled(&self) -> Result<()> {
        self.send(EngineCommand::ToggleEnabled)
    }

    pub fn set_blocked(&self, blocked: bool) -> Result<()> {
        self.send(EngineCommand::SetBlocked(blocked))
    }

    /// Disable for `duration` and wait for the engine to confirm the timer.
    pub fn disable_for(&self, duration: Duration) -> Result<()> {
        let (tx, rx) = mpsc::channel();
        self.send(EngineCommand::DisableFor(duration, tx))?;
        rx.recv()
            .context("Engine stopped before answering")?
            .map_err(anyhow::Error::from)
    }

    pub fn start_preview(&self) -> Result<()> {
        self.send(EngineCommand::StartPreview)
    }

    pub fn start_temperature_preview(&self, temperature: u32) -> Result<()> {
        self.send(EngineCommand::StartTemperaturePreview(temperature))
    }

    pub fn stop_preview(&self) -> Result<()> {
        self.send(EngineCommand::StopPreview)
    }

    pub fn reconfigure(&self, config: TemperatureConfig) -> Result<()> {
        self.send(EngineCommand::Reconfigure(config))
    }

    pub fn subscribe(&self) -> Result<Receiver<StateChange>> {
        let (tx, rx) = mpsc::channel();
        self.send(EngineCommand::Subscribe(tx))?;
        rx.recv().context("Engine stopped before answering")
    }

    pub fn snapshot(&self) -> Result<EngineSnapshot> {
        let (tx, rx) = mpsc::channel();
        self.send(EngineCommand::Snapshot(tx))?;
        rx.recv().context("Engine stopped before answering")
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(EngineCommand::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{RecordingSink, SwitchBlockSource};
    use crate::clock::ManualClock;
    use crate::constants::NEUTRAL_TEMPERATURE;
    use crate::cycle::CycleState;
    use chrono::NaiveDate;

    fn night_engine(sink: &RecordingSink) -> TemperatureEngine {
        let clock = ManualClock::new(
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(23, 0, 0)
                .unwrap(),
        );
        let config = TemperatureConfig::builder().build().unwrap();
        TemperatureEngine::new(config, Box::new(clock), Box::new(sink.clone()))
    }

    fn wait_for(handle: &EngineHandle, predicate: impl Fn(&EngineSnapshot) -> bool) -> EngineSnapshot {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let snapshot = handle.snapshot().unwrap();
            if predicate(&snapshot) || Instant::now() > deadline {
                return snapshot;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_commands_reach_engine() {
        let sink = RecordingSink::new();
        let (runner, handle) = EngineRunner::new(night_engine(&sink));
        let thread = runner.spawn().unwrap();

        let snapshot = handle.snapshot().unwrap();
        assert_eq!(snapshot.cycle_state, CycleState::Night);

        handle.toggle_enabled().unwrap();
        let snapshot = handle.snapshot().unwrap();
        assert!(!snapshot.is_enabled);
        assert_eq!(snapshot.status_text, "Disabled");

        handle.shutdown().unwrap();
        thread.join().unwrap();
        assert_eq!(sink.last(), Some(NEUTRAL_TEMPERATURE));
        assert_eq!(sink.reset_count(), 1);
    }

    #[test]
    fn test_block_source_drives_gate() {
        let sink = RecordingSink::new();
        let source = SwitchBlockSource::new();
        let (runner, handle) = EngineRunner::new(night_engine(&sink));
        let thread = runner
            .with_block_source(Box::new(source.clone()), Duration::from_millis(10))
            .spawn()
            .unwrap();

        source.set(true);
        let snapshot = wait_for(&handle, |s| s.is_blocked);
        assert!(snapshot.is_blocked);
        assert_eq!(snapshot.status_text, "Blocked");

        source.set(false);
        let snapshot = wait_for(&handle, |s| !s.is_blocked);
        assert!(!snapshot.is_blocked);
        assert_eq!(snapshot.cycle_state, CycleState::Night);

        handle.shutdown().unwrap();
        thread.join().unwrap();
    }

    #[test]
    fn test_reconfigure_without_blocking_unblocks() {
        let sink = RecordingSink::new();
        let source = SwitchBlockSource::new();
        source.set(true);
        let (runner, handle) = EngineRunner::new(night_engine(&sink));
        let thread = runner
            .with_block_source(Box::new(source), Duration::from_millis(10))
            .spawn()
            .unwrap();

        assert!(wait_for(&handle, |s| s.is_blocked).is_blocked);

        let config = TemperatureConfig::builder()
            .fullscreen_blocking(false)
            .build()
            .unwrap();
        handle.reconfigure(config).unwrap();
        assert!(!handle.snapshot().unwrap().is_blocked);

        handle.shutdown().unwrap();
        thread.join().unwrap();
    }

    #[test]
    fn test_disable_for_reports_timer_errors() {
        let sink = RecordingSink::new();
        let (runner, handle) = EngineRunner::new(night_engine(&sink));
        let thread = runner.spawn().unwrap();

        let err = handle.disable_for(Duration::ZERO).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TimerError>(),
            Some(&TimerError::InvalidDuration)
        );
        assert!(handle.snapshot().unwrap().is_enabled);

        drop(handle);
        thread.join().unwrap();
        assert_eq!(sink.reset_count(), 1);
    }
}
