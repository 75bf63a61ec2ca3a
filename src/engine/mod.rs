//! The temperature engine: activity gating, ticking and preview playback.
//!
//! [`TemperatureEngine`] is the only owner and mutator of engine state. It is
//! not thread-safe on purpose: one scheduling context (the
//! [`EngineRunner`](crate::runtime::EngineRunner) thread in the daemon, the
//! test body in tests) owns it and calls [`poll_at`](TemperatureEngine::poll_at)
//! whenever [`next_deadline`](TemperatureEngine::next_deadline) passes.
//!
//! ## Activity
//!
//! The engine is *active* when `is_enabled && !is_blocked`. Every tick sends
//! exactly one value to the [`GammaSink`]: the curve's temperature when
//! active, [`NEUTRAL_TEMPERATURE`] otherwise. Preview values never reach the
//! sink; the real-time computation keeps running underneath a preview.
//!
//! ## Timers
//!
//! - real-time tick every `update_interval`
//! - temporary-disable re-enable, single shot
//! - preview frame every 50ms while a sweep runs
//!
//! All three are deadlines held by the engine, so disposing of the engine
//! cancels them with it.
//!
//! ## Operations
//!
//! Every operation comes in two forms: `op_at(.., now)` takes the current
//! monotonic instant, `op(..)` passes `Instant::now()`.

pub mod block;
pub mod observer;
pub mod timer;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use crate::backend::GammaSink;
use crate::clock::{ClockSource, PreviewClock};
use crate::config::{Config, TemperatureConfig};
use crate::constants::{DEFAULT_UPDATE_INTERVAL, NEUTRAL_TEMPERATURE, PREVIEW_UPDATE_INTERVAL_MS};
use crate::cycle::{self, CycleSample, CycleState, Phase};
use crate::error::TimerError;
use crate::logger::Log;
use crate::utils::format_duration;

pub use block::BlockGate;
pub use observer::{Observers, StateChange};
pub use timer::{PeriodicTimer, SingleShotTimer};

/// Everything an observer can see, captured at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub temperature: u32,
    pub cycle_state: CycleState,
    pub cycle_position: f64,
    pub is_enabled: bool,
    pub is_blocked: bool,
    pub is_preview_mode_enabled: bool,
    pub is_cycle_preview_running: bool,
    pub status_text: String,
    /// When a temporary disable will end, if one is pending.
    pub reenable_at: Option<Instant>,
}

pub struct TemperatureEngine {
    config: Option<TemperatureConfig>,
    clock: Box<dyn ClockSource>,
    sink: Box<dyn GammaSink>,
    observers: Observers,

    is_enabled: bool,
    is_blocked: bool,
    preview_mode: bool,
    preview_clock: Option<PreviewClock>,
    preview_temperature: u32,

    realtime: Option<CycleSample>,
    published: EngineSnapshot,

    disable_timer: SingleShotTimer,
    realtime_timer: PeriodicTimer,
    preview_timer: PeriodicTimer,

    sink_failing: bool,
    started: bool,
    disposed: bool,
}

impl TemperatureEngine {
    pub fn new(
        config: TemperatureConfig,
        clock: Box<dyn ClockSource>,
        sink: Box<dyn GammaSink>,
    ) -> Self {
        Self::build(Some(config), clock, sink)
    }

    /// An engine with no valid configuration. It outputs the neutral
    /// temperature and reports `Disabled` until [`reconfigure`](Self::reconfigure).
    pub fn without_config(clock: Box<dyn ClockSource>, sink: Box<dyn GammaSink>) -> Self {
        Self::build(None, clock, sink)
    }

    /// Resolve `settings` for `date` and build an engine from the result.
    ///
    /// Settings that fail validation leave the engine unconfigured, outputting
    /// neutral until a valid snapshot arrives through `reconfigure`.
    pub fn from_settings(
        settings: &Config,
        date: NaiveDate,
        clock: Box<dyn ClockSource>,
        sink: Box<dyn GammaSink>,
    ) -> Self {
        match settings.resolve(date) {
            Ok(config) => Self::new(config, clock, sink),
            Err(e) => {
                Log::log_error(&format!("Configuration could not be applied: {}", e));
                Log::log_indented("Colour adjustment stays off until a valid configuration is reloaded");
                Self::without_config(clock, sink)
            }
        }
    }

    fn build(
        config: Option<TemperatureConfig>,
        clock: Box<dyn ClockSource>,
        sink: Box<dyn GammaSink>,
    ) -> Self {
        let update_interval = config
            .as_ref()
            .map(TemperatureConfig::update_interval)
            .unwrap_or(Duration::from_secs(DEFAULT_UPDATE_INTERVAL));

        let mut engine = Self {
            config,
            clock,
            sink,
            observers: Observers::new(),
            is_enabled: true,
            is_blocked: false,
            preview_mode: false,
            preview_clock: None,
            preview_temperature: NEUTRAL_TEMPERATURE,
            realtime: None,
            published: EngineSnapshot {
                temperature: NEUTRAL_TEMPERATURE,
                cycle_state: CycleState::Disabled,
                cycle_position: 0.0,
                is_enabled: true,
                is_blocked: false,
                is_preview_mode_enabled: false,
                is_cycle_preview_running: false,
                status_text: String::new(),
                reenable_at: None,
            },
            disable_timer: SingleShotTimer::new(),
            realtime_timer: PeriodicTimer::new(update_interval),
            preview_timer: PeriodicTimer::new(Duration::from_millis(PREVIEW_UPDATE_INTERVAL_MS)),
            sink_failing: false,
            started: false,
            disposed: false,
        };

        // Nothing is sent to the sink before start
        engine.realtime = engine.compute_realtime();
        engine.published = engine.compute_snapshot(Instant::now());
        engine
    }

    // ═══ Lifecycle ═══

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Arm the real-time timer and run the first tick.
    pub fn start_at(&mut self, now: Instant) {
        if self.disposed || self.started {
            return;
        }
        self.started = true;

        if let Err(e) = self.realtime_timer.start(now) {
            Log::log_error(&format!("Could not schedule updates: {}", e));
        }
        Log::log_debug(&format!(
            "Real-time updates every {}",
            format_duration(self.realtime_timer.interval())
        ));

        // Announce the starting phase on the first tick
        self.realtime = None;
        self.tick_at(now);
    }

    /// Cancel every timer, return the display to neutral and drop all observers.
    ///
    /// Every operation after this is a no-op.
    pub fn shutdown(&mut self) {
        if self.disposed {
            return;
        }

        self.disable_timer.cancel();
        self.realtime_timer.stop();
        self.preview_timer.stop();
        self.preview_clock = None;

        match self.sink.reset() {
            Ok(()) => Log::log_decorated(&format!("Restored neutral output on {}", self.sink.name())),
            Err(e) => Log::log_warning(&format!("Could not restore neutral output: {}", e)),
        }

        self.observers.clear();
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ═══ Ticking ═══

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Recompute the real-time sample, push one value to the sink and publish.
    pub fn tick_at(&mut self, now: Instant) {
        if self.disposed {
            return;
        }

        let previous = self.realtime;
        self.realtime = self.compute_realtime();
        self.announce_phase(previous, self.realtime);

        let output = self
            .realtime
            .map(|sample| sample.temperature)
            .unwrap_or(NEUTRAL_TEMPERATURE);
        self.push_to_sink(output);

        self.publish(now);
    }

    /// Service every timer whose deadline has passed.
    ///
    /// Returns true if anything fired.
    pub fn poll_at(&mut self, now: Instant) -> bool {
        if self.disposed {
            return false;
        }
        let mut fired = false;

        if self.disable_timer.fire_if_due(now) {
            fired = true;
            Log::log_block_start("Temporary disable expired");
            self.set_enabled_at(true, now);
        }

        if self.realtime_timer.fire_if_due(now) {
            fired = true;
            self.tick_at(now);
        }

        if self.preview_timer.fire_if_due(now) {
            fired = true;
            self.advance_preview(now);
        }

        fired
    }

    pub fn poll(&mut self) -> bool {
        self.poll_at(Instant::now())
    }

    /// The earliest pending timer deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.disable_timer.deadline(),
            self.realtime_timer.deadline(),
            self.preview_timer.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // ═══ Enable / Disable / Block ═══

    pub fn set_enabled(&mut self, enabled: bool) {
        self.set_enabled_at(enabled, Instant::now());
    }

    /// Enabling cancels any pending temporary disable.
    pub fn set_enabled_at(&mut self, enabled: bool, now: Instant) {
        if self.disposed {
            return;
        }

        if enabled && self.disable_timer.cancel() {
            Log::log_debug("Pending re-enable cancelled");
        }
        if self.is_enabled != enabled {
            Log::log_block_start(if enabled {
                "Temperature cycle enabled"
            } else {
                "Temperature cycle disabled"
            });
        }
        self.is_enabled = enabled;
        self.tick_at(now);
    }

    pub fn toggle_enabled(&mut self) {
        self.toggle_enabled_at(Instant::now());
    }

    pub fn toggle_enabled_at(&mut self, now: Instant) {
        self.set_enabled_at(!self.is_enabled, now);
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.set_blocked_at(blocked, Instant::now());
    }

    /// Blocking is independent of `is_enabled`; unblocking restores whatever
    /// the enabled flag says.
    pub fn set_blocked_at(&mut self, blocked: bool, now: Instant) {
        if self.disposed {
            return;
        }

        if self.is_blocked != blocked {
            Log::log_block_start(if blocked {
                "Fullscreen window detected, pausing cycle"
            } else {
                "Fullscreen window closed, resuming cycle"
            });
        }
        self.is_blocked = blocked;
        self.tick_at(now);
    }

    pub fn disable_temporarily(&mut self, duration: Duration) -> Result<(), TimerError> {
        self.disable_temporarily_at(duration, Instant::now())
    }

    /// Disable now and re-enable after `duration`. A later call replaces the
    /// pending re-enable. On error nothing changes.
    pub fn disable_temporarily_at(&mut self, duration: Duration, now: Instant) -> Result<(), TimerError> {
        if self.disposed {
            return Ok(());
        }

        self.disable_timer.arm(now, duration)?;

        Log::log_block_start(&format!(
            "Temperature cycle disabled for {}",
            format_duration(duration)
        ));
        self.is_enabled = false;
        self.tick_at(now);
        Ok(())
    }

    // ═══ Preview ═══

    pub fn start_preview(&mut self) {
        self.start_preview_at(Instant::now());
    }

    /// Start (or restart) a 24-hour sweep from simulated midnight.
    ///
    /// Needs a configuration to sweep through; without one the call is ignored.
    pub fn start_preview_at(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        let Some(config) = &self.config else {
            Log::log_warning("Cannot preview without a valid configuration");
            return;
        };

        let duration = config.preview_duration();
        let origin = NaiveDateTime::new(self.clock.now().date(), NaiveTime::MIN);
        self.preview_clock = Some(PreviewClock::new(now, duration, origin));
        self.preview_mode = true;

        if let Err(e) = self.preview_timer.start(now) {
            Log::log_error(&format!("Could not schedule preview frames: {}", e));
        }

        Log::log_block_start(&format!(
            "Previewing a full day over {}",
            format_duration(duration)
        ));
        self.publish(now);
    }

    pub fn start_temperature_preview(&mut self, temperature: u32) {
        self.start_temperature_preview_at(temperature, Instant::now());
    }

    /// Show a fixed temperature, e.g. while the user edits a bound. Stops any sweep.
    pub fn start_temperature_preview_at(&mut self, temperature: u32, now: Instant) {
        if self.disposed {
            return;
        }

        self.preview_clock = None;
        self.preview_timer.stop();
        self.preview_mode = true;
        self.preview_temperature = temperature;
        self.publish(now);
    }

    pub fn stop_preview(&mut self) {
        self.stop_preview_at(Instant::now());
    }

    pub fn stop_preview_at(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        if self.preview_mode {
            Log::log_block_start("Preview stopped");
        }
        self.end_preview(now);
    }

    fn end_preview(&mut self, now: Instant) {
        self.preview_clock = None;
        self.preview_timer.stop();
        self.preview_mode = false;
        self.publish(now);
    }

    fn advance_preview(&mut self, now: Instant) {
        let Some(preview) = self.preview_clock else {
            self.preview_timer.stop();
            return;
        };

        if preview.at(now).finished {
            Log::log_block_start("Preview complete");
            self.end_preview(now);
        } else {
            self.publish(now);
        }
    }

    // ═══ Configuration ═══

    pub fn reconfigure(&mut self, config: TemperatureConfig) {
        self.reconfigure_at(config, Instant::now());
    }

    /// Swap in a new snapshot and tick immediately.
    pub fn reconfigure_at(&mut self, config: TemperatureConfig, now: Instant) {
        if self.disposed {
            return;
        }

        if config.update_interval() != self.realtime_timer.interval() {
            if let Err(e) = self.realtime_timer.set_interval(config.update_interval(), now) {
                Log::log_error(&format!("Could not reschedule updates: {}", e));
            }
        }

        self.config = Some(config);
        Log::log_debug("Configuration updated");
        self.tick_at(now);
    }

    pub fn config(&self) -> Option<&TemperatureConfig> {
        self.config.as_ref()
    }

    // ═══ Observation ═══

    pub fn subscribe(&mut self) -> Receiver<StateChange> {
        self.observers.subscribe()
    }

    pub fn temperature(&self) -> u32 {
        self.published.temperature
    }

    pub fn cycle_state(&self) -> CycleState {
        self.published.cycle_state
    }

    pub fn cycle_position(&self) -> f64 {
        self.published.cycle_position
    }

    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    pub fn is_blocked(&self) -> bool {
        self.is_blocked
    }

    /// Effective activity: enabled and not blocked.
    pub fn is_active(&self) -> bool {
        self.is_enabled && !self.is_blocked
    }

    pub fn is_preview_mode_enabled(&self) -> bool {
        self.preview_mode
    }

    pub fn is_cycle_preview_running(&self) -> bool {
        self.preview_clock.is_some()
    }

    pub fn status_text(&self) -> &str {
        &self.published.status_text
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.published.clone()
    }

    // ═══ Internals ═══

    fn compute_realtime(&self) -> Option<CycleSample> {
        if !self.is_active() {
            return None;
        }
        let config = self.config.as_ref()?;
        Some(cycle::evaluate(self.clock.now().time(), config))
    }

    fn compute_snapshot(&self, now: Instant) -> EngineSnapshot {
        let preview_frame = self.preview_clock.map(|preview| preview.at(now));

        let (temperature, position) = match (preview_frame, &self.config) {
            (Some(frame), Some(config)) => {
                let sample = cycle::evaluate(frame.time.time(), config);
                (sample.temperature, sample.position)
            }
            _ if self.preview_mode => (self.preview_temperature, 0.0),
            _ => match self.realtime {
                Some(sample) => (sample.temperature, sample.position),
                None => (NEUTRAL_TEMPERATURE, 0.0),
            },
        };

        let cycle_state = match &self.config {
            Some(config) if self.is_active() => {
                CycleState::classify(temperature, config.night_temp(), config.day_temp())
            }
            _ => CycleState::Disabled,
        };

        let status_text = if let Some(frame) = preview_frame {
            format!(
                "Temp: {}K   Time: {}   (preview)",
                temperature,
                frame.time.format("%H:%M")
            )
        } else if self.preview_mode {
            format!("Temp: {}K   (preview)", temperature)
        } else if !self.is_enabled || self.config.is_none() {
            "Disabled".to_string()
        } else if self.is_blocked {
            "Blocked".to_string()
        } else {
            format!("Temp: {}K", temperature)
        };

        EngineSnapshot {
            temperature,
            cycle_state,
            cycle_position: position,
            is_enabled: self.is_enabled,
            is_blocked: self.is_blocked,
            is_preview_mode_enabled: self.preview_mode,
            is_cycle_preview_running: self.preview_clock.is_some(),
            status_text,
            reenable_at: self.disable_timer.deadline(),
        }
    }

    /// Recompute displayed state and notify observers of every changed field.
    fn publish(&mut self, now: Instant) {
        let next = self.compute_snapshot(now);
        let prev = std::mem::replace(&mut self.published, next.clone());

        if prev.is_enabled != next.is_enabled {
            self.observers.emit(StateChange::Enabled(next.is_enabled));
        }
        if prev.is_blocked != next.is_blocked {
            self.observers.emit(StateChange::Blocked(next.is_blocked));
        }
        if prev.is_preview_mode_enabled != next.is_preview_mode_enabled {
            self.observers
                .emit(StateChange::PreviewMode(next.is_preview_mode_enabled));
        }
        if prev.is_cycle_preview_running != next.is_cycle_preview_running {
            self.observers
                .emit(StateChange::CyclePreview(next.is_cycle_preview_running));
        }
        if prev.temperature != next.temperature {
            self.observers.emit(StateChange::Temperature(next.temperature));
        }
        if prev.cycle_state != next.cycle_state {
            self.observers.emit(StateChange::CycleState(next.cycle_state));
        }
        if prev.cycle_position != next.cycle_position {
            self.observers
                .emit(StateChange::CyclePosition(next.cycle_position));
        }
        if prev.status_text != next.status_text {
            self.observers.emit(StateChange::StatusText(next.status_text));
        }
    }

    fn push_to_sink(&mut self, temperature: u32) {
        match self.sink.apply(temperature) {
            Ok(()) => {
                if self.sink_failing {
                    Log::log_decorated(&format!("{} backend available again", self.sink.name()));
                    self.sink_failing = false;
                }
            }
            Err(e) => {
                if !self.sink_failing {
                    Log::log_warning(&format!("Failed to apply {}K: {}", temperature, e));
                    Log::log_indented("Retrying on the next update");
                    self.sink_failing = true;
                }
                self.observers.emit(StateChange::SinkFailed(e.to_string()));
            }
        }
    }

    /// Log entering a new part of the real-time cycle.
    fn announce_phase(&self, previous: Option<CycleSample>, current: Option<CycleSample>) {
        let Some(current) = current else {
            return;
        };
        if previous.map(|sample| sample.state) == Some(current.state) {
            return;
        }

        match current.state {
            CycleState::Day => Log::log_block_start("Entering day mode"),
            CycleState::Night => Log::log_block_start("Entering night mode"),
            CycleState::Transition => {
                let time = self.clock.now().time();
                let label = match self.config.as_ref().map(|c| c.windows().phase_at(time)) {
                    Some(Phase::Sunrise { .. }) => "Commencing sunrise",
                    _ => "Commencing sunset",
                };
                Log::log_block_start(label);
            }
            CycleState::Disabled => return,
        }
        Log::log_indented(&format!("Temperature: {}K", current.temperature));
    }
}

impl Drop for TemperatureEngine {
    fn drop(&mut self) {
        if !self.disposed && self.started {
            self.shutdown();
        }
    }
}
