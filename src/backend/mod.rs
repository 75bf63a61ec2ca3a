//! Display backends and block sources.
//!
//! The engine talks to the display through the [`GammaSink`] trait and learns
//! about fullscreen windows through [`BlockSource`]. Both are injected at
//! construction, so the engine never knows which compositor it runs on.
//!
//! ## Supported Backends
//!
//! - **Hyprland**: sends `temperature` commands to hyprsunset over its IPC socket
//!   and detects fullscreen windows with `hyprctl`
//! - **Dry run**: logs the values it would apply; used for `--preview` without a
//!   running instance and on compositors lightcycle cannot drive
//!
//! Auto-detection priority: Hyprland → dry run.

use anyhow::Result;

use crate::config::{Backend, Config};
use crate::constants::{DEFAULT_BACKEND, NEUTRAL_TEMPERATURE};
use crate::error::SinkError;
use crate::logger::Log;

pub mod hyprland;

/// Applies a color temperature to the display.
pub trait GammaSink: Send {
    /// Apply `temperature` (Kelvin). Idempotent; repeating a value is harmless.
    fn apply(&mut self, temperature: u32) -> Result<(), SinkError>;

    /// Human-readable backend name, e.g. "Hyprland".
    fn name(&self) -> &'static str;

    /// Return the display to its neutral state. Called once on shutdown.
    fn reset(&mut self) -> Result<(), SinkError> {
        self.apply(NEUTRAL_TEMPERATURE)
    }
}

/// Reports whether the display should currently be left alone.
pub trait BlockSource: Send {
    /// Sample the current raw value, e.g. "a fullscreen window is focused".
    fn poll(&mut self) -> bool;

    fn name(&self) -> &'static str;
}

/// Sink that only logs.
#[derive(Debug, Default)]
pub struct DryRunSink {
    last: Option<u32>,
}

impl DryRunSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_applied(&self) -> Option<u32> {
        self.last
    }
}

impl GammaSink for DryRunSink {
    fn apply(&mut self, temperature: u32) -> Result<(), SinkError> {
        if self.last != Some(temperature) {
            Log::log_debug(&format!("Dry run: would apply {}K", temperature));
        }
        self.last = Some(temperature);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Dry run"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Hyprland,
    DryRun,
}

impl BackendType {
    pub fn name(&self) -> &'static str {
        match self {
            BackendType::Hyprland => "Hyprland",
            BackendType::DryRun => "Dry run",
        }
    }
}

/// Pick the backend from the config, falling back to environment detection.
pub fn detect_backend(config: &Config) -> Result<BackendType> {
    match config.backend.unwrap_or(DEFAULT_BACKEND) {
        Backend::Hyprland => {
            if std::env::var("HYPRLAND_INSTANCE_SIGNATURE").is_err() {
                Log::log_pipe();
                anyhow::bail!(
                    "Configuration specifies backend=\"hyprland\" but you're not running on Hyprland.\n\
                    \n\
                    To fix this, either:\n\
                    • Switch to automatic detection: set backend=\"auto\" in lightcycle.toml\n\
                    • Run lightcycle on Hyprland instead of your current compositor"
                );
            }
            Ok(BackendType::Hyprland)
        }
        Backend::DryRun => Ok(BackendType::DryRun),
        Backend::Auto => {
            if std::env::var("HYPRLAND_INSTANCE_SIGNATURE").is_ok() {
                Ok(BackendType::Hyprland)
            } else {
                Log::log_warning("No supported compositor detected, using the dry run backend");
                Ok(BackendType::DryRun)
            }
        }
    }
}

pub fn create_sink(backend_type: BackendType) -> Result<Box<dyn GammaSink>> {
    match backend_type {
        BackendType::Hyprland => Ok(Box::new(hyprland::HyprsunsetSink::new()?)),
        BackendType::DryRun => Ok(Box::new(DryRunSink::new())),
    }
}

pub fn create_block_source(backend_type: BackendType) -> Option<Box<dyn BlockSource>> {
    match backend_type {
        BackendType::Hyprland => Some(Box::new(hyprland::HyprlandFullscreenSource::new())),
        BackendType::DryRun => None,
    }
}

/// In-memory sink and block source for tests.
#[cfg(any(test, feature = "testing-support"))]
pub mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    use super::{BlockSource, GammaSink};
    use crate::error::SinkError;

    /// Records every applied value. Clones share the same record.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingSink {
        applied: Arc<Mutex<Vec<u32>>>,
        resets: Arc<Mutex<usize>>,
        failing: Arc<AtomicBool>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn applied(&self) -> Vec<u32> {
            self.applied
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub fn last(&self) -> Option<u32> {
            self.applied().last().copied()
        }

        pub fn reset_count(&self) -> usize {
            *self.resets.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Make subsequent `apply` calls fail with `SinkError::Unavailable`.
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    impl GammaSink for RecordingSink {
        fn apply(&mut self, temperature: u32) -> Result<(), SinkError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(SinkError::Unavailable("display disconnected".to_string()));
            }
            self.applied
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(temperature);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "Recording"
        }

        fn reset(&mut self) -> Result<(), SinkError> {
            *self.resets.lock().unwrap_or_else(PoisonError::into_inner) += 1;
            self.apply(crate::constants::NEUTRAL_TEMPERATURE)
        }
    }

    /// Block source whose value is set from outside.
    #[derive(Debug, Clone, Default)]
    pub struct SwitchBlockSource {
        blocking: Arc<AtomicBool>,
    }

    impl SwitchBlockSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set(&self, blocking: bool) {
            self.blocking.store(blocking, Ordering::SeqCst);
        }
    }

    impl BlockSource for SwitchBlockSource {
        fn poll(&mut self) -> bool {
            self.blocking.load(Ordering::SeqCst)
        }

        fn name(&self) -> &'static str {
            "Switch"
        }
    }
}
