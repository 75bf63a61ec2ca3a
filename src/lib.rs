//! # lightcycle
//!
//! Time-of-day colour temperature for Hyprland. The screen sits at a cool
//! day temperature, warms through a sunset transition to a night temperature
//! and cools back through a sunrise transition.
//!
//! ## Architecture
//!
//! - **cycle**: Transition windows, phase lookup and temperature interpolation
//! - **config**: Configuration loading, validation, default generation and resolved snapshots
//! - **geo**: Solar sunset/sunrise anchors for geo mode
//! - **clock**: Wall-clock, manual and fast-forward preview time sources
//! - **engine**: The temperature engine, its timers, block gate and change notifications
//! - **runtime**: Event loop owning the engine, driven through an `EngineHandle`
//! - **backend**: Gamma sinks (hyprsunset, dry run) and fullscreen block sources
//! - **signals**: Signal handling and the control file protocol
//! - **commands**: One-shot CLI commands (control, reload, preview)
//! - **args**: Command-line parsing
//! - **logger**: Structured logging with visual formatting
//! - **error**: Typed configuration, sink and timer errors
//! - **constants**: Application-wide constants and defaults
//! - **utils**: Interpolation, durations, paths and instance lookup

pub mod args;
pub mod backend;
pub mod clock;
pub mod commands;
pub mod config;
pub mod constants;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod geo;
pub mod logger;
pub mod runtime;
pub mod signals;
pub mod utils;

// Re-export important types for easier access
pub use backend::{BlockSource, GammaSink};
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use config::{Config, TemperatureConfig, TransitionMode};
pub use cycle::{CycleSample, CycleState, Phase, TransitionWindows};
pub use engine::{EngineSnapshot, StateChange, TemperatureEngine};
pub use error::{ConfigError, SinkError, TimerError};
pub use logger::{Log, LogLevel};
pub use runtime::{EngineHandle, EngineRunner};
