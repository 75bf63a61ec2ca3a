//! Application constants and default values for lightcycle.
//!
//! This module contains the configuration defaults, validation limits,
//! and operational timing constants used throughout the engine and daemon.

use crate::config::Backend;

// ═══ Configuration Defaults ═══
// Used when the corresponding option is missing from lightcycle.toml

pub const DEFAULT_BACKEND: Backend = Backend::Auto;
pub const DEFAULT_SUNSET: &str = "18:00:00";
pub const DEFAULT_SUNRISE: &str = "06:00:00";
pub const DEFAULT_NIGHT_TEMP: u32 = 3300; // Kelvin - warm, comfortable for night viewing
pub const DEFAULT_DAY_TEMP: u32 = 6500; // Kelvin - close to natural sunlight
pub const DEFAULT_TRANSITION_DURATION: u64 = 60; // minutes
pub const DEFAULT_TRANSITION_MODE: &str = "start_at";
pub const DEFAULT_UPDATE_INTERVAL: u64 = 60; // seconds between real-time ticks
pub const DEFAULT_PREVIEW_DURATION: u64 = 10; // seconds for a full simulated day
pub const DEFAULT_FULLSCREEN_BLOCKING: bool = true;

// ═══ Output ═══

/// Temperature sent to the display whenever the cycle is not driving it.
pub const NEUTRAL_TEMPERATURE: u32 = 6500;

// ═══ Validation Limits ═══

// Temperature limits (Kelvin scale)
pub const MINIMUM_TEMP: u32 = 1000; // Very warm candlelight-like
pub const MAXIMUM_TEMP: u32 = 10000; // Cold blue sky

// Transition duration limits
pub const MINIMUM_TRANSITION_DURATION: u64 = 5; // minutes
pub const MAXIMUM_TRANSITION_DURATION: u64 = 120; // minutes

// Update interval limits
pub const MINIMUM_UPDATE_INTERVAL: u64 = 10; // seconds
pub const MAXIMUM_UPDATE_INTERVAL: u64 = 300; // seconds

// Preview sweep duration limits
pub const MINIMUM_PREVIEW_DURATION: u64 = 1; // seconds
pub const MAXIMUM_PREVIEW_DURATION: u64 = 300; // seconds

// ═══ Operational Timing Constants ═══

pub const SECONDS_PER_DAY: u32 = 86_400;
pub const PREVIEW_UPDATE_INTERVAL_MS: u64 = 50; // preview frames, 20 per second
pub const BLOCK_POLL_INTERVAL_SECS: u64 = 2; // fullscreen detector polling
pub const IDLE_WAIT_SECS: u64 = 60; // runner wait when no timer is armed
pub const GEO_REFRESH_CHECK_SECS: u64 = 60; // how often the daemon checks for a date change

// ═══ Socket Communication Constants ═══

pub const SOCKET_TIMEOUT_MS: u64 = 1000;
pub const SOCKET_BUFFER_SIZE: usize = 1024;

// ═══ Exit Codes ═══

pub const EXIT_FAILURE: i32 = 1;
