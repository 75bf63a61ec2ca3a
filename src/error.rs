//! Error taxonomy for the temperature engine.
//!
//! - [`ConfigError`]: a configuration snapshot was rejected. Raised while
//!   loading or resolving settings, never while cycling.
//! - [`SinkError`]: the display backend refused or could not take a value.
//!   Transient; the next tick retries.
//! - [`TimerError`]: a timer could not be armed. Only that timer is affected.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max} Kelvin (got {value})")]
    TemperatureOutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("night temperature ({night}K) must be lower than day temperature ({day}K)")]
    InvertedBounds { night: u32, day: u32 },

    #[error("invalid {field} time '{value}'. Use HH:MM:SS format")]
    InvalidTime { field: &'static str, value: String },

    #[error("transition mode must be 'start_at', 'finish_by', 'center', or 'geo' (got '{0}')")]
    InvalidTransitionMode(String),

    #[error("transition duration must be between {min} and {max} minutes (got {value})")]
    TransitionDurationOutOfRange { value: u64, min: u64, max: u64 },

    #[error("update interval must be between {min} and {max} seconds (got {value})")]
    UpdateIntervalOutOfRange { value: u64, min: u64, max: u64 },

    #[error("preview duration must be between {min} and {max} seconds (got {value})")]
    PreviewDurationOutOfRange { value: u64, min: u64, max: u64 },

    #[error(
        "sunset transition ({sunset_start}-{sunset_end}) overlaps sunrise transition ({sunrise_start}-{sunrise_end})"
    )]
    OverlappingTransitions {
        sunset_start: String,
        sunset_end: String,
        sunrise_start: String,
        sunrise_end: String,
    },

    #[error("geo mode requires latitude and longitude")]
    MissingCoordinates,

    #[error("{field} must be between {min} and {max} degrees (got {value})")]
    CoordinateOutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("solar calculation failed: {0}")]
    GeoLookup(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("display backend unavailable: {0}")]
    Unavailable(String),

    #[error("display backend rejected the value: {0}")]
    Rejected(String),

    #[error("display backend I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("timer duration must be greater than zero")]
    InvalidDuration,

    #[error("timer deadline {requested_ms}ms from now cannot be represented")]
    Overflow { requested_ms: u128 },
}
