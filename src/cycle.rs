//! The day/night temperature curve.
//!
//! This module is the pure core of lightcycle: given a time of day and a
//! validated [`TemperatureConfig`], it computes the target color temperature,
//! the discrete [`CycleState`] and the normalized position within the 24-hour
//! cycle. Nothing here reads the clock or holds state.
//!
//! ## The Curve
//!
//! The day is split into four spans by the two transition windows:
//!
//! ```text
//!   day ──▶ sunset window ──▶ night ──▶ sunrise window ──▶ day
//!  (max)    max → min (lerp)   (min)    min → max (lerp)   (max)
//! ```
//!
//! Both windows may cross midnight. Interpolation is linear in elapsed time, so
//! the curve is continuous at every window boundary.
//!
//! ## State Classification
//!
//! The state is derived from the resulting temperature, not from the window the
//! time falls in: `temperature >= max` is `Day`, `temperature <= min` is
//! `Night`, everything in between is `Transition`. A sample taken exactly at a
//! window edge therefore reports the stable state it has already reached.

use chrono::{NaiveTime, TimeDelta, Timelike};
use std::fmt;
use std::time::Duration as StdDuration;

use crate::config::{TemperatureConfig, TransitionMode};
use crate::constants::SECONDS_PER_DAY;
use crate::utils::interpolate_u32;

const DAY_SECS: f64 = SECONDS_PER_DAY as f64;

/// Discrete position of the engine in the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleState {
    Day,
    Night,
    Transition,
    /// The engine is not driving the display (disabled, blocked or unconfigured).
    Disabled,
}

impl CycleState {
    /// Classify a temperature against the configured bounds.
    ///
    /// The comparison order matters when `night >= day` is ever fed in:
    /// `Day` wins.
    pub fn classify(temperature: u32, night_temp: u32, day_temp: u32) -> Self {
        if temperature >= day_temp {
            CycleState::Day
        } else if temperature <= night_temp {
            CycleState::Night
        } else {
            CycleState::Transition
        }
    }
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleState::Day => write!(f, "day"),
            CycleState::Night => write!(f, "night"),
            CycleState::Transition => write!(f, "transition"),
            CycleState::Disabled => write!(f, "disabled"),
        }
    }
}

/// One evaluation of the curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSample {
    /// Target temperature in Kelvin.
    pub temperature: u32,
    pub state: CycleState,
    /// Fraction of the day elapsed, in `[0, 1)`.
    pub position: f64,
}

/// Which span of the day a time falls in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    Day,
    /// Day → night, with linear progress in `[0, 1]`.
    Sunset { progress: f64 },
    Night,
    /// Night → day, with linear progress in `[0, 1]`.
    Sunrise { progress: f64 },
}

/// Start and end of both transition windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionWindows {
    pub sunset_start: NaiveTime,
    pub sunset_end: NaiveTime,
    pub sunrise_start: NaiveTime,
    pub sunrise_end: NaiveTime,
}

impl TransitionWindows {
    /// Place the windows around the sunset/sunrise anchors according to `mode`.
    ///
    /// - `StartAt`: the transition begins at the anchor
    /// - `FinishBy`: the transition completes at the anchor
    /// - `Center` / `Geo`: the transition is centered on the anchor
    ///
    /// # Example
    /// A 19:00 sunset with a 30-minute `Center` transition yields a
    /// 18:45 → 19:15 sunset window.
    pub fn new(
        mode: TransitionMode,
        sunset: NaiveTime,
        sunrise: NaiveTime,
        duration: StdDuration,
    ) -> Self {
        let full = TimeDelta::seconds(duration.as_secs() as i64);
        let half = TimeDelta::seconds((duration.as_secs() / 2) as i64);

        // NaiveTime arithmetic wraps around midnight
        match mode {
            TransitionMode::StartAt => Self {
                sunset_start: sunset,
                sunset_end: sunset + full,
                sunrise_start: sunrise,
                sunrise_end: sunrise + full,
            },
            TransitionMode::FinishBy => Self {
                sunset_start: sunset - full,
                sunset_end: sunset,
                sunrise_start: sunrise - full,
                sunrise_end: sunrise,
            },
            TransitionMode::Center | TransitionMode::Geo => Self {
                sunset_start: sunset - half,
                sunset_end: sunset + half,
                sunrise_start: sunrise - half,
                sunrise_end: sunrise + half,
            },
        }
    }

    /// Whether the two windows share any instant other than a touching edge.
    pub fn overlapping(&self) -> bool {
        let sunset_span = elapsed_secs(self.sunset_start, self.sunset_end);
        let sunrise_span = elapsed_secs(self.sunrise_start, self.sunrise_end);

        let sunrise_into_sunset = elapsed_secs(self.sunset_start, self.sunrise_start);
        let sunset_into_sunrise = elapsed_secs(self.sunrise_start, self.sunset_start);

        (sunrise_into_sunset < sunset_span && sunset_span > 0.0)
            || (sunset_into_sunrise < sunrise_span && sunrise_span > 0.0)
            || self.sunset_start == self.sunrise_start
    }

    /// Locate `time` in the day.
    pub fn phase_at(&self, time: NaiveTime) -> Phase {
        if let Some(progress) = window_progress(time, self.sunset_start, self.sunset_end) {
            return Phase::Sunset { progress };
        }
        if let Some(progress) = window_progress(time, self.sunrise_start, self.sunrise_end) {
            return Phase::Sunrise { progress };
        }

        // Night runs from the end of sunset up to the start of sunrise,
        // measured forward so that midnight crossings need no special case.
        let night_length = elapsed_secs(self.sunset_end, self.sunrise_start);
        if elapsed_secs(self.sunset_end, time) < night_length {
            Phase::Night
        } else {
            Phase::Day
        }
    }

    /// Time from `time` until the next transition window opens.
    ///
    /// Returns `None` while a transition is in progress.
    pub fn time_until_next_transition(&self, time: NaiveTime) -> Option<StdDuration> {
        match self.phase_at(time) {
            Phase::Sunset { .. } | Phase::Sunrise { .. } => None,
            Phase::Day | Phase::Night => {
                let to_sunset = elapsed_secs(time, self.sunset_start);
                let to_sunrise = elapsed_secs(time, self.sunrise_start);
                Some(StdDuration::from_secs_f64(to_sunset.min(to_sunrise)))
            }
        }
    }
}

/// Evaluate the curve at `time`.
///
/// Always returns a value; the config has been validated on construction.
pub fn evaluate(time: NaiveTime, config: &TemperatureConfig) -> CycleSample {
    let day_temp = config.day_temp();
    let night_temp = config.night_temp();

    let temperature = match config.windows().phase_at(time) {
        Phase::Day => day_temp,
        Phase::Night => night_temp,
        Phase::Sunset { progress } => interpolate_u32(day_temp, night_temp, progress),
        Phase::Sunrise { progress } => interpolate_u32(night_temp, day_temp, progress),
    };

    CycleSample {
        temperature,
        state: CycleState::classify(temperature, night_temp, day_temp),
        position: position_of(time),
    }
}

/// Fraction of the day elapsed at `time`, wrapped into `[0, 1)`.
pub fn position_of(time: NaiveTime) -> f64 {
    (seconds_of_day(time) / DAY_SECS).rem_euclid(1.0)
}

fn seconds_of_day(time: NaiveTime) -> f64 {
    time.num_seconds_from_midnight() as f64 + time.nanosecond() as f64 / 1_000_000_000.0
}

/// Seconds from `from` forward to `to`, wrapping at midnight.
fn elapsed_secs(from: NaiveTime, to: NaiveTime) -> f64 {
    (seconds_of_day(to) - seconds_of_day(from)).rem_euclid(DAY_SECS)
}

/// Progress of `time` through `[start, end]`, or `None` when outside it.
fn window_progress(time: NaiveTime, start: NaiveTime, end: NaiveTime) -> Option<f64> {
    let span = elapsed_secs(start, end);
    let into = elapsed_secs(start, time);

    if into > span {
        return None;
    }
    if span == 0.0 {
        return Some(1.0);
    }
    Some((into / span).clamp(0.0, 1.0))
}
