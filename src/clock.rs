//! Wall-clock and simulated time sources.
//!
//! The engine never calls `Local::now()` directly. Real-time ticks read a
//! [`ClockSource`], and the preview sweep derives its simulated time of day
//! from a [`PreviewClock`] anchored to a monotonic `Instant`, so tests can
//! drive both without sleeping.

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration as StdDuration, Instant};

use crate::constants::SECONDS_PER_DAY;

/// Supplies the current local date and time.
pub trait ClockSource: Send {
    fn now(&self) -> NaiveDateTime;
}

/// The system's local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle while the engine
/// owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, time: NaiveDateTime) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }

    pub fn advance(&self, by: ChronoDuration) {
        let mut guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += by;
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One sample of a running preview sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewFrame {
    /// Simulated local time.
    pub time: NaiveDateTime,
    /// Share of the sweep completed, in `[0, 1]`.
    pub fraction: f64,
    pub finished: bool,
}

/// Fast-forward clock covering 24 simulated hours in `duration` of real time.
#[derive(Debug, Clone, Copy)]
pub struct PreviewClock {
    started: Instant,
    duration: StdDuration,
    origin: NaiveDateTime,
}

impl PreviewClock {
    /// `origin` is the simulated time at `started`, normally midnight today.
    pub fn new(started: Instant, duration: StdDuration, origin: NaiveDateTime) -> Self {
        Self {
            started,
            duration,
            origin,
        }
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn duration(&self) -> StdDuration {
        self.duration
    }

    /// Sample the sweep at real instant `now`.
    pub fn at(&self, now: Instant) -> PreviewFrame {
        let elapsed = now.saturating_duration_since(self.started);
        let fraction = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
        };

        let simulated_ms = (fraction * f64::from(SECONDS_PER_DAY) * 1000.0) as i64;
        PreviewFrame {
            time: self.origin + ChronoDuration::milliseconds(simulated_ms),
            fraction,
            finished: fraction >= 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Timelike};

    fn midnight() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_time(NaiveTime::MIN)
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(midnight());
        let handle = clock.clone();

        handle.advance(ChronoDuration::hours(3));
        assert_eq!(clock.now().hour(), 3);

        handle.set(midnight() + ChronoDuration::hours(18));
        assert_eq!(clock.now().hour(), 18);
    }

    #[test]
    fn test_preview_clock_sweeps_full_day() {
        let start = Instant::now();
        let preview = PreviewClock::new(start, StdDuration::from_secs(10), midnight());

        let frame = preview.at(start);
        assert_eq!(frame.time, midnight());
        assert_eq!(frame.fraction, 0.0);
        assert!(!frame.finished);

        let frame = preview.at(start + StdDuration::from_secs(5));
        assert_eq!(frame.time.hour(), 12);
        assert!(!frame.finished);

        let frame = preview.at(start + StdDuration::from_secs(10));
        assert_eq!(frame.fraction, 1.0);
        assert!(frame.finished);

        // Clamped past the end
        let frame = preview.at(start + StdDuration::from_secs(60));
        assert_eq!(frame.fraction, 1.0);
    }

    #[test]
    fn test_preview_clock_before_start() {
        let start = Instant::now() + StdDuration::from_secs(1);
        let preview = PreviewClock::new(start, StdDuration::from_secs(10), midnight());
        assert_eq!(preview.at(Instant::now()).fraction, 0.0);
    }
}
