//! Deadline timers driven by the engine's owner.
//!
//! Neither timer spawns a thread or sleeps. Each one stores at most one
//! deadline; the runner asks for the earliest deadline, waits until then and
//! calls `fire_if_due`. Re-arming replaces the previous deadline, so a stale
//! instance can never fire.

use std::time::{Duration, Instant};

use crate::error::TimerError;

fn deadline_after(now: Instant, after: Duration) -> Result<Instant, TimerError> {
    if after.is_zero() {
        return Err(TimerError::InvalidDuration);
    }
    now.checked_add(after).ok_or(TimerError::Overflow {
        requested_ms: after.as_millis(),
    })
}

/// Fires once, `after` the instant it was armed.
#[derive(Debug, Default, Clone)]
pub struct SingleShotTimer {
    deadline: Option<Instant>,
}

impl SingleShotTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm for `after` from `now`, replacing any pending deadline.
    ///
    /// On error the previous deadline, if any, is kept.
    pub fn arm(&mut self, now: Instant, after: Duration) -> Result<Instant, TimerError> {
        let deadline = deadline_after(now, after)?;
        self.deadline = Some(deadline);
        Ok(deadline)
    }

    /// Returns whether a deadline was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm and return true if the deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Fires every `interval` while running.
#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    interval: Duration,
    next: Option<Instant>,
}

impl PeriodicTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: None,
        }
    }

    /// Start (or restart) with the first firing one interval from `now`.
    pub fn start(&mut self, now: Instant) -> Result<(), TimerError> {
        self.next = Some(deadline_after(now, self.interval)?);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.next = None;
    }

    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Change the period. A running timer is rescheduled from `now`.
    pub fn set_interval(&mut self, interval: Duration, now: Instant) -> Result<(), TimerError> {
        self.interval = interval;
        if self.is_running() {
            self.start(now)?;
        }
        Ok(())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.next
    }

    /// Return true and schedule the next firing if the deadline has passed.
    ///
    /// Missed periods are skipped rather than replayed, so a runner that
    /// stalled for several intervals sees a single firing.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        let Some(next) = self.next else {
            return false;
        };
        if now < next {
            return false;
        }

        let following = next
            .checked_add(self.interval)
            .filter(|following| *following > now)
            .or_else(|| now.checked_add(self.interval));
        // An unrepresentable deadline stops the timer; the next start re-arms it
        self.next = following;
        true
    }
}
