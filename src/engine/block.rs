//! Fullscreen blocking gate.

/// Combines the user's `fullscreen_blocking` setting with the latest value
/// reported by a block source.
///
/// The gate is level-triggered: it always reflects the most recent push, and
/// only reports a change when the effective value flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGate {
    setting: bool,
    raw: bool,
}

impl BlockGate {
    pub fn new(setting: bool) -> Self {
        Self {
            setting,
            raw: false,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.setting && self.raw
    }

    /// Record a new source value. Returns the new effective value if it changed.
    pub fn push(&mut self, raw: bool) -> Option<bool> {
        let before = self.is_blocked();
        self.raw = raw;
        self.changed_from(before)
    }

    /// Update the setting. Returns the new effective value if it changed.
    pub fn set_setting(&mut self, enabled: bool) -> Option<bool> {
        let before = self.is_blocked();
        self.setting = enabled;
        self.changed_from(before)
    }

    fn changed_from(&self, before: bool) -> Option<bool> {
        let now = self.is_blocked();
        (now != before).then_some(now)
    }
}
