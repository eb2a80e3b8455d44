//! Check-in prompt cadence.
//!
//! A check-in is due once per completed block of focus time. The block
//! counter is relative to the current Focus entry: re-entering Focus starts
//! the cadence from zero.

use serde::{Deserialize, Serialize};

/// Length of one check-in block (10 minutes).
pub const CHECKIN_INTERVAL_SECS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinCadence {
    interval_secs: u64,
    /// Focus-elapsed value at which the last prompt was raised.
    last_prompt_at_secs: u64,
}

impl Default for CheckinCadence {
    fn default() -> Self {
        Self::new(CHECKIN_INTERVAL_SECS)
    }
}

impl CheckinCadence {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval_secs: interval_secs.max(1),
            last_prompt_at_secs: 0,
        }
    }

    pub fn last_prompt_at_secs(&self) -> u64 {
        self.last_prompt_at_secs
    }

    pub fn reset(&mut self) {
        self.last_prompt_at_secs = 0;
    }

    /// Feed the focus counter after it was incremented.
    ///
    /// Returns `true` when a new prompt must be raised at `focus_elapsed_secs`.
    pub fn observe(&mut self, focus_elapsed_secs: u64) -> bool {
        let due = focus_elapsed_secs > 0
            && focus_elapsed_secs % self.interval_secs == 0
            && focus_elapsed_secs != self.last_prompt_at_secs;
        if due {
            self.last_prompt_at_secs = focus_elapsed_secs;
        }
        due
    }
}
