use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reflection::ReflectionField;
use crate::storage::SessionRecord;
use crate::timer::{SessionPhase, SessionSnapshot};

/// Every state change in the engine produces an Event.
/// The terminal host renders them; subscribers receive them via the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        activation_secs: u64,
        at: DateTime<Utc>,
    },
    /// Activation countdown reached zero.
    FocusStarted {
        at: DateTime<Utc>,
    },
    /// A block of focus time completed; the check-in prompt is visible.
    CheckinDue {
        focus_elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    CheckinDismissed {
        at: DateTime<Utc>,
    },
    SessionStopped {
        from: SessionPhase,
        activation_remaining_secs: u64,
        focus_elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    ReflectionUpdated {
        field: ReflectionField,
        /// Both required answers are present.
        complete: bool,
        at: DateTime<Utc>,
    },
    /// Reflection persisted; the engine is back to Idle.
    SessionFinished {
        record: SessionRecord,
        total_sessions: usize,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        snapshot: SessionSnapshot,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::SessionStarted { at, .. }
            | Event::FocusStarted { at }
            | Event::CheckinDue { at, .. }
            | Event::CheckinDismissed { at }
            | Event::SessionStopped { at, .. }
            | Event::ReflectionUpdated { at, .. }
            | Event::SessionFinished { at, .. }
            | Event::StateSnapshot { at, .. } => *at,
        }
    }
}
