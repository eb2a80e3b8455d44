//! Append-only log of finished sessions.
//!
//! The whole log is one JSON array under [`SESSIONS_KEY`]. A missing or
//! malformed value counts as an empty log and is overwritten by the next
//! append. A store that fails to read makes the append fail instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::KvStore;
use crate::error::Result;
use crate::reflection::Reflection;

/// Key the session log is stored under.
pub const SESSIONS_KEY: &str = "adhd-timer-sessions";

/// One completed activation + focus + reflection cycle.
///
/// Serialized with the key names used by the browser version of the timer
/// so existing exports load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "date")]
    pub completed_at: DateTime<Utc>,
    #[serde(rename = "activationTime")]
    pub activation_used_secs: u64,
    #[serde(rename = "focusTime")]
    pub focus_secs: u64,
    pub reflection: Reflection,
}

/// Receives finished sessions.
pub trait SessionSink {
    /// Append one record and return the full, updated log.
    fn append(&self, record: SessionRecord) -> Result<Vec<SessionRecord>>;
}

/// Session log over any [`KvStore`].
#[derive(Debug)]
pub struct SessionLog<S> {
    store: S,
}

impl<S: KvStore> SessionLog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// All stored records, oldest first.
    ///
    /// Never fails: store errors and malformed JSON both yield an empty log.
    pub fn read(&self) -> Vec<SessionRecord> {
        match self.read_for_append() {
            Ok(records) => records,
            Err(e) => {
                debug!(error = %e, "session log unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Like [`read`](Self::read), but a failing store is an error so an
    /// append never overwrites history it could not load.
    fn read_for_append(&self) -> Result<Vec<SessionRecord>> {
        let Some(raw) = self.store.kv_get(SESSIONS_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                debug!(error = %e, "session log malformed, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Replace the stored log.
    ///
    /// # Errors
    /// Returns an error if serialization or the store write fails.
    pub fn write(&self, records: &[SessionRecord]) -> Result<()> {
        let json = serde_json::to_string(records)?;
        self.store.kv_set(SESSIONS_KEY, &json)
    }
}

impl<S: KvStore> SessionSink for SessionLog<S> {
    fn append(&self, record: SessionRecord) -> Result<Vec<SessionRecord>> {
        let mut records = self.read_for_append()?;
        records.push(record);
        self.write(&records)?;
        Ok(records)
    }
}
