//! Session engine implementation.
//!
//! The engine is a tick-driven state machine. It owns no clock and no
//! threads; the host calls `tick()` once per elapsed second while the
//! session is running.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Activation -> Focus -> Reflection -> Idle
//!              \________________/
//!                  stop_session
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = SessionEngine::new(EngineConfig::default());
//! engine.start_session();
//! // Once per second:
//! engine.tick(); // Returns Some(Event) on phase change or check-in
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::checkin::CheckinCadence;
use crate::error::{ConfigError, Result};
use crate::events::Event;
use crate::reflection::{Reflection, ReflectionField};
use crate::storage::{SessionRecord, SessionSink};

/// Activation countdown length (15 minutes).
pub const DEFAULT_ACTIVATION_SECS: u64 = 15 * 60;
/// Upper bound accepted for the activation constant.
pub const MAX_ACTIVATION_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Activation,
    Focus,
    Reflection,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Activation => "activation",
            SessionPhase::Focus => "focus",
            SessionPhase::Reflection => "reflection",
        };
        f.write_str(s)
    }
}

/// Validated engine constants.
///
/// Serialized as the bare activation length; deserializing goes through
/// [`EngineConfig::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct EngineConfig {
    activation_secs: u64,
}

impl EngineConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when `activation_secs` is zero or
    /// longer than a day.
    pub fn new(activation_secs: u64) -> Result<Self, ConfigError> {
        if activation_secs == 0 || activation_secs > MAX_ACTIVATION_SECS {
            return Err(ConfigError::InvalidValue {
                key: "timer.activation_secs".into(),
                message: format!("must be between 1 and {MAX_ACTIVATION_SECS}, got {activation_secs}"),
            });
        }
        Ok(Self { activation_secs })
    }

    pub fn activation_secs(&self) -> u64 {
        self.activation_secs
    }
}

impl TryFrom<u64> for EngineConfig {
    type Error = ConfigError;

    fn try_from(activation_secs: u64) -> Result<Self, ConfigError> {
        Self::new(activation_secs)
    }
}

impl From<EngineConfig> for u64 {
    fn from(config: EngineConfig) -> u64 {
        config.activation_secs
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            activation_secs: DEFAULT_ACTIVATION_SECS,
        }
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub activation_remaining_secs: u64,
    pub focus_elapsed_secs: u64,
    pub is_running: bool,
    pub prompt_visible: bool,
    pub last_prompt_at_secs: u64,
    pub reflection: Reflection,
    /// `finish_reflection` would be accepted right now.
    pub can_finish: bool,
}

/// Core session state machine.
///
/// Transitions that do not apply to the current phase are no-ops and
/// return `None`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionEngine {
    config: EngineConfig,
    phase: SessionPhase,
    activation_remaining_secs: u64,
    focus_elapsed_secs: u64,
    is_running: bool,
    cadence: CheckinCadence,
    prompt_visible: bool,
    reflection: Reflection,
}

impl Default for SessionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SessionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            phase: SessionPhase::Idle,
            activation_remaining_secs: config.activation_secs(),
            focus_elapsed_secs: 0,
            is_running: false,
            cadence: CheckinCadence::default(),
            prompt_visible: false,
            reflection: Reflection::default(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn activation_remaining_secs(&self) -> u64 {
        self.activation_remaining_secs
    }

    pub fn focus_elapsed_secs(&self) -> u64 {
        self.focus_elapsed_secs
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn prompt_visible(&self) -> bool {
        self.prompt_visible
    }

    pub fn last_prompt_at_secs(&self) -> u64 {
        self.cadence.last_prompt_at_secs()
    }

    pub fn reflection(&self) -> &Reflection {
        &self.reflection
    }

    /// Seconds of the activation countdown consumed so far.
    pub fn activation_used_secs(&self) -> u64 {
        self.config
            .activation_secs()
            .saturating_sub(self.activation_remaining_secs)
    }

    pub fn can_finish(&self) -> bool {
        self.phase == SessionPhase::Reflection && self.reflection.is_complete()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            activation_remaining_secs: self.activation_remaining_secs,
            focus_elapsed_secs: self.focus_elapsed_secs,
            is_running: self.is_running,
            prompt_visible: self.prompt_visible,
            last_prompt_at_secs: self.last_prompt_at_secs(),
            reflection: self.reflection.clone(),
            can_finish: self.can_finish(),
        }
    }

    /// Build a full state snapshot event.
    pub fn snapshot_event(&self) -> Event {
        Event::StateSnapshot {
            snapshot: self.snapshot(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start_session(&mut self) -> Option<Event> {
        if self.phase != SessionPhase::Idle {
            debug!(phase = %self.phase, "start ignored: session already in progress");
            return None;
        }
        self.phase = SessionPhase::Activation;
        self.activation_remaining_secs = self.config.activation_secs();
        self.focus_elapsed_secs = 0;
        self.is_running = true;
        self.prompt_visible = false;
        self.cadence.reset();
        self.reflection = Reflection::default();
        info!(activation_secs = self.activation_remaining_secs, "session started");
        Some(Event::SessionStarted {
            activation_secs: self.activation_remaining_secs,
            at: Utc::now(),
        })
    }

    pub fn stop_session(&mut self) -> Option<Event> {
        match self.phase {
            SessionPhase::Activation | SessionPhase::Focus => {
                let from = self.phase;
                self.phase = SessionPhase::Reflection;
                self.is_running = false;
                self.prompt_visible = false;
                info!(
                    %from,
                    activation_remaining_secs = self.activation_remaining_secs,
                    focus_elapsed_secs = self.focus_elapsed_secs,
                    "session stopped"
                );
                Some(Event::SessionStopped {
                    from,
                    activation_remaining_secs: self.activation_remaining_secs,
                    focus_elapsed_secs: self.focus_elapsed_secs,
                    at: Utc::now(),
                })
            }
            _ => None,
        }
    }

    /// Call once per elapsed second.
    ///
    /// Returns `Some(Event::FocusStarted)` when activation runs out and
    /// `Some(Event::CheckinDue)` when a focus block completes.
    pub fn tick(&mut self) -> Option<Event> {
        if !self.is_running {
            return None;
        }
        match self.phase {
            SessionPhase::Activation => {
                self.activation_remaining_secs = self.activation_remaining_secs.saturating_sub(1);
                if self.activation_remaining_secs == 0 {
                    self.phase = SessionPhase::Focus;
                    self.focus_elapsed_secs = 0;
                    self.cadence.reset();
                    info!("activation complete, entering focus");
                    return Some(Event::FocusStarted { at: Utc::now() });
                }
                None
            }
            SessionPhase::Focus => {
                self.focus_elapsed_secs += 1;
                if self.cadence.observe(self.focus_elapsed_secs) {
                    self.prompt_visible = true;
                    info!(focus_elapsed_secs = self.focus_elapsed_secs, "check-in due");
                    return Some(Event::CheckinDue {
                        focus_elapsed_secs: self.focus_elapsed_secs,
                        at: Utc::now(),
                    });
                }
                None
            }
            SessionPhase::Idle | SessionPhase::Reflection => None,
        }
    }

    pub fn dismiss_prompt(&mut self) -> Option<Event> {
        if !self.prompt_visible {
            return None;
        }
        self.prompt_visible = false;
        Some(Event::CheckinDismissed { at: Utc::now() })
    }

    /// Record one reflection answer. Only accepted during Reflection.
    pub fn set_reflection_field(&mut self, field: ReflectionField) -> Option<Event> {
        if self.phase != SessionPhase::Reflection {
            debug!(phase = %self.phase, field = field.name(), "reflection answer ignored outside reflection");
            return None;
        }
        self.reflection.apply(field.clone());
        Some(Event::ReflectionUpdated {
            field,
            complete: self.reflection.is_complete(),
            at: Utc::now(),
        })
    }

    /// Persist the session through `sink` and return to Idle.
    ///
    /// A no-op (`Ok(None)`) unless in Reflection with both required answers.
    ///
    /// # Errors
    ///
    /// Propagates sink failures. The engine stays in Reflection with its
    /// answers intact so the caller can retry.
    pub fn finish_reflection<S>(&mut self, sink: &S) -> Result<Option<Event>>
    where
        S: SessionSink + ?Sized,
    {
        if !self.can_finish() {
            debug!(phase = %self.phase, "finish rejected: reflection incomplete or not in reflection");
            return Ok(None);
        }
        let at = Utc::now();
        let record = self.build_record(at);
        let sessions = sink.append(record.clone())?;
        info!(
            focus_secs = record.focus_secs,
            activation_used_secs = record.activation_used_secs,
            total_sessions = sessions.len(),
            "session recorded"
        );
        self.reset();
        Ok(Some(Event::SessionFinished {
            record,
            total_sessions: sessions.len(),
            at,
        }))
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn build_record(&self, completed_at: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            completed_at,
            activation_used_secs: self.activation_used_secs(),
            focus_secs: self.focus_elapsed_secs,
            reflection: self.reflection.clone(),
        }
    }

    fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}

/// `MM:SS`, with minutes allowed to grow past 99.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::{Meaningful, Perfectionism};
    use crate::error::CoreError;
    use crate::storage::{MemoryStore, SessionLog};

    struct FailingSink;

    impl SessionSink for FailingSink {
        fn append(&self, _record: SessionRecord) -> Result<Vec<SessionRecord>> {
            Err(CoreError::Custom("disk full".into()))
        }
    }

    fn run_ticks(engine: &mut SessionEngine, n: u64) -> Vec<Event> {
        (0..n).filter_map(|_| engine.tick()).collect()
    }

    fn answer(engine: &mut SessionEngine) {
        engine.set_reflection_field(ReflectionField::Meaningful(Meaningful::Yes));
        engine.set_reflection_field(ReflectionField::Perfectionism(Perfectionism::No));
    }

    #[test]
    fn start_resets_counters() {
        let mut engine = SessionEngine::default();
        assert_eq!(engine.phase(), SessionPhase::Idle);
        assert!(engine.start_session().is_some());
        assert_eq!(engine.phase(), SessionPhase::Activation);
        assert_eq!(engine.activation_remaining_secs(), 900);
        assert_eq!(engine.focus_elapsed_secs(), 0);
        assert!(engine.is_running());
    }

    #[test]
    fn start_is_ignored_mid_session() {
        let mut engine = SessionEngine::default();
        engine.start_session();
        run_ticks(&mut engine, 10);
        assert!(engine.start_session().is_none());
        assert_eq!(engine.activation_remaining_secs(), 890);
    }

    #[test]
    fn activation_hands_over_to_focus_after_full_countdown() {
        let mut engine = SessionEngine::default();
        engine.start_session();
        let events = run_ticks(&mut engine, 899);
        assert!(events.is_empty());
        assert_eq!(engine.phase(), SessionPhase::Activation);
        assert_eq!(engine.activation_remaining_secs(), 1);

        assert!(matches!(engine.tick(), Some(Event::FocusStarted { .. })));
        assert_eq!(engine.phase(), SessionPhase::Focus);
        assert_eq!(engine.activation_remaining_secs(), 0);
        assert_eq!(engine.focus_elapsed_secs(), 0);
        assert!(engine.is_running());
    }

    #[test]
    fn focus_raises_checkins_every_ten_minutes() {
        let mut engine = SessionEngine::new(EngineConfig::new(1).unwrap());
        engine.start_session();
        engine.tick();
        assert_eq!(engine.phase(), SessionPhase::Focus);

        let events = run_ticks(&mut engine, 599);
        assert!(events.is_empty());
        assert!(!engine.prompt_visible());

        assert!(matches!(
            engine.tick(),
            Some(Event::CheckinDue { focus_elapsed_secs: 600, .. })
        ));
        assert!(engine.prompt_visible());
        assert_eq!(engine.last_prompt_at_secs(), 600);

        assert!(engine.dismiss_prompt().is_some());
        assert!(!engine.prompt_visible());
        assert!(engine.dismiss_prompt().is_none());

        run_ticks(&mut engine, 600);
        assert!(engine.prompt_visible());
        assert_eq!(engine.last_prompt_at_secs(), 1200);
    }

    #[test]
    fn stop_moves_to_reflection_and_halts_ticks() {
        let mut engine = SessionEngine::default();
        engine.start_session();
        run_ticks(&mut engine, 50);
        let stopped = engine.stop_session();
        assert!(matches!(
            stopped,
            Some(Event::SessionStopped { from: SessionPhase::Activation, activation_remaining_secs: 850, .. })
        ));
        assert_eq!(engine.phase(), SessionPhase::Reflection);
        assert!(!engine.is_running());
        assert!(engine.tick().is_none());
        assert_eq!(engine.activation_remaining_secs(), 850);
        assert!(engine.stop_session().is_none());
    }

    #[test]
    fn stop_hides_visible_prompt() {
        let mut engine = SessionEngine::new(EngineConfig::new(1).unwrap());
        engine.start_session();
        run_ticks(&mut engine, 601);
        assert!(engine.prompt_visible());
        engine.stop_session();
        assert!(!engine.prompt_visible());
    }

    #[test]
    fn finish_requires_both_answers() {
        let log = SessionLog::new(MemoryStore::new());
        let mut engine = SessionEngine::default();
        engine.start_session();
        engine.stop_session();

        assert!(engine.finish_reflection(&log).unwrap().is_none());
        engine.set_reflection_field(ReflectionField::Perfectionism(Perfectionism::No));
        assert!(engine.finish_reflection(&log).unwrap().is_none());
        assert_eq!(engine.phase(), SessionPhase::Reflection);
        assert!(log.read().is_empty());
    }

    #[test]
    fn finish_records_activation_used_and_resets() {
        let log = SessionLog::new(MemoryStore::new());
        let mut engine = SessionEngine::default();
        engine.start_session();
        run_ticks(&mut engine, 50);
        engine.stop_session();
        answer(&mut engine);
        engine.set_reflection_field(ReflectionField::NextTask("outline chapter 2".into()));

        let event = engine.finish_reflection(&log).unwrap();
        match event {
            Some(Event::SessionFinished { record, total_sessions, .. }) => {
                assert_eq!(record.activation_used_secs, 50);
                assert_eq!(record.focus_secs, 0);
                assert_eq!(record.reflection.next_task, "outline chapter 2");
                assert_eq!(total_sessions, 1);
            }
            other => panic!("Expected SessionFinished, got {other:?}"),
        }
        assert_eq!(engine.phase(), SessionPhase::Idle);
        assert_eq!(engine.activation_remaining_secs(), 900);
        assert_eq!(engine.focus_elapsed_secs(), 0);
        assert_eq!(engine.reflection(), &Reflection::default());
        assert_eq!(log.read().len(), 1);
    }

    #[test]
    fn failed_write_keeps_reflection_for_retry() {
        let mut engine = SessionEngine::default();
        engine.start_session();
        run_ticks(&mut engine, 120);
        engine.stop_session();
        answer(&mut engine);
        engine.set_reflection_field(ReflectionField::NextTask("retry me".into()));
        let before = engine.reflection().clone();

        assert!(engine.finish_reflection(&FailingSink).is_err());
        assert_eq!(engine.phase(), SessionPhase::Reflection);
        assert_eq!(engine.reflection(), &before);
        assert_eq!(engine.activation_remaining_secs(), 780);

        let log = SessionLog::new(MemoryStore::new());
        let event = engine.finish_reflection(&log).unwrap();
        assert!(matches!(event, Some(Event::SessionFinished { total_sessions: 1, .. })));
        assert_eq!(engine.phase(), SessionPhase::Idle);
        let records = log.read();
        assert_eq!(records[0].activation_used_secs, 120);
        assert_eq!(records[0].reflection, before);
    }

    #[test]
    fn config_deserialization_is_validated() {
        let config: EngineConfig = serde_json::from_str("300").unwrap();
        assert_eq!(config.activation_secs(), 300);
        assert_eq!(serde_json::to_string(&config).unwrap(), "300");
        assert!(serde_json::from_str::<EngineConfig>("0").is_err());
        assert!(serde_json::from_str::<EngineConfig>("86401").is_err());
    }

    #[test]
    fn reflection_answers_ignored_outside_reflection() {
        let mut engine = SessionEngine::default();
        assert!(engine
            .set_reflection_field(ReflectionField::Meaningful(Meaningful::Yes))
            .is_none());
        engine.start_session();
        assert!(engine
            .set_reflection_field(ReflectionField::Meaningful(Meaningful::Yes))
            .is_none());
        assert_eq!(engine.reflection().meaningful, None);
    }

    #[test]
    fn tick_is_noop_when_idle() {
        let mut engine = SessionEngine::default();
        assert!(engine.tick().is_none());
        assert_eq!(engine.activation_remaining_secs(), 900);
    }

    #[test]
    fn config_rejects_out_of_range_activation() {
        assert!(EngineConfig::new(0).is_err());
        assert!(EngineConfig::new(MAX_ACTIVATION_SECS + 1).is_err());
        assert_eq!(EngineConfig::new(60).unwrap().activation_secs(), 60);
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut engine = SessionEngine::default();
        engine.start_session();
        engine.stop_session();
        answer(&mut engine);
        match engine.snapshot_event() {
            Event::StateSnapshot { snapshot, .. } => {
                assert_eq!(snapshot.phase, SessionPhase::Reflection);
                assert!(snapshot.can_finish);
                assert!(!snapshot.is_running);
            }
            _ => panic!("Expected StateSnapshot"),
        }
    }

    #[test]
    fn format_clock_pads() {
        assert_eq!(format_clock(900), "15:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(6000), "100:00");
    }
}
