mod checkin;
mod engine;
mod ticker;

pub use checkin::{CheckinCadence, CHECKIN_INTERVAL_SECS};
pub use engine::{
    format_clock, EngineConfig, SessionEngine, SessionPhase, SessionSnapshot,
    DEFAULT_ACTIVATION_SECS, MAX_ACTIVATION_SECS,
};
pub use ticker::{Ticker, TICK_INTERVAL};
