//! # Momentum Core Library
//!
//! Core logic for Momentum, a three-phase work timer: a short activation
//! countdown to get moving, an open-ended focus count-up with periodic
//! check-ins, and a reflection questionnaire saved to a local session log.
//!
//! ## Architecture
//!
//! - **Session Engine**: A tick-driven state machine; the caller invokes
//!   `tick()` once per second while a session runs
//! - **Ticker**: The single one-second tick source a host owns
//! - **Storage**: A JSON session log over a key-value store (SQLite or
//!   in-memory) and TOML-based configuration
//! - **Controller**: Glue that owns engine, log and ticker and publishes events
//!
//! ## Key Components
//!
//! - [`SessionEngine`]: Core phase state machine
//! - [`SessionLog`]: Append-only record of finished sessions
//! - [`Config`]: Application configuration management
//! - [`SessionController`]: Engine + ticker + log for interactive hosts

pub mod controller;
pub mod error;
pub mod events;
pub mod reflection;
pub mod storage;
pub mod timer;

pub use controller::SessionController;
pub use error::{ConfigError, CoreError, DatabaseError};
pub use events::Event;
pub use reflection::{Meaningful, Perfectionism, Reflection, ReflectionField};
pub use storage::{Config, Database, KvStore, MemoryStore, SessionLog, SessionRecord, SessionSink};
pub use timer::{EngineConfig, SessionEngine, SessionPhase, SessionSnapshot, Ticker};
