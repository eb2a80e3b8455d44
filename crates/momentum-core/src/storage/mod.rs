mod config;
pub mod database;
pub mod memory;
pub mod session_log;

pub use config::{CheckinConfig, Config, LogConfig, TimerConfig};
pub use database::Database;
pub use memory::MemoryStore;
pub use session_log::{SessionLog, SessionRecord, SessionSink, SESSIONS_KEY};

use std::path::PathBuf;

use crate::error::Result;

/// String key-value store backing the session log.
pub trait KvStore {
    /// Get a value, `None` when the key is absent.
    fn kv_get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`.
    fn kv_set(&self, key: &str, value: &str) -> Result<()>;
}

impl<T: KvStore + ?Sized> KvStore for &T {
    fn kv_get(&self, key: &str) -> Result<Option<String>> {
        (**self).kv_get(key)
    }

    fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        (**self).kv_set(key, value)
    }
}

/// Returns `~/.config/momentum[-dev]/` based on MOMENTUM_ENV.
///
/// Set MOMENTUM_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("MOMENTUM_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("momentum-dev")
    } else {
        base_dir.join("momentum")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
