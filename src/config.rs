//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Which backends the selector may try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// Try the relational engine first, fall back to key-value slots.
    #[default]
    Auto,
    /// Treat the relational engine as unavailable.
    KeyValue,
}

impl FromStr for StorageMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "sqlite" | "sql" => Ok(Self::Auto),
            "kv" | "keyvalue" | "key-value" | "fallback" => Ok(Self::KeyValue),
            other => Err(ConfigError::InvalidValue {
                key: "MESSENGER_STORAGE_MODE".into(),
                message: format!("expected `auto` or `kv`, got `{other}`"),
            }),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub mode: StorageMode,
    /// libSQL database file. `:memory:` opens an in-memory database.
    pub db_path: PathBuf,
    /// Directory holding the key-value slots. `None` keeps slots in memory.
    pub kv_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::Auto,
            db_path: PathBuf::from("./data/messenger.db"),
            kv_dir: Some(PathBuf::from("./data/kv")),
        }
    }
}

impl StorageConfig {
    /// Load from `MESSENGER_*` environment variables, defaulting missing ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mode = match lookup("MESSENGER_STORAGE_MODE") {
            Some(raw) => raw.parse()?,
            None => defaults.mode,
        };

        let db_path = lookup("MESSENGER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let kv_dir = match lookup("MESSENGER_KV_DIR") {
            Some(dir) if dir == ":memory:" => None,
            Some(dir) => Some(PathBuf::from(dir)),
            None => defaults.kv_dir,
        };

        Ok(Self {
            mode,
            db_path,
            kv_dir,
        })
    }
}

/// Live conversation polling configuration.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(800),
        }
    }
}

impl PollConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let Some(raw) = lookup("MESSENGER_POLL_INTERVAL_MS") else {
            return Ok(Self::default());
        };
        let millis: u64 = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
            key: "MESSENGER_POLL_INTERVAL_MS".into(),
            message: format!("{e}"),
        })?;
        if millis == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MESSENGER_POLL_INTERVAL_MS".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(Self {
            interval: Duration::from_millis(millis),
        })
    }
}
