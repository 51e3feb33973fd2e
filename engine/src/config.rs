//! Session configuration.
//!
//! Everything a session depends on is passed in explicitly; there is no
//! process-wide default to mutate.

use crate::{
    clock::{SystemTime, TimeSource},
    store::LocalStore,
    Schema,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on a single remote dispatch.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Which local store backs a session.
#[derive(Clone)]
pub enum StorageConfig {
    /// In-memory, lost on teardown
    Memory,
    /// Snapshot file at `path`, created if missing
    File { path: PathBuf },
    /// A caller-provided store implementation
    Custom(Arc<dyn LocalStore>),
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageConfig::Memory => write!(f, "Memory"),
            StorageConfig::File { path } => f.debug_struct("File").field("path", path).finish(),
            StorageConfig::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Configuration passed at session construction.
#[derive(Clone)]
pub struct SessionConfig {
    /// Schema descriptor entity models bind against
    pub schema: Schema,
    /// Local store backing
    pub storage: StorageConfig,
    /// Bound on every remote dispatch
    pub dispatch_timeout: Duration,
    /// Time source for version stamps
    pub time: Arc<dyn TimeSource>,
}

impl SessionConfig {
    /// In-memory storage, default timeout, wall-clock time.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            storage: StorageConfig::Memory,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            time: Arc::new(SystemTime),
        }
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    /// Load storage and timeout settings from environment variables.
    ///
    /// - `CACTUS_STORE_PATH`: file storage at this path; memory when unset
    /// - `CACTUS_DISPATCH_TIMEOUT_MS`: dispatch timeout in milliseconds
    pub fn from_env(schema: Schema) -> Result<Self, ConfigError> {
        let mut config = Self::new(schema);

        if let Ok(path) = env::var("CACTUS_STORE_PATH") {
            if path.trim().is_empty() {
                return Err(ConfigError::EmptyStorePath);
            }
            config.storage = StorageConfig::File {
                path: PathBuf::from(path),
            };
        }

        if let Ok(raw) = env::var("CACTUS_DISPATCH_TIMEOUT_MS") {
            let millis: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
            if millis == 0 {
                return Err(ConfigError::InvalidTimeout(raw));
            }
            config.dispatch_timeout = Duration::from_millis(millis);
        }

        Ok(config)
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("types", &self.schema.types.len())
            .field("storage", &self.storage)
            .field("dispatch_timeout", &self.dispatch_timeout)
            .finish_non_exhaustive()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("CACTUS_STORE_PATH must not be empty")]
    EmptyStorePath,

    #[error("Invalid CACTUS_DISPATCH_TIMEOUT_MS value: {0}")]
    InvalidTimeout(String),
}
