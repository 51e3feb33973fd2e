//! Unified error handling for the CLI.

use cactus_engine::ConfigError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] cactus_engine::Error),

    #[error("Could not read schema {path}: {source}")]
    Schema {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON argument: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for commands.
pub type Result<T> = std::result::Result<T, CliError>;
