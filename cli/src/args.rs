//! Command-line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Offline-first record store driven from the shell.
///
/// Records live in a local snapshot file. Without `--echo-remote` every
/// remote dispatch fails, so mutations stay local-pending.
#[derive(Debug, Parser)]
#[command(name = "cactus", version, about)]
pub struct Args {
    /// Schema descriptor (JSON)
    #[arg(long, short = 's')]
    pub schema: PathBuf,

    /// Entity type to operate on
    #[arg(long = "type", short = 't')]
    pub type_name: String,

    /// Store file; overrides CACTUS_STORE_PATH
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Identity field of the entity type
    #[arg(long, default_value = "id")]
    pub identity: String,

    /// Dispatch against an in-process remote that accepts everything
    #[arg(long)]
    pub echo_remote: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a record from a JSON object
    Add { input: String },
    /// Merge a JSON object (with identity) over an existing record
    Update { input: String },
    /// Remove a record by id
    Remove { id: String },
    /// Print one record
    Get { id: String },
    /// Print every record of the type
    List,
    /// Delete the store file
    Purge,
}
