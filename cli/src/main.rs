//! Cactus CLI - offline-first record store driven from the shell.
//!
//! Opens a file-backed session for one entity type, runs a single command
//! and prints the result as JSON on stdout. Logs go to stderr.

mod args;
mod error;

use crate::args::{Args, Command};
use crate::error::{CliError, Result};
use cactus_engine::{
    remote::mock::MemoryRemote, Model, ModelConfig, MutationOutcome, Record, Remote, Schema,
    Session, SessionConfig, StorageConfig,
};
use clap::Parser;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Store file used when neither `--store` nor `CACTUS_STORE_PATH` is set.
const DEFAULT_STORE_PATH: &str = "cactus-store.json";

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cactus_engine=info,cactus_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let args = Args::parse();

    run(args).await?;

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let schema_text = std::fs::read_to_string(&args.schema).map_err(|source| CliError::Schema {
        path: args.schema.display().to_string(),
        source,
    })?;
    let schema = Schema::from_json(&schema_text)?;

    let mut config = SessionConfig::from_env(schema)?;
    if let Some(path) = &args.store {
        config = config.with_storage(StorageConfig::File { path: path.clone() });
    } else if matches!(config.storage, StorageConfig::Memory) {
        config = config.with_storage(StorageConfig::File {
            path: PathBuf::from(DEFAULT_STORE_PATH),
        });
    }
    tracing::debug!(?config, "Loaded configuration");

    let echo = args
        .echo_remote
        .then(|| Arc::new(MemoryRemote::new().with_identity_field(args.identity.clone())));
    let remote: Arc<dyn Remote> = match &echo {
        Some(remote) => Arc::clone(remote) as Arc<dyn Remote>,
        None => Arc::new(MemoryRemote::offline()),
    };

    let session = Session::init(config, remote)?;
    let model = session.attach_model(
        ModelConfig::new(args.type_name.clone()).with_identity_field(args.identity.clone()),
    )?;

    // The echo remote starts out knowing what earlier runs stored locally.
    if let Some(remote) = &echo {
        for record in model.list()? {
            remote.seed(model.type_name(), record.to_value(&args.identity));
        }
    }

    match args.command {
        Command::Add { input } => {
            let outcome = model.add(serde_json::from_str(&input)?).await?;
            print(&outcome_json(&model, &outcome))?;
        }
        Command::Update { input } => {
            let outcome = model.update(serde_json::from_str(&input)?).await?;
            print(&outcome_json(&model, &outcome))?;
        }
        Command::Remove { id } => {
            let mut input = serde_json::Map::new();
            input.insert(args.identity.clone(), Value::String(id));
            let outcome = model.remove(Value::Object(input)).await?;
            print(&outcome_json(&model, &outcome))?;
        }
        Command::Get { id } => {
            let record = model.get(&id)?;
            print(&record.map_or(Value::Null, |r| r.to_value(&args.identity)))?;
        }
        Command::List => {
            let records: Vec<Value> = model
                .list()?
                .iter()
                .map(|r| r.to_value(&args.identity))
                .collect();
            print(&Value::Array(records))?;
        }
        Command::Purge => {
            session.purge()?;
            tracing::info!("Store purged");
        }
    }

    Ok(())
}

fn outcome_json(model: &Model, outcome: &MutationOutcome) -> Value {
    let identity = model.entity().identity_field();
    let to_value = |record: &Record| record.to_value(identity);
    json!({
        "record": to_value(&outcome.record),
        "confirmed": outcome.is_confirmed(),
        "resolution": outcome.resolution(),
        "response": outcome.response().map(to_value),
        "remoteError": outcome.remote_error().map(ToString::to_string),
    })
}

fn print(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
