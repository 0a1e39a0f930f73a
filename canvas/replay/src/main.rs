//! Canvas Replay - NDJSON Intent Replayer
//!
//! Feeds a stream of intents (one JSON object per line) into a single canvas
//! session and prints one JSON outcome per intent on stdout. Useful for
//! reproducing a conversation offline and for exporting the resulting
//! session as a checkpoint.
//!
//! # Usage
//!
//! ```bash
//! # Replay from stdin
//! cat intents.ndjson | canvas-replay
//!
//! # Replay a file and save the final session
//! canvas-replay --input intents.ndjson --checkpoint session.json
//!
//! # Continue from an earlier checkpoint with strict duplicate ids
//! canvas-replay --restore session.json --duplicate-policy strict < more.ndjson
//!
//! # Verbose logging (stderr)
//! RUST_LOG=debug canvas-replay --input intents.ndjson
//! ```
//!
//! # Environment Variables
//!
//! - `CANVAS_CONFIG`: configuration file path
//! - `CANVAS_MAX_DEPTH`, `CANVAS_MAX_INPUT_BYTES`, `CANVAS_DUPLICATE_POLICY`,
//!   `CANVAS_MAX_INSTANCES`: override the configuration file
//! - `RUST_LOG`: log filter
//!
//! # Exit Status
//!
//! Rejected intents are reported on stdout and do not fail the run. The exit
//! status is non-zero only when input, output or configuration fails.

mod replay;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use canvas_core::config::{default_config_path, load_config_from_path, ConfigOverrides};
use canvas_core::{CanvasConfigFile, Checkpoint, DuplicatePolicy, Session};
use clap::Parser;
use tokio::io::{self, AsyncRead, BufReader};
use tracing::{error, info};

use replay::replay;

/// Canvas Replay - replay NDJSON intents into a canvas session
#[derive(Parser, Debug)]
#[command(name = "canvas-replay")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// NDJSON intent file (stdin when omitted)
    #[arg(short = 'i', long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "CANVAS_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum nesting depth of a component tree
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Maximum size of one component in bytes
    #[arg(long, value_name = "BYTES")]
    max_input_bytes: Option<usize>,

    /// Maximum number of instances on the canvas (0 = unlimited)
    #[arg(long, value_name = "N")]
    max_instances: Option<usize>,

    /// What to do when an admitted id is already on the canvas
    #[arg(long, value_name = "POLICY")]
    duplicate_policy: Option<DuplicatePolicy>,

    /// Checkpoint to restore before replaying
    #[arg(long, value_name = "FILE")]
    restore: Option<PathBuf>,

    /// Where to write the final checkpoint
    #[arg(long, value_name = "FILE")]
    checkpoint: Option<PathBuf>,
}

/// Initialize logging on stderr so stdout stays pure NDJSON
fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("canvas_replay=info".parse()?)
                .add_directive("canvas_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    Ok(())
}

/// Resolve configuration: defaults, then file, then environment, then flags
fn resolve_config(args: &Args) -> Result<CanvasConfigFile> {
    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(depth) = args.max_depth {
        overrides = overrides.with_max_depth(depth);
    }
    if let Some(bytes) = args.max_input_bytes {
        overrides = overrides.with_max_input_bytes(bytes);
    }
    if let Some(policy) = args.duplicate_policy {
        overrides = overrides.with_duplicate_policy(policy);
    }
    if let Some(max) = args.max_instances {
        overrides = overrides.with_max_instances(max);
    }
    overrides.apply(&mut config);

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn read_checkpoint(path: &Path) -> Result<Checkpoint> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read checkpoint: {path:?}"))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid checkpoint: {path:?}"))
}

async fn write_checkpoint(path: &Path, checkpoint: &Checkpoint) -> Result<()> {
    let encoded =
        serde_json::to_vec_pretty(checkpoint).context("Failed to encode checkpoint")?;
    tokio::fs::write(path, encoded)
        .await
        .with_context(|| format!("Failed to write checkpoint: {path:?}"))
}

async fn open_input(path: Option<&Path>) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input: {path:?}"))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stdin())),
    }
}

async fn run(args: Args) -> Result<()> {
    let config = resolve_config(&args)?;
    info!(
        source = %config.source(),
        max_depth = config.limits.max_depth,
        max_input_bytes = config.limits.max_input_bytes,
        max_instances = config.max_instances,
        duplicate_policy = %config.duplicate_policy,
        "Configuration resolved"
    );

    let session = Session::new(&config.session_options());

    if let Some(ref path) = args.restore {
        let checkpoint = read_checkpoint(path).await?;
        session
            .restore(checkpoint)
            .with_context(|| format!("Checkpoint rejected: {path:?}"))?;
        info!(path = ?path, "Restored checkpoint");
    }

    let input = open_input(args.input.as_deref()).await?;
    let mut stdout = io::stdout();
    let summary = replay(&session, BufReader::new(input), &mut stdout).await?;

    info!(
        lines = summary.lines,
        applied = summary.applied,
        rejected = summary.rejected,
        instances = session.canvas().len(),
        last_update = session.store().last_update(),
        "Replay finished"
    );

    if let Some(ref path) = args.checkpoint {
        write_checkpoint(path, &session.checkpoint()).await?;
        info!(path = ?path, "Checkpoint written");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging()?;

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(error = %e, "Replay failed");
            Err(e)
        }
    }
}
