//! Meshgate Node - configuration plane of a mesh bridge on a terminal
//!
//! This binary runs the configuration plane against a simulated network:
//! - Commands are read from stdin as `<topic> <payload>` lines
//! - Status and events are written to stdout as JSON lines
//! - Logs go to stderr and follow the `log_level` command

mod logging;
mod sim;

use anyhow::Context;
use clap::Parser;
use meshgate_bridge::{
    Collaborators, ConfigPlane, ConfigPlaneHandle, LogSinks, PlaneConfig, StaticModelTable,
};
use meshgate_core::{DeviceModel, LastSeenPolicy, LogLevel};
use meshgate_state::{MemorySettings, StateCache};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use sim::{SimulatedController, StdoutTransport};

#[derive(Parser)]
#[command(name = "meshgate-node")]
#[command(about = "Mesh bridge configuration plane driven from stdin")]
struct Args {
    /// JSON configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Base topic (overrides the configuration file)
    #[arg(long)]
    base_topic: Option<String>,

    /// Settings snapshot file (overrides the configuration file)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Initial log level: error, warn, info or debug
    #[arg(long)]
    log_level: Option<String>,

    /// Default last-seen policy when the settings have none
    #[arg(long)]
    last_seen: Option<String>,

    /// JSON file mapping model identifiers to model metadata
    #[arg(long)]
    models: Option<PathBuf>,

    /// Make every simulated device removal fail
    #[arg(long)]
    fail_removal: bool,

    /// Enable verbose logging
    #[arg(long, short)]
    verbose: bool,
}

/// Configuration file merged with command line overrides
fn load_config(args: &Args) -> anyhow::Result<PlaneConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            PlaneConfig::from_json(&data)?
        }
        None => PlaneConfig::default(),
    };

    if let Some(base_topic) = &args.base_topic {
        config.base_topic = base_topic.clone();
    }
    if let Some(settings) = &args.settings {
        config.settings_path = Some(settings.clone());
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.parse::<LogLevel>()?;
    }
    if let Some(policy) = &args.last_seen {
        config.last_seen = policy.parse::<LastSeenPolicy>()?;
    }
    if args.verbose {
        config.log_level = LogLevel::Debug;
    }

    config.validate()?;
    Ok(config)
}

fn load_models(path: Option<&Path>) -> anyhow::Result<StaticModelTable> {
    let mut table = StaticModelTable::new();
    let Some(path) = path else {
        return Ok(table);
    };

    let data = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let models: HashMap<String, DeviceModel> =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    for (model_id, model) in models {
        table.insert(model_id, model);
    }
    Ok(table)
}

/// Split an input line into topic and payload; blank lines and `#` comments yield nothing
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.trim_start().starts_with('#') {
        return None;
    }
    match line.trim_start().split_once(' ') {
        Some((topic, payload)) => Some((topic, payload)),
        None => Some((line.trim(), "")),
    }
}

async fn read_commands(handle: &ConfigPlaneHandle) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed");
                    return Ok(());
                };
                let Some((topic, payload)) = parse_line(&line) else {
                    continue;
                };
                if !handle.dispatch(topic.to_string(), payload.to_string()).await? {
                    warn!("No configuration command on topic {}", topic);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let log_sink = logging::init(config.log_level)?;

    info!("Starting Meshgate Node v{}", meshgate_bridge::VERSION);

    let settings = match &config.settings_path {
        Some(path) => {
            let settings = MemorySettings::open(path)
                .with_context(|| format!("loading settings from {}", path.display()))?;
            info!("Settings loaded from {}", path.display());
            settings
        }
        None => {
            info!("Settings kept in memory only");
            MemorySettings::new()
        }
    };
    let settings = Arc::new(settings);

    let network = Arc::new(SimulatedController::from_settings(&settings, args.fail_removal));
    info!("Simulated network with {} devices", settings.devices().len());
    if args.fail_removal {
        warn!("Device removals will fail");
    }

    let models = load_models(args.models.as_deref())?;
    debug!("{} device models loaded", models.len());

    let collaborators = Collaborators {
        network,
        settings,
        state_cache: Arc::new(StateCache::new()),
        transport: Arc::new(StdoutTransport::new(config.log_topic())),
        models: Arc::new(models),
        log_sinks: LogSinks::new().with(log_sink),
    };

    let (plane, handle) = ConfigPlane::new(config, collaborators);
    let plane_task = tokio::spawn(plane.run());

    let input = read_commands(&handle).await;

    if let Ok(stats) = handle.stats().await {
        info!(
            "Processed {} commands ({} failed), ignored {} messages",
            stats.messages_claimed, stats.commands_failed, stats.messages_ignored
        );
    }
    // The plane may already have stopped on a startup error
    let _ = handle.shutdown().await;
    plane_task.await??;
    input?;

    info!("Meshgate Node stopped");
    Ok(())
}
