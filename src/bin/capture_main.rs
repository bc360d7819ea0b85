// src/bin/capture_main.rs
//! Run one capture window against the simulated EMG sensor, or manage records.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use emg_capture::acquisition::{CaptureController, CaptureSnapshot};
use emg_capture::config::constants::logging;
use emg_capture::config::{ConfigLoader, SystemConfig};
use emg_capture::link::simulator::{ActivationPattern, SimulatedCentral};
use emg_capture::link::{LinkEvent, TransportConnector};
use emg_capture::records::{InMemoryRecordStore, NewUserRecord, RecordStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

const LINK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "emg-capture")]
#[command(version)]
#[command(about = "Capture and classify EMG readings from a wireless sensor", long_about = None)]
struct Args {
    /// Configuration file, replacing the default search paths
    #[arg(short, long, env = "EMG_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Capture window length in seconds
    #[arg(short, long)]
    duration: Option<u32>,

    /// Simulated sensor frame interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Simulated activation pattern (constant, sine, burst, ramp, random)
    #[arg(long)]
    pattern: Option<ActivationPattern>,

    /// Print the final snapshot as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one capture window (default)
    Capture,
    /// Append an anthropometric record and list the collection
    Record {
        #[arg(long)]
        age: String,
        #[arg(long)]
        height: String,
        #[arg(long)]
        weight: String,
        /// Collection name, defaults to `records.collection`
        #[arg(long)]
        collection: Option<String>,
    },
    /// Print the effective configuration as TOML
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter = init_tracing();
    let config = load_config(&args)?;
    if std::env::var_os("RUST_LOG").is_none() {
        filter.reload(EnvFilter::new(&config.logging.level))?;
    }

    match args.command.unwrap_or(Command::Capture) {
        Command::Capture => run_capture(config, args.json).await,
        Command::Record {
            age,
            height,
            weight,
            collection,
        } => {
            let collection = collection.unwrap_or_else(|| config.records.collection.clone());
            run_record(&collection, NewUserRecord::new(age, height, weight)).await
        }
        Command::ShowConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Install the subscriber before configuration is read; the returned handle
/// swaps in `logging.level` once it is known.
fn init_tracing() -> reload::Handle<EnvFilter, Registry> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let (filter, handle) = reload::Layer::new(log_filter(rust_log, logging::DEFAULT_LEVEL));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    handle
}

/// `RUST_LOG` wins when it parses; otherwise `level`.
fn log_filter(rust_log: Option<String>, level: &str) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}

fn load_config(args: &Args) -> Result<SystemConfig> {
    let mut loader = match &args.config {
        Some(path) => {
            if !path.exists() {
                bail!("configuration file {} does not exist", path.display());
            }
            ConfigLoader::with_paths(vec![path.clone()])
        }
        None => ConfigLoader::new(),
    };
    let mut config = loader.load_system_config()?;

    if let Some(duration) = args.duration {
        config.capture.duration_secs = duration;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.simulation.frame_interval_ms = interval_ms;
    }
    if let Some(pattern) = &args.pattern {
        config.simulation.pattern = pattern.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn run_capture(config: SystemConfig, json: bool) -> Result<()> {
    let summary = config.get_summary();
    info!(?summary, "starting capture");

    let (central, events) = SimulatedCentral::new(config.simulation.clone())?;
    let connector = TransportConnector::new(Arc::new(central), events, &config.link);
    let classifier = config
        .classifier
        .build()
        .context("classifier bands overlap")?;
    let controller = CaptureController::spawn(&config.capture, classifier, connector.subscribe());

    let mut link_events = connector.subscribe();
    connector.start_discovery().await?;
    wait_for_subscription(&mut link_events).await?;

    let mut updates = controller.subscribe();
    let started = controller.start().await?;
    println!(
        "Capturing for {}s (session {})",
        started.session.duration_secs, started.session.generation
    );

    let mut printed = started.session.history.len();
    let mut remaining = started.session.remaining_seconds;
    let finished = loop {
        tokio::select! {
            changed = updates.changed() => {
                changed.context("capture controller stopped unexpectedly")?;
                let snapshot = updates.borrow_and_update().clone();
                print_progress(&snapshot, &mut printed, &mut remaining);
                if !snapshot.session.is_capturing {
                    break snapshot;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, stopping capture");
                break controller.stop().await?;
            }
        }
    };

    println!(
        "Captured {} readings, final status: {}",
        finished.session.history.len(),
        finished.session.current_status
    );
    if let Some(error) = &finished.last_link_error {
        println!("Link: {}", error);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&finished)?);
    }

    controller.shutdown().await?;
    connector.disconnect().await?;
    Ok(())
}

fn print_progress(snapshot: &CaptureSnapshot, printed: &mut usize, remaining: &mut u32) {
    let session = &snapshot.session;
    for (entry, status) in session
        .history
        .iter()
        .zip(&session.status_history)
        .skip(*printed)
    {
        println!("  {:<16} {}", entry, status);
    }
    *printed = session.history.len();

    if session.remaining_seconds != *remaining {
        *remaining = session.remaining_seconds;
        println!("{}s remaining", session.remaining_seconds);
    }
}

async fn wait_for_subscription(events: &mut broadcast::Receiver<LinkEvent>) -> Result<()> {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(LinkEvent::Subscribed(characteristic)) => {
                    info!(characteristic = %characteristic.uuid, "sensor streaming");
                    return Ok(());
                }
                Ok(LinkEvent::Failed(error)) => return Err(anyhow::Error::from(error)),
                Ok(LinkEvent::LinkLost { peripheral, .. }) => {
                    bail!("link to {} lost before subscription", peripheral)
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => bail!("link event stream closed"),
            }
        }
    };

    tokio::time::timeout(LINK_TIMEOUT, wait)
        .await
        .context("timed out waiting for the sensor to stream")?
}

async fn run_record(collection: &str, record: NewUserRecord) -> Result<()> {
    let store = InMemoryRecordStore::new();
    let created = store.create(collection, record).await?;
    info!(id = %created.id, collection, "record stored");

    for record in store.list(collection).await? {
        println!(
            "{}  age={} height={} weight={}  {}",
            record.timestamp, record.age, record.height, record.weight, record.id
        );
    }
    Ok(())
}
