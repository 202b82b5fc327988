//! HEMS OCPP Node - reports static load points to an OCPP central system
//!
//! # Usage
//!
//! ```bash
//! # Two load points, the first one charging
//! hems-ocpp-node --uri ws://localhost:8887/ocpp \
//!     --loadpoint garage:charging --loadpoint carport
//!
//! # Everything from a file, station ID overridden
//! hems-ocpp-node --config node.json --station-id wallbox
//! ```

mod config;
mod site;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use hems_ocpp::StatusReporter;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::NodeConfig;
use crate::site::{LoadPointEntry, StaticSite};

/// Report load point status to an OCPP 1.6 central system
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file with `ocpp` and `loadpoints` sections
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Central system WebSocket URI (overrides the file)
    #[arg(long)]
    uri: Option<String>,

    /// Charge point identity (overrides the file)
    #[arg(long)]
    station_id: Option<String>,

    /// Load point as NAME or NAME:charging (can be repeated)
    #[arg(long = "loadpoint")]
    loadpoints: Vec<LoadPointEntry>,

    /// Seconds between reconnect attempts and publish passes
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    retry_interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut node = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };

    if let Some(uri) = args.uri {
        node.set_ocpp_key("URI", uri);
    }
    if let Some(station_id) = args.station_id {
        node.set_ocpp_key("StationID", station_id);
    }
    // command line load points replace the file's list
    if !args.loadpoints.is_empty() {
        node.loadpoints = args.loadpoints;
    }

    let mut config = node.ocpp_config()?;
    if let Some(secs) = args.retry_interval {
        config = config.with_retry_interval(Duration::from_secs(secs));
    }

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              HEMS OCPP Node - Load Point Status              ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Station:  {:<50} ║", config.station_id);
    println!("║  URI:      {:<50} ║", truncate(&config.uri, 50));
    println!("║  Points:   {:<50} ║", node.loadpoints.len());
    println!("║  Interval: {:<50} ║", format!("{:?}", config.retry_interval));
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    if node.loadpoints.is_empty() {
        info!("No load points configured, passes will send nothing");
    }
    for (connector, lp) in (1..).zip(&node.loadpoints) {
        info!(
            "Connector {}: {} ({})",
            connector,
            lp.name,
            if lp.charging { "charging" } else { "idle" }
        );
    }

    let site = Arc::new(StaticSite::new(node.title, &node.loadpoints));
    let reporter = StatusReporter::from_config(config, site);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutting down..."),
            Err(e) => error!("Waiting for Ctrl-C: {}", e),
        }
        shutdown.cancel();
    });

    reporter.run(cancel).await;

    Ok(())
}

/// Truncate string with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
