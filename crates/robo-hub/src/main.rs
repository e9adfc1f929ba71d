//! RoboHub entry point.
//!
//! Loads the configuration, starts the hub against the simulated transport,
//! connects the requested robot by name and logs everything the hub reports
//! until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! robo-hub [OPTIONS]
//!
//! Options:
//!   --config    <PATH>   Config file [default: platform config dir]
//!   --robot     <NAME>   Profile name prefix (or part of it) to connect [default: Sphero]
//!   --log-level <LEVEL>  Log filter when RUST_LOG is unset [default: from config]
//! ```
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()            -- TOML settings + profile table
//!  └─ SimulatedTransport::new() -- transport + completion channel
//!  └─ Hub::new()               -- registry + robot apis
//!       ├─ event logger        (Tokio task)
//!       ├─ Ctrl-C handler      (Tokio task)
//!       └─ Hub::run()          (this task)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use robo_hub::application::events::HubEvent;
use robo_hub::application::hub::{Hub, HubRequest};
use robo_hub::infrastructure::storage::config::load_config;
use robo_hub::infrastructure::transport::simulated::SimulatedTransport;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Bluetooth robot hub.
#[derive(Debug, Parser)]
#[command(name = "robo-hub", about = "Discovers, connects and drives Bluetooth robots", version)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "ROBOHUB_CONFIG")]
    config: Option<PathBuf>,

    /// Robot to connect; matches any device whose profile name prefix contains it.
    #[arg(long, default_value = "Sphero", env = "ROBOHUB_ROBOT")]
    robot: String,

    /// Log filter used when `RUST_LOG` is unset.  Overrides the config file.
    #[arg(long, env = "ROBOHUB_LOG")]
    log_level: Option<String>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    let level = cli.log_level.clone().unwrap_or_else(|| config.hub.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    info!("RoboHub starting");

    let (transport, transport_events) = SimulatedTransport::new();
    let (mut hub, mut events) = Hub::new(Arc::new(transport), config.profiles(), config.hub_config());

    // ── Event logger ──────────────────────────────────────────────────────────
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                HubEvent::DeviceState { address, connected } => {
                    info!(%address, connected, "device state changed");
                }
                HubEvent::ConnectProgress { address, message, step } => {
                    info!(%address, step, "{message}");
                }
                HubEvent::Robot { address, event } => info!(%address, ?event, "robot event"),
                HubEvent::DataReceived { .. } => {}
            }
        }
    });

    hub.prepare();

    match hub.auto_connect(&cli.robot) {
        Some(ready) => {
            let robot = cli.robot.clone();
            tokio::spawn(async move {
                if let Ok(address) = ready.await {
                    info!(%address, "{robot} connected");
                }
            });
        }
        None => warn!("no robot named {} found yet", cli.robot),
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let requests = hub.requests();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = requests.send(HubRequest::Shutdown);
        }
    });

    info!("RoboHub ready.  Press Ctrl-C to exit.");
    hub.run(transport_events).await;

    info!("RoboHub stopped");
    Ok(())
}
