//! Telemote - Main Entry Point
//!
//! Boots the mote controller: configuration defaults plus an optional TOML
//! overlay, structured logging, the MQTT link, and the cooperative runtime
//! loop around the lifecycle state machine.

use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process;
use telemote::config::{ClientConfig, ConfigFile};
use telemote::error::MoteResult;
use telemote::mote::{Mote, MoteRuntime};
use telemote::net::{NodeAddress, StaticNetwork, DEFAULT_LINK_ADDRESS};
use telemote::observability::{init_default_logging, LogIndicator};
use telemote::sensor::SimulatedSensors;
use telemote::transport::mqtt::MqttLink;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Mote telemetry controller
#[derive(Parser)]
#[command(name = "telemote")]
#[command(about = "Connection-lifecycle and telemetry-publishing controller")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller
    Run,
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("starting telemote v{}", env!("CARGO_PKG_VERSION"));

    let (config, address) = match load_configuration(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_controller(config, address).await,
        Commands::Config { show } => handle_config_command(&config, &address, show),
    };

    if let Err(e) = result {
        error!("command failed: {}", e);
        process::exit(1);
    }

    info!("shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> MoteResult<(ClientConfig, NodeAddress)> {
    let mut config = ClientConfig::default();
    let mut address = DEFAULT_LINK_ADDRESS;

    let overlay = match config_path {
        Some(path) => {
            info!("loading configuration from: {}", path.display());
            Some(ConfigFile::load(path)?)
        }
        None => {
            // Try default locations
            let default_paths = ["telemote.toml", "config/telemote.toml"];
            let mut found = None;
            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("loading configuration from: {}", path.display());
                    found = Some(ConfigFile::load(&path)?);
                    break;
                }
            }
            found
        }
    };

    if let Some(overlay) = overlay {
        overlay.apply_to(&mut config)?;
        if let Some(link_address) = overlay.link_address()? {
            address = link_address;
        }
    }

    Ok((config, address))
}

async fn run_controller(config: ClientConfig, address: NodeAddress) -> MoteResult<()> {
    let route: Option<IpAddr> = config.broker_host.as_str().parse().ok();
    let network = StaticNetwork::new(address, route);

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let link = MqttLink::new(event_tx);

    let mote = Mote::new(
        config,
        link,
        Box::new(network),
        Box::new(LogIndicator),
        Box::new(SimulatedSensors),
    );
    let runtime = MoteRuntime::new(mote, event_rx);

    info!("controller running; press Ctrl-C to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, shutting down");
            Ok(())
        }
        result = runtime.run() => result,
    }
}

fn handle_config_command(
    config: &ClientConfig,
    address: &NodeAddress,
    show: bool,
) -> MoteResult<()> {
    if show {
        println!("org_id = {:?}", config.org_id.as_str());
        println!("type_id = {:?}", config.type_id.as_str());
        println!("broker_host = {:?}", config.broker_host.as_str());
        println!("broker_port = {}", config.broker_port);
        println!("command_filter = {:?}", config.command_filter.as_str());
        println!(
            "publish_interval_secs = {}",
            config.publish_interval.as_secs()
        );
        println!(
            "link_address = \"{}\"",
            address
                .iter()
                .map(|byte| format!("{byte:02x}"))
                .collect::<Vec<_>>()
                .join(":")
        );
    }

    info!("configuration validation complete");
    Ok(())
}
