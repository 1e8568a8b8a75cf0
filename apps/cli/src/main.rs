//! Shroud CLI
//!
//! Runs the encrypted HTTP egress relay and mints master keys.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shroud_crypto::MasterKey;
use shroud_relay::{RelayConfig, RelayState};
use shroud_settings::Settings;

/// Shroud - End-to-end encrypted HTTP egress relay
#[derive(Parser)]
#[command(name = "shroud")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay
    Serve {
        /// Listen address, overriding the settings file
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Generate a master key and print it as hex
    Keygen,
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "debug"
    } else {
        "info,shroud=debug"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Serve { listen } => serve(cli.config, listen).await,
        Commands::Keygen => {
            println!("{}", MasterKey::generate().to_hex());
            Ok(())
        }
    }
}

async fn serve(config_path: Option<PathBuf>, listen: Option<String>) -> Result<()> {
    let settings = match config_path {
        Some(path) => Settings::load_from(&path).context("failed to load settings")?,
        None => Settings::default(),
    };

    let master_key = settings.master_key()?;

    let whitelisted_hosts: HashSet<String> =
        settings.whitelisted_hosts.iter().cloned().collect();
    if whitelisted_hosts.is_empty() {
        warn!("Whitelist is empty: every transmit will be dropped");
    }

    let state = RelayState::new(RelayConfig {
        whitelisted_hosts,
        master_key,
        max_session_age: Duration::from_secs(settings.max_session_secs),
    });
    let sweeper = state.store().spawn_sweeper();

    let addr = listen.unwrap_or(settings.listen_addr);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tokio::select! {
        result = shroud_relay::serve(listener, state) => {
            result.context("relay server error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    sweeper.stop().await;
    info!("Relay stopped");
    Ok(())
}
