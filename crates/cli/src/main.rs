//! WgPlane CLI - Main Entry Point
//!
//! Operator front end for the peer control plane: registers peers, toggles
//! their forwarding permission, and hands out connection profiles.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

mod commands;
mod output;

use commands::Commands;
use wgplane_core::{
    CommandRunner, Engine, InterfaceSynchronizer, KeyProvider, KeySource, ManagerConfig,
    WgToolKeyProvider, WgToolSync, X25519KeyProvider,
};

/// WgPlane CLI - WireGuard peer control plane
#[derive(Parser)]
#[command(name = "wgplane")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Operator configuration file
    #[arg(short, long, global = true, env = "WGPLANE_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Wire the production engine from operator configuration
fn build_engine(config: ManagerConfig) -> Engine {
    let runner = CommandRunner::new(
        config.docker_container.clone(),
        config.command_timeout_secs,
    );
    let keys: Arc<dyn KeyProvider> = match config.key_source {
        KeySource::Local => Arc::new(X25519KeyProvider::new(config.preshared_keys)),
        KeySource::WgTool => Arc::new(WgToolKeyProvider::new(
            runner.clone(),
            config.preshared_keys,
        )),
    };
    let sync: Arc<dyn InterfaceSynchronizer> = Arc::new(WgToolSync::new(
        runner,
        config.interface.clone(),
        config.wg_conf_path(),
    ));
    Engine::new(config, keys, sync)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let config_path = cli
        .config
        .unwrap_or_else(wgplane_core::default_config_path);
    let config = ManagerConfig::load(&config_path)?;
    let engine = build_engine(config.clone());

    commands::execute(cli.command, &config, &config_path, &engine, cli.format).await
}
