//! Peer Commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::output::{print_item, print_list, print_success, OutputFormat, TableDisplay};
use wgplane_core::{Engine, ManagerConfig, PeerStore, PeerSummary};

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration and provision server keys
    Init,

    /// Register a new peer and print its connection profile
    Add {
        /// Peer identity
        identity: String,
    },

    /// List registered peers
    List,

    /// Allow forwarding for a peer
    Enable {
        /// Peer identity
        identity: String,
    },

    /// Block forwarding for a peer without removing it
    Disable {
        /// Peer identity
        identity: String,
    },

    /// Deregister a peer
    Remove {
        /// Peer identity
        identity: String,
    },

    /// Print a peer's connection profile
    Profile {
        /// Peer identity
        identity: String,

        /// Write the profile to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Peer display wrapper for serialization
#[derive(Serialize)]
pub struct PeerDisplay {
    pub identity: String,
    pub address: String,
    pub public_key: String,
    pub created: String,
    pub enabled: bool,
}

impl From<&PeerSummary> for PeerDisplay {
    fn from(peer: &PeerSummary) -> Self {
        Self {
            identity: peer.identity.clone(),
            address: peer.address.to_string(),
            public_key: peer.public_key.clone(),
            created: peer.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            enabled: peer.enabled,
        }
    }
}

impl TableDisplay for PeerDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Identity", "Address", "Public Key", "Created", "Enabled"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.identity.clone(),
            self.address.clone(),
            self.public_key.clone(),
            self.created.clone(),
            self.enabled.to_string(),
        ]
    }
}

pub async fn execute(
    cmd: Commands,
    config: &ManagerConfig,
    config_path: &Path,
    engine: &Engine,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        Commands::Init => {
            if !config_path.exists() {
                config.save(config_path)?;
            }
            let public_key = wgplane_core::ensure_server_keys(config)?;
            PeerStore::new(config.registry_path()).load()?;
            print_success(&format!("Initialized {}", config.config_dir.display()));
            println!("Server public key: {}", public_key);
            println!("Operator config: {}", config_path.display());
        }

        Commands::Add { identity } => {
            let peer = engine.register_peer(&identity).await?;
            print_item(&PeerDisplay::from(&peer.summary), format);
            println!();
            println!("{}", peer.profile);
        }

        Commands::List => {
            let peers = engine.list_peers().await?;
            let displays: Vec<PeerDisplay> = peers.iter().map(PeerDisplay::from).collect();
            print_list(&displays, format);
        }

        Commands::Enable { identity } => {
            let peer = engine.set_peer_enabled(&identity, true).await?;
            print_success(&format!("Peer {} enabled", peer.identity));
        }

        Commands::Disable { identity } => {
            let peer = engine.set_peer_enabled(&identity, false).await?;
            print_success(&format!("Peer {} disabled", peer.identity));
        }

        Commands::Remove { identity } => {
            engine.remove_peer(&identity).await?;
            print_success(&format!("Peer {} removed", identity));
        }

        Commands::Profile { identity, output } => {
            let profile = engine.download_profile(&identity).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &profile)?;
                    print_success(&format!("Profile written to {}", path.display()));
                }
                None => print!("{}", profile),
            }
        }
    }

    Ok(())
}
