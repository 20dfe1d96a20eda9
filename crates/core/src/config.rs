//! Operator configuration
//!
//! One TOML document describing where the tunnel daemon's files live and
//! the client-facing defaults the daemon config does not carry.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where peer key material comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    /// In-process x25519 generation
    #[default]
    Local,
    /// Delegate to the `wg` tool
    WgTool,
}

/// Manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Directory holding the daemon config, registry, and client profiles
    pub config_dir: PathBuf,

    /// Tunnel interface name
    pub interface: String,

    /// Public host clients connect to
    pub endpoint_host: String,

    /// Interface address (CIDR) used when the daemon config omits one
    pub address: String,

    /// UDP listen port used when the daemon config omits one
    pub listen_port: u16,

    /// DNS server handed to clients
    pub dns: Option<String>,

    /// Ranges clients route through the tunnel
    pub allowed_ips: Vec<String>,

    /// PersistentKeepalive for rendered profiles
    pub keepalive: u16,

    /// Issue preshared keys to new peers
    pub preshared_keys: bool,

    /// Key generation backend
    pub key_source: KeySource,

    /// Run daemon/firewall tools inside this container
    pub docker_container: Option<String>,

    /// Bound on every external tool call
    pub command_timeout_secs: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("/etc/wireguard"),
            interface: "wg0".to_string(),
            endpoint_host: String::new(),
            address: "10.8.0.1/24".to_string(),
            listen_port: 51820,
            dns: None,
            allowed_ips: vec!["0.0.0.0/0".to_string()],
            keepalive: crate::profile::DEFAULT_KEEPALIVE,
            preshared_keys: false,
            key_source: KeySource::default(),
            docker_container: None,
            command_timeout_secs: 10,
        }
    }
}

impl ManagerConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)
                .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the registry document path
    pub fn registry_path(&self) -> PathBuf {
        self.config_dir.join("peers.json")
    }

    /// Get the daemon interface config path
    pub fn wg_conf_path(&self) -> PathBuf {
        self.config_dir.join(format!("{}.conf", self.interface))
    }

    /// Get the client profile directory
    pub fn profiles_dir(&self) -> PathBuf {
        self.config_dir.join("clients")
    }

    /// Get the server private key path
    pub fn private_key_path(&self) -> PathBuf {
        self.config_dir.join("server_private.key")
    }

    /// Get the server public key path
    pub fn public_key_path(&self) -> PathBuf {
        self.config_dir.join("server_public.key")
    }
}
