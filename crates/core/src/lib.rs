//! WgPlane Core Library
//!
//! Peer registry and address-allocation engine for a WireGuard peer group:
//! provisions peer identities, allocates unique host addresses from the
//! server subnet, persists peer metadata, renders connection profiles, and
//! keeps the live tunnel interface and host firewall in step with the
//! registry.

pub mod allocator;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod keys;
pub mod profile;
pub mod registry;
pub mod server_profile;
pub mod sync;
pub mod types;

// Re-export commonly used types
pub use command::CommandRunner;
pub use config::{KeySource, ManagerConfig};
pub use engine::Engine;
pub use error::{Error, Result};
pub use keys::{KeyProvider, WgToolKeyProvider, X25519KeyProvider};
pub use registry::{PeerStore, Registry};
pub use server_profile::{ensure_server_keys, ServerProfileReader};
pub use sync::{InterfaceSynchronizer, WgToolSync};
pub use types::*;

/// WgPlane version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default operator config path
pub fn default_config_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".wgplane")
        .join("config.toml")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
