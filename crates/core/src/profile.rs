//! Client profile rendering
//!
//! Pure formatting of a client-importable configuration, plus the on-disk
//! artifact directory. Rendering is deterministic so a re-download matches
//! the artifact written at creation byte for byte.

use crate::error::Result;
use crate::types::{PeerRecord, ServerProfile};
use std::path::{Path, PathBuf};

/// PersistentKeepalive policy default
pub const DEFAULT_KEEPALIVE: u16 = 25;

/// Render the client-side configuration for one peer
pub fn render(record: &PeerRecord, server: &ServerProfile, keepalive: u16) -> String {
    let mut out = String::from("[Interface]\n");
    out.push_str(&format!("PrivateKey = {}\n", record.private_key));
    out.push_str(&format!("Address = {}/32\n", record.address));
    if let Some(dns) = &server.dns {
        out.push_str(&format!("DNS = {}\n", dns));
    }
    out.push_str("\n[Peer]\n");
    out.push_str(&format!("PublicKey = {}\n", server.public_key));
    if let Some(psk) = &record.preshared_key {
        out.push_str(&format!("PresharedKey = {}\n", psk));
    }
    out.push_str(&format!("Endpoint = {}\n", server.endpoint()));
    out.push_str(&format!("AllowedIPs = {}\n", server.allowed_ips.join(", ")));
    out.push_str(&format!("PersistentKeepalive = {}\n", keepalive));
    out
}

/// Directory of rendered profile artifacts, one per peer
#[derive(Debug, Clone)]
pub struct ProfileDir {
    dir: PathBuf,
}

impl ProfileDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Artifact path for an identity
    pub fn path_for(&self, identity: &str) -> PathBuf {
        self.dir.join(format!("{}.conf", identity))
    }

    pub fn write(&self, identity: &str, profile: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(identity);
        std::fs::write(&path, profile)?;
        Ok(path)
    }

    pub fn read(&self, identity: &str) -> Result<Option<String>> {
        let path = self.path_for(identity);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the artifact; an already-absent file is not an error.
    pub fn delete(&self, identity: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(identity)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
