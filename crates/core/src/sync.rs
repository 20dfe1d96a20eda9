//! Live interface and firewall synchronization
//!
//! The only component with externally observable side effects on network
//! state. New peers are appended to the daemon config and picked up with a
//! non-disruptive `wg syncconf` reload; forwarding is blocked per address
//! with a FORWARD DROP rule. Rule installation is guarded by a presence
//! check so reapplying a state never stacks duplicate rules.

use crate::command::CommandRunner;
use crate::error::{Error, Result};
use crate::registry::write_atomic;
use crate::types::PeerRecord;
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Capability for mutating the live tunnel daemon and host firewall
#[async_trait]
pub trait InterfaceSynchronizer: Send + Sync {
    /// Add the peer to the daemon's table; nothing may be considered
    /// registered until this succeeds.
    async fn apply_peer(&self, record: &PeerRecord) -> Result<()>;

    /// Drop the peer from the daemon's table (used on deregistration)
    async fn remove_peer(&self, public_key: &str) -> Result<()>;

    /// Install (`enabled = false`) or clear (`enabled = true`) the
    /// forwarding block for an address. Idempotent in both directions.
    async fn set_forwarding(&self, address: Ipv4Addr, enabled: bool) -> Result<()>;
}

/// Build the `[Peer]` block appended to the daemon config
pub(crate) fn peer_block(record: &PeerRecord) -> String {
    let mut block = String::from("\n[Peer]\n");
    block.push_str(&format!("PublicKey = {}\n", record.public_key));
    if let Some(psk) = &record.preshared_key {
        block.push_str(&format!("PresharedKey = {}\n", psk));
    }
    block.push_str(&format!("AllowedIPs = {}/32\n", record.address));
    block
}

/// Remove the `[Peer]` section carrying `public_key` from a daemon config
pub(crate) fn strip_peer_block(conf: &str, public_key: &str) -> String {
    fn matches_key(section: &[&str], public_key: &str) -> bool {
        section.iter().any(|line| {
            line.split_once('=')
                .map(|(k, v)| k.trim() == "PublicKey" && v.trim() == public_key)
                .unwrap_or(false)
        })
    }

    let mut kept: Vec<&str> = Vec::new();
    let mut section: Vec<&str> = Vec::new();
    let mut in_peer = false;
    for line in conf.lines() {
        if line.trim_start().starts_with('[') {
            if in_peer && matches_key(&section, public_key) {
                section.clear();
            } else {
                kept.append(&mut section);
            }
            in_peer = line.trim() == "[Peer]";
        }
        section.push(line);
    }
    if in_peer && matches_key(&section, public_key) {
        section.clear();
    } else {
        kept.append(&mut section);
    }

    let mut out = kept.join("\n");
    if conf.ends_with('\n') && !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Synchronizer driving the `wg`/`wg-quick` tools and iptables
pub struct WgToolSync {
    runner: CommandRunner,
    interface: String,
    conf_path: PathBuf,
}

impl WgToolSync {
    pub fn new(runner: CommandRunner, interface: String, conf_path: PathBuf) -> Self {
        Self {
            runner,
            interface,
            conf_path,
        }
    }

    fn read_conf(&self) -> Result<String> {
        std::fs::read_to_string(&self.conf_path).map_err(|e| {
            Error::Sync(format!(
                "daemon config {} unreadable: {}",
                self.conf_path.display(),
                e
            ))
        })
    }

    fn write_conf(&self, text: &str) -> Result<()> {
        write_atomic(&self.conf_path, text).map_err(|e| {
            Error::Sync(format!(
                "cannot write daemon config {}: {}",
                self.conf_path.display(),
                e
            ))
        })
    }

    /// Reload the running interface from its config without tearing down
    /// existing sessions.
    async fn syncconf(&self) -> Result<()> {
        self.runner
            .shell(&format!(
                "wg syncconf {iface} <(wg-quick strip {iface})",
                iface = self.interface
            ))
            .await?;
        Ok(())
    }

    /// `iptables -C` exits non-zero when the rule is absent
    async fn block_rule_exists(&self, addr: &str) -> Result<bool> {
        match self
            .runner
            .run("iptables", &["-C", "FORWARD", "-s", addr, "-j", "DROP"])
            .await
        {
            Ok(_) => Ok(true),
            Err(Error::Sync(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl InterfaceSynchronizer for WgToolSync {
    async fn apply_peer(&self, record: &PeerRecord) -> Result<()> {
        let before = self.read_conf()?;
        let mut after = before.clone();
        after.push_str(&peer_block(record));
        self.write_conf(&after)?;

        if let Err(e) = self.syncconf().await {
            // the daemon rejected the new table; put the config back
            if let Err(restore) = self.write_conf(&before) {
                error!(
                    "Could not restore {} after failed reload: {}",
                    self.conf_path.display(),
                    restore
                );
            }
            return Err(e);
        }
        info!(
            "Applied peer {} ({}) to {}",
            record.identity, record.address, self.interface
        );
        Ok(())
    }

    async fn remove_peer(&self, public_key: &str) -> Result<()> {
        self.runner
            .run(
                "wg",
                &["set", &self.interface, "peer", public_key, "remove"],
            )
            .await?;
        match self.read_conf() {
            Ok(conf) => self.write_conf(&strip_peer_block(&conf, public_key))?,
            Err(e) => warn!("Skipping config cleanup: {}", e),
        }
        info!("Removed peer {} from {}", public_key, self.interface);
        Ok(())
    }

    async fn set_forwarding(&self, address: Ipv4Addr, enabled: bool) -> Result<()> {
        let addr = address.to_string();
        if enabled {
            if self.block_rule_exists(&addr).await? {
                self.runner
                    .run("iptables", &["-D", "FORWARD", "-s", &addr, "-j", "DROP"])
                    .await?;
                info!("Cleared forwarding block for {}", addr);
            }
        } else if !self.block_rule_exists(&addr).await? {
            self.runner
                .run("iptables", &["-I", "FORWARD", "1", "-s", &addr, "-j", "DROP"])
                .await?;
            info!("Installed forwarding block for {}", addr);
        }
        Ok(())
    }
}
