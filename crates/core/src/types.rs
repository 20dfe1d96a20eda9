//! Shared data model for the peer control plane

use chrono::{DateTime, Utc};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Key material issued to one peer
#[derive(Debug, Clone)]
pub struct KeySet {
    pub private_key: String, // Base64
    pub public_key: String,  // Base64
    pub preshared_key: Option<String>,
}

/// Normalized view of the tunnel interface the server runs
#[derive(Debug, Clone)]
pub struct ServerProfile {
    /// Subnet peers are allocated from
    pub subnet: Ipv4Network,
    /// The server's own host address inside the subnet
    pub address: Ipv4Addr,
    /// Public host clients connect to
    pub endpoint_host: String,
    /// UDP listen port
    pub listen_port: u16,
    /// DNS server handed to clients
    pub dns: Option<String>,
    /// Ranges clients route through the tunnel
    pub allowed_ips: Vec<String>,
    /// Server public key (Base64)
    pub public_key: String,
}

impl ServerProfile {
    /// Client-facing endpoint in `host:port` form
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.endpoint_host, self.listen_port)
    }
}

/// A registered peer, as persisted in the registry document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRecord {
    pub identity: String,
    /// Retained only so the rendered profile can be re-downloaded
    pub private_key: String,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preshared_key: Option<String>,
    /// Unique host address within the server subnet (/32 semantics)
    pub address: Ipv4Addr,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Listing view of a peer, without key secrets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerSummary {
    pub identity: String,
    pub public_key: String,
    pub address: Ipv4Addr,
    pub created_at: DateTime<Utc>,
    pub enabled: bool,
}

impl From<&PeerRecord> for PeerSummary {
    fn from(record: &PeerRecord) -> Self {
        Self {
            identity: record.identity.clone(),
            public_key: record.public_key.clone(),
            address: record.address,
            created_at: record.created_at,
            enabled: record.enabled,
        }
    }
}

/// Result of a successful registration
#[derive(Debug, Clone)]
pub struct NewPeer {
    pub summary: PeerSummary,
    pub profile: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PeerRecord {
        PeerRecord {
            identity: "alice".to_string(),
            private_key: "PRIV".to_string(),
            public_key: "PUB".to_string(),
            preshared_key: Some("PSK".to_string()),
            address: Ipv4Addr::new(10, 8, 0, 2),
            created_at: Utc::now(),
            enabled: true,
        }
    }

    #[test]
    fn test_summary_strips_key_material() {
        let summary = PeerSummary::from(&record());
        let value = serde_json::to_value(&summary).unwrap();
        assert!(value.get("private_key").is_none());
        assert!(value.get("preshared_key").is_none());
        assert_eq!(value["public_key"], "PUB");
    }

    #[test]
    fn test_record_enabled_defaults_to_true() {
        let json = r#"{
            "identity": "bob",
            "private_key": "PRIV",
            "public_key": "PUB",
            "address": "10.8.0.3",
            "created_at": "2024-01-01T00:00:00Z"
        }"#;
        let record: PeerRecord = serde_json::from_str(json).unwrap();
        assert!(record.enabled);
        assert!(record.preshared_key.is_none());
    }

    #[test]
    fn test_endpoint_formatting() {
        let profile = ServerProfile {
            subnet: "10.8.0.0/24".parse().unwrap(),
            address: Ipv4Addr::new(10, 8, 0, 1),
            endpoint_host: "vpn.example.com".to_string(),
            listen_port: 51820,
            dns: None,
            allowed_ips: vec!["0.0.0.0/0".to_string()],
            public_key: "PUB".to_string(),
        };
        assert_eq!(profile.endpoint(), "vpn.example.com:51820");
    }
}
