//! Server profile reader
//!
//! Normalizes the tunnel daemon's persisted interface configuration into a
//! [`ServerProfile`], filling operator-supplied defaults for the fields the
//! daemon file does not carry (DNS, allowed ranges, endpoint host).

use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::keys;
use crate::types::ServerProfile;
use ipnetwork::Ipv4Network;
use tracing::info;

/// Fields the daemon's `[Interface]` section may carry
#[derive(Debug, Default)]
pub(crate) struct InterfaceConf {
    pub address: Option<String>,
    pub listen_port: Option<u16>,
    pub dns: Option<String>,
    pub private_key: Option<String>,
}

/// Parse the `[Interface]` section of a wg-quick style config
pub(crate) fn parse_interface_conf(text: &str) -> InterfaceConf {
    let mut conf = InterfaceConf::default();
    let mut in_interface = false;
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_interface = line == "[Interface]";
            continue;
        }
        if !in_interface || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            // multiple addresses may be listed; peers allocate from the first
            "Address" => {
                conf.address = Some(value.split(',').next().unwrap_or(value).trim().to_string())
            }
            "ListenPort" => conf.listen_port = value.parse().ok(),
            "DNS" => conf.dns = Some(value.to_string()),
            "PrivateKey" => conf.private_key = Some(value.to_string()),
            _ => {}
        }
    }
    conf
}

/// Reader producing the normalized server profile
#[derive(Debug, Clone)]
pub struct ServerProfileReader {
    config: ManagerConfig,
}

impl ServerProfileReader {
    pub fn new(config: ManagerConfig) -> Self {
        Self { config }
    }

    pub fn read(&self) -> Result<ServerProfile> {
        let conf_path = self.config.wg_conf_path();
        let iface = if conf_path.exists() {
            parse_interface_conf(&std::fs::read_to_string(&conf_path)?)
        } else {
            InterfaceConf::default()
        };

        let address_cidr = iface
            .address
            .clone()
            .unwrap_or_else(|| self.config.address.clone());
        let cidr: Ipv4Network = address_cidr.parse().map_err(|e| {
            Error::Config(format!("invalid interface address '{}': {}", address_cidr, e))
        })?;
        let subnet = Ipv4Network::new(cidr.network(), cidr.prefix())
            .map_err(|e| Error::Config(e.to_string()))?;

        if self.config.endpoint_host.is_empty() {
            return Err(Error::Config(
                "endpoint_host is not configured".to_string(),
            ));
        }
        if self.config.allowed_ips.is_empty() {
            return Err(Error::Config("allowed_ips must not be empty".to_string()));
        }

        let public_key = self.server_public_key(&iface)?;
        Ok(ServerProfile {
            subnet,
            address: cidr.ip(),
            endpoint_host: self.config.endpoint_host.clone(),
            listen_port: iface.listen_port.unwrap_or(self.config.listen_port),
            dns: iface.dns.or_else(|| self.config.dns.clone()),
            allowed_ips: self.config.allowed_ips.clone(),
            public_key,
        })
    }

    /// Locate the server's public key: the key file pair first, then a
    /// derivation from the daemon config's private key.
    fn server_public_key(&self, iface: &InterfaceConf) -> Result<String> {
        let pub_path = self.config.public_key_path();
        if pub_path.exists() {
            let key = std::fs::read_to_string(&pub_path)?.trim().to_string();
            if !key.is_empty() {
                return Ok(key);
            }
        }
        let priv_path = self.config.private_key_path();
        if priv_path.exists() {
            let private = std::fs::read_to_string(&priv_path)?;
            return keys::derive_public_key(&private);
        }
        if let Some(private) = &iface.private_key {
            return keys::derive_public_key(private);
        }
        Err(Error::Config(
            "server public key not found; provision keys first".to_string(),
        ))
    }
}

/// Provision the server key file pair on first run.
///
/// The private key is written with owner-only permissions; the public key
/// is returned (and written beside it) for display and profile rendering.
pub fn ensure_server_keys(config: &ManagerConfig) -> Result<String> {
    let pub_path = config.public_key_path();
    let priv_path = config.private_key_path();

    if pub_path.exists() {
        let key = std::fs::read_to_string(&pub_path)?.trim().to_string();
        if !key.is_empty() {
            return Ok(key);
        }
    }
    if priv_path.exists() {
        let public = keys::derive_public_key(&std::fs::read_to_string(&priv_path)?)?;
        std::fs::write(&pub_path, format!("{}\n", public))?;
        return Ok(public);
    }

    std::fs::create_dir_all(&config.config_dir)?;
    let (private, public) = keys::generate_keypair();
    std::fs::write(&priv_path, format!("{}\n", private))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&priv_path, std::fs::Permissions::from_mode(0o600))?;
    }
    std::fs::write(&pub_path, format!("{}\n", public))?;
    info!("Generated server key pair; public key {}", public);
    Ok(public)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const SAMPLE_CONF: &str = "\
[Interface]
Address = 10.9.0.1/24
ListenPort = 51821
PrivateKey = iIGHTLplQ1z1nJHdGmc7CRx8a1REQkO0zLsTPE6DtF8=

[Peer]
PublicKey = SOMEPEERKEY
AllowedIPs = 10.9.0.2/32
";

    fn test_config(dir: &std::path::Path) -> ManagerConfig {
        let mut config = ManagerConfig::default();
        config.config_dir = dir.to_path_buf();
        config.endpoint_host = "vpn.example.com".to_string();
        config
    }

    #[test]
    fn test_parse_interface_section_only() {
        let conf = parse_interface_conf(SAMPLE_CONF);
        assert_eq!(conf.address.as_deref(), Some("10.9.0.1/24"));
        assert_eq!(conf.listen_port, Some(51821));
        assert!(conf.dns.is_none());
        assert!(conf.private_key.is_some());
    }

    #[test]
    fn test_parse_first_of_multiple_addresses() {
        let conf = parse_interface_conf("[Interface]\nAddress = 10.9.0.1/24, fd00::1/64\n");
        assert_eq!(conf.address.as_deref(), Some("10.9.0.1/24"));
    }

    #[test]
    fn test_read_prefers_daemon_config_values() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::write(config.wg_conf_path(), SAMPLE_CONF).unwrap();
        std::fs::write(config.public_key_path(), "SERVERPUB\n").unwrap();

        let profile = ServerProfileReader::new(config).read().unwrap();
        assert_eq!(profile.subnet.to_string(), "10.9.0.0/24");
        assert_eq!(profile.address, Ipv4Addr::new(10, 9, 0, 1));
        assert_eq!(profile.listen_port, 51821);
        assert_eq!(profile.public_key, "SERVERPUB");
    }

    #[test]
    fn test_read_falls_back_to_operator_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        std::fs::write(config.public_key_path(), "SERVERPUB\n").unwrap();

        let profile = ServerProfileReader::new(config).read().unwrap();
        assert_eq!(profile.subnet.to_string(), "10.8.0.0/24");
        assert_eq!(profile.address, Ipv4Addr::new(10, 8, 0, 1));
        assert_eq!(profile.listen_port, 51820);
    }

    #[test]
    fn test_read_derives_public_key_from_daemon_private_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let (private, public) = keys::generate_keypair();
        std::fs::write(
            config.wg_conf_path(),
            format!("[Interface]\nAddress = 10.8.0.1/24\nPrivateKey = {}\n", private),
        )
        .unwrap();

        let profile = ServerProfileReader::new(config).read().unwrap();
        assert_eq!(profile.public_key, public);
    }

    #[test]
    fn test_read_fails_without_key_material() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let err = ServerProfileReader::new(config).read().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_read_fails_without_endpoint_host() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.endpoint_host = String::new();
        std::fs::write(config.public_key_path(), "SERVERPUB\n").unwrap();
        assert!(matches!(
            ServerProfileReader::new(config).read(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_ensure_server_keys_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let first = ensure_server_keys(&config).unwrap();
        let second = ensure_server_keys(&config).unwrap();
        assert_eq!(first, second);
        assert!(config.private_key_path().exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(config.private_key_path())
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
