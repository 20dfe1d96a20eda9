//! Operation orchestration
//!
//! Owns the single mutation path: every mutating operation takes the write
//! lock, re-reads the persisted registry, applies external side effects,
//! and only then commits the new snapshot. Two concurrent registrations
//! can therefore never settle on the same free address. Reads skip the
//! lock and load the document fresh.

use crate::allocator;
use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::identity::validate_identity;
use crate::keys::KeyProvider;
use crate::profile::{self, ProfileDir};
use crate::registry::{PeerStore, Registry};
use crate::server_profile::ServerProfileReader;
use crate::sync::InterfaceSynchronizer;
use crate::types::{NewPeer, PeerRecord, PeerSummary};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct Engine {
    config: ManagerConfig,
    store: PeerStore,
    profiles: ProfileDir,
    reader: ServerProfileReader,
    keys: Arc<dyn KeyProvider>,
    sync: Arc<dyn InterfaceSynchronizer>,
    mutate: Mutex<()>,
}

impl Engine {
    pub fn new(
        config: ManagerConfig,
        keys: Arc<dyn KeyProvider>,
        sync: Arc<dyn InterfaceSynchronizer>,
    ) -> Self {
        let store = PeerStore::new(config.registry_path());
        let profiles = ProfileDir::new(config.profiles_dir());
        let reader = ServerProfileReader::new(config.clone());
        Self {
            config,
            store,
            profiles,
            reader,
            keys,
            sync,
            mutate: Mutex::new(()),
        }
    }

    /// Register a new peer: allocate an address, apply it to the live
    /// interface, and commit the record. Returns the rendered profile.
    pub async fn register_peer(&self, identity: &str) -> Result<NewPeer> {
        let identity = validate_identity(identity)?;
        let _guard = self.mutate.lock().await;

        let mut registry = self.store.load()?;
        if registry.contains(&identity) {
            return Err(Error::DuplicateIdentity { identity });
        }

        let keys = self.keys.generate().await?;
        let server = self.reader.read()?;
        let address = allocator::allocate(server.subnet, server.address, &registry.addresses())?;

        let record = PeerRecord {
            identity: identity.clone(),
            private_key: keys.private_key,
            public_key: keys.public_key,
            preshared_key: keys.preshared_key,
            address,
            created_at: Utc::now(),
            enabled: true,
        };

        // side effect first; a failure here leaves nothing committed
        self.sync.apply_peer(&record).await?;

        let rendered = profile::render(&record, &server, self.config.keepalive);
        let summary = PeerSummary::from(&record);
        if let Err(cause) = self.commit_new_peer(&mut registry, record, &rendered) {
            // the interface already carries the peer; undo before reporting
            warn!("Rolling back interface state for {}: {}", identity, cause);
            let _ = self.profiles.delete(&identity);
            if let Err(rollback) = self.sync.remove_peer(&summary.public_key).await {
                return Err(Error::Partial {
                    operation: "register_peer".to_string(),
                    cause: cause.to_string(),
                    rollback: rollback.to_string(),
                });
            }
            return Err(cause);
        }

        info!("Registered peer {} at {}", identity, summary.address);
        Ok(NewPeer {
            summary,
            profile: rendered,
        })
    }

    fn commit_new_peer(
        &self,
        registry: &mut Registry,
        record: PeerRecord,
        rendered: &str,
    ) -> Result<()> {
        self.profiles.write(&record.identity, rendered)?;
        registry.insert(record)?;
        self.store.save(registry)
    }

    /// Toggle a peer's forwarding permission without removing it
    pub async fn set_peer_enabled(&self, identity: &str, enabled: bool) -> Result<PeerSummary> {
        let _guard = self.mutate.lock().await;

        let mut registry = self.store.load()?;
        let address = registry
            .get(identity)
            .ok_or_else(|| Error::NotFound {
                identity: identity.to_string(),
            })?
            .address;

        // firewall first; the flag is only persisted once the rule is in place
        self.sync.set_forwarding(address, enabled).await?;

        let summary = PeerSummary::from(registry.set_enabled(identity, enabled)?);
        self.store.save(&registry)?;
        info!(
            "Peer {} {}",
            identity,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(summary)
    }

    /// Deregister a peer. Live daemon and firewall cleanup is best-effort:
    /// the registry entry goes away even if the daemon is unreachable.
    pub async fn remove_peer(&self, identity: &str) -> Result<()> {
        let _guard = self.mutate.lock().await;

        let mut registry = self.store.load()?;
        let record = registry.remove(identity)?;

        if let Err(e) = self.sync.remove_peer(&record.public_key).await {
            warn!("Live interface cleanup failed for {}: {}", identity, e);
        }
        if !record.enabled {
            // a freed address must not inherit the old block rule
            if let Err(e) = self.sync.set_forwarding(record.address, true).await {
                warn!("Could not clear forwarding block for {}: {}", record.address, e);
            }
        }
        if let Err(e) = self.profiles.delete(identity) {
            warn!("Could not delete profile artifact for {}: {}", identity, e);
        }
        self.store.save(&registry)?;
        info!("Removed peer {}", identity);
        Ok(())
    }

    /// Insertion-ordered listing with key material stripped
    pub async fn list_peers(&self) -> Result<Vec<PeerSummary>> {
        let registry = self.store.load()?;
        Ok(registry.iter().map(PeerSummary::from).collect())
    }

    /// Fetch the rendered profile for re-download
    pub async fn download_profile(&self, identity: &str) -> Result<String> {
        let registry = self.store.load()?;
        let record = registry.get(identity).ok_or_else(|| Error::NotFound {
            identity: identity.to_string(),
        })?;
        if let Some(text) = self.profiles.read(identity)? {
            return Ok(text);
        }
        // artifact lost; rendering is deterministic, so rebuild it
        let server = self.reader.read()?;
        Ok(profile::render(record, &server, self.config.keepalive))
    }
}
