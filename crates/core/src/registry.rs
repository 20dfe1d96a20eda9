//! Durable peer registry
//!
//! The registry is one JSON document keyed by identity, kept in insertion
//! order and rewritten whole on every mutation. Writes land in a temporary
//! file in the same directory and are renamed into place, so a concurrent
//! reader or a crash mid-write never observes a torn snapshot.

use crate::error::{Error, Result};
use crate::types::PeerRecord;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// In-memory registry snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    peers: IndexMap<String, PeerRecord>,
}

impl Registry {
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.peers.contains_key(identity)
    }

    pub fn get(&self, identity: &str) -> Option<&PeerRecord> {
        self.peers.get(identity)
    }

    /// Insertion-ordered iteration over all records
    pub fn iter(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.values()
    }

    /// Every address currently allocated
    pub fn addresses(&self) -> HashSet<Ipv4Addr> {
        self.peers.values().map(|record| record.address).collect()
    }

    pub fn insert(&mut self, record: PeerRecord) -> Result<()> {
        if self.peers.contains_key(&record.identity) {
            return Err(Error::DuplicateIdentity {
                identity: record.identity.clone(),
            });
        }
        self.peers.insert(record.identity.clone(), record);
        Ok(())
    }

    pub fn remove(&mut self, identity: &str) -> Result<PeerRecord> {
        self.peers
            .shift_remove(identity)
            .ok_or_else(|| Error::NotFound {
                identity: identity.to_string(),
            })
    }

    /// Flip the enabled flag. Setting the current state again is a success;
    /// the caller persists either way.
    pub fn set_enabled(&mut self, identity: &str, enabled: bool) -> Result<&PeerRecord> {
        match self.peers.get_mut(identity) {
            Some(record) => {
                record.enabled = enabled;
                Ok(record)
            }
            None => Err(Error::NotFound {
                identity: identity.to_string(),
            }),
        }
    }
}

/// File-backed store owning the registry document
#[derive(Debug, Clone)]
pub struct PeerStore {
    path: PathBuf,
}

impl PeerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted snapshot, initializing an empty document on first
    /// run. Unreadable or corrupt data is a hard error: proceeding with an
    /// assumed-empty registry would silently drop existing peers.
    pub fn load(&self) -> Result<Registry> {
        if !self.path.exists() {
            let registry = Registry::default();
            self.save(&registry)?;
            info!("Initialized empty peer registry at {}", self.path.display());
            return Ok(registry);
        }
        let data = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Storage(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&data).map_err(|e| {
            Error::Storage(format!("corrupt registry {}: {}", self.path.display(), e))
        })
    }

    /// Atomically rewrite the whole snapshot
    pub fn save(&self, registry: &Registry) -> Result<()> {
        let json = serde_json::to_string_pretty(registry)
            .map_err(|e| Error::Storage(format!("cannot serialize registry: {}", e)))?;
        write_atomic(&self.path, &json).map_err(|e| {
            Error::Storage(format!("cannot write {}: {}", self.path.display(), e))
        })?;
        debug!(
            "Persisted {} peer(s) to {}",
            registry.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Write `contents` to a temporary file next to `path`, then rename it into
/// place.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(identity: &str, last_octet: u8) -> PeerRecord {
        PeerRecord {
            identity: identity.to_string(),
            private_key: format!("priv-{}", identity),
            public_key: format!("pub-{}", identity),
            preshared_key: None,
            address: Ipv4Addr::new(10, 8, 0, last_octet),
            created_at: Utc::now(),
            enabled: true,
        }
    }

    #[test]
    fn test_load_initializes_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PeerStore::new(dir.path().join("peers.json"));
        let registry = store.load().unwrap();
        assert!(registry.is_empty());
        assert!(store.path().exists());
    }

    #[test]
    fn test_round_trip_preserves_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = PeerStore::new(dir.path().join("peers.json"));

        let mut registry = Registry::default();
        registry.insert(record("carol", 2)).unwrap();
        registry.insert(record("alice", 3)).unwrap();
        registry.insert(record("bob", 4)).unwrap();
        store.save(&registry).unwrap();

        let loaded = store.load().unwrap();
        let names: Vec<&str> = loaded.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(names, vec!["carol", "alice", "bob"]);
    }

    #[test]
    fn test_corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peers.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = PeerStore::new(path).load().unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_insert_duplicate_identity_fails() {
        let mut registry = Registry::default();
        registry.insert(record("alice", 2)).unwrap();
        let err = registry.insert(record("alice", 3)).unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentity { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_unknown_identity_fails() {
        let mut registry = Registry::default();
        let err = registry.remove("ghost").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_remove_preserves_order_of_remaining() {
        let mut registry = Registry::default();
        registry.insert(record("alice", 2)).unwrap();
        registry.insert(record("bob", 3)).unwrap();
        registry.insert(record("carol", 4)).unwrap();
        registry.remove("bob").unwrap();
        let names: Vec<&str> = registry.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(names, vec!["alice", "carol"]);
    }

    #[test]
    fn test_set_enabled() {
        let mut registry = Registry::default();
        registry.insert(record("alice", 2)).unwrap();
        let updated = registry.set_enabled("alice", false).unwrap();
        assert!(!updated.enabled);
        // same state again is still a success
        assert!(registry.set_enabled("alice", false).is_ok());
        assert!(matches!(
            registry.set_enabled("ghost", true),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_addresses_collects_allocations() {
        let mut registry = Registry::default();
        registry.insert(record("alice", 2)).unwrap();
        registry.insert(record("bob", 3)).unwrap();
        let addresses = registry.addresses();
        assert!(addresses.contains(&Ipv4Addr::new(10, 8, 0, 2)));
        assert!(addresses.contains(&Ipv4Addr::new(10, 8, 0, 3)));
        assert_eq!(addresses.len(), 2);
    }
}
