//! Peer key material providers
//!
//! Key generation sits behind a narrow capability so the engine can be
//! tested with fakes. Two implementations: in-process x25519, and the `wg`
//! tool for hosts where key material must come from the daemon's own binary
//! (optionally inside the daemon container).

use crate::command::CommandRunner;
use crate::error::{Error, Result};
use crate::types::KeySet;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};

/// Key generation capability
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn generate(&self) -> Result<KeySet>;
}

/// Generate a WireGuard keypair using x25519
pub fn generate_keypair() -> (String, String) {
    let mut private = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut private);

    // WireGuard key clamping
    private[0] &= 248;
    private[31] &= 127;
    private[31] |= 64;

    let secret = StaticSecret::from(private);
    let public = PublicKey::from(&secret);
    (STANDARD.encode(private), STANDARD.encode(public.as_bytes()))
}

/// Compute the Base64 public key for a Base64 private key
pub fn derive_public_key(private_b64: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(private_b64.trim())
        .map_err(|e| Error::Config(format!("invalid private key: {}", e)))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::Config("invalid private key length".to_string()))?;
    let secret = StaticSecret::from(bytes);
    Ok(STANDARD.encode(PublicKey::from(&secret).as_bytes()))
}

/// In-process provider backed by x25519-dalek
pub struct X25519KeyProvider {
    preshared: bool,
}

impl X25519KeyProvider {
    pub fn new(preshared: bool) -> Self {
        Self { preshared }
    }
}

#[async_trait]
impl KeyProvider for X25519KeyProvider {
    async fn generate(&self) -> Result<KeySet> {
        let (private_key, public_key) = generate_keypair();
        let preshared_key = if self.preshared {
            let mut psk = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut psk);
            Some(STANDARD.encode(psk))
        } else {
            None
        };
        Ok(KeySet {
            private_key,
            public_key,
            preshared_key,
        })
    }
}

/// Provider that shells out to the `wg` binary
pub struct WgToolKeyProvider {
    runner: CommandRunner,
    preshared: bool,
}

impl WgToolKeyProvider {
    pub fn new(runner: CommandRunner, preshared: bool) -> Self {
        Self { runner, preshared }
    }
}

#[async_trait]
impl KeyProvider for WgToolKeyProvider {
    async fn generate(&self) -> Result<KeySet> {
        let private_key = self.runner.run("wg", &["genkey"]).await?.trim().to_string();
        let public_key = self
            .runner
            .shell(&format!("echo '{}' | wg pubkey", private_key))
            .await?
            .trim()
            .to_string();
        let preshared_key = if self.preshared {
            Some(self.runner.run("wg", &["genpsk"]).await?.trim().to_string())
        } else {
            None
        };
        Ok(KeySet {
            private_key,
            public_key,
            preshared_key,
        })
    }
}
