//! WireGuard key generation
//!
//! Two backends: the `wg` CLI, and x25519-dalek in process.

use crate::system::System;
use crate::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use std::sync::Arc;
use x25519_dalek::{PublicKey, StaticSecret};

/// Key generator capability
#[async_trait]
pub trait KeyGenerator: Send + Sync {
    /// New base64 private key
    async fn generate_private_key(&self) -> Result<String>;

    /// Base64 public key for a base64 private key
    async fn derive_public_key(&self, private_key: &str) -> Result<String>;

    /// New base64 preshared key
    async fn generate_preshared_key(&self) -> Result<String>;
}

/// Keys from `wg genkey`, `wg pubkey` and `wg genpsk`
#[derive(Clone)]
pub struct WgCliKeyGenerator {
    system: Arc<dyn System>,
}

impl WgCliKeyGenerator {
    pub fn new(system: Arc<dyn System>) -> Self {
        Self { system }
    }

    fn require_wg(&self) -> Result<()> {
        if !self.system.has_command("wg") {
            return Err(Error::CommandNotFound(
                "wg command not found (install wireguard-tools)".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyGenerator for WgCliKeyGenerator {
    async fn generate_private_key(&self) -> Result<String> {
        self.require_wg()?;
        self.system.output("wg", &["genkey"]).await
    }

    async fn derive_public_key(&self, private_key: &str) -> Result<String> {
        self.require_wg()?;
        let input = format!("{}\n", private_key);
        self.system.output_with_input(&input, "wg", &["pubkey"]).await
    }

    async fn generate_preshared_key(&self) -> Result<String> {
        self.require_wg()?;
        self.system.output("wg", &["genpsk"]).await
    }
}

/// In-process x25519 keys
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeKeyGenerator;

impl NativeKeyGenerator {
    fn random_bytes() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        bytes
    }
}

#[async_trait]
impl KeyGenerator for NativeKeyGenerator {
    async fn generate_private_key(&self) -> Result<String> {
        let mut key = Self::random_bytes();
        // curve25519 clamping, same as `wg genkey`
        key[0] &= 248;
        key[31] &= 127;
        key[31] |= 64;
        Ok(STANDARD.encode(key))
    }

    async fn derive_public_key(&self, private_key: &str) -> Result<String> {
        let bytes = STANDARD
            .decode(private_key.trim())
            .map_err(|e| Error::Crypto(format!("private key is not base64: {}", e)))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Crypto("private key must be 32 bytes".to_string()))?;
        let secret = StaticSecret::from(bytes);
        Ok(STANDARD.encode(PublicKey::from(&secret).as_bytes()))
    }

    async fn generate_preshared_key(&self) -> Result<String> {
        Ok(STANDARD.encode(Self::random_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_native_keypair() {
        let keys = NativeKeyGenerator;
        let private = keys.generate_private_key().await.unwrap();
        let public = keys.derive_public_key(&private).await.unwrap();
        assert_eq!(private.len(), 44); // Base64 of 32 bytes
        assert_eq!(public.len(), 44);
        assert_ne!(private, public);

        // derivation is deterministic
        assert_eq!(public, keys.derive_public_key(&private).await.unwrap());

        let raw = STANDARD.decode(&private).unwrap();
        assert_eq!(raw[0] & 7, 0);
        assert_eq!(raw[31] & 128, 0);
        assert_eq!(raw[31] & 64, 64);
    }

    #[tokio::test]
    async fn test_native_known_vector() {
        // RFC 7748 section 6.1, Alice
        let private = STANDARD.encode(
            [
                0x77, 0x07, 0x6d, 0x0a, 0x73, 0x18, 0xa5, 0x7d, 0x3c, 0x16, 0xc1, 0x72, 0x51, 0xb2,
                0x66, 0x45, 0xdf, 0x4c, 0x2f, 0x87, 0xeb, 0xc0, 0x99, 0x2a, 0xb1, 0x77, 0xfb, 0xa5,
                0x1d, 0xb9, 0x2c, 0x2a,
            ],
        );
        let public = NativeKeyGenerator.derive_public_key(&private).await.unwrap();
        let expected = STANDARD.encode([
            0x85, 0x20, 0xf0, 0x09, 0x89, 0x30, 0xa7, 0x54, 0x74, 0x8b, 0x7d, 0xdc, 0xb4, 0x3e,
            0xf7, 0x5a, 0x0d, 0xbf, 0x3a, 0x0d, 0x26, 0x38, 0x1a, 0xf4, 0xeb, 0xa4, 0xa9, 0x8e,
            0xaa, 0x9b, 0x4e, 0x6a,
        ]);
        assert_eq!(public, expected);
    }

    #[tokio::test]
    async fn test_native_rejects_garbage() {
        let keys = NativeKeyGenerator;
        assert!(matches!(
            keys.derive_public_key("not base64!").await,
            Err(Error::Crypto(_))
        ));
        assert!(matches!(
            keys.derive_public_key(&STANDARD.encode([1u8; 16])).await,
            Err(Error::Crypto(_))
        ));
    }

    #[tokio::test]
    async fn test_preshared_keys_differ() {
        let keys = NativeKeyGenerator;
        let a = keys.generate_preshared_key().await.unwrap();
        let b = keys.generate_preshared_key().await.unwrap();
        assert_eq!(a.len(), 44);
        assert_ne!(a, b);
    }
}
