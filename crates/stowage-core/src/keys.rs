//! Key-manager collaborator interfaces
//!
//! Stowage never owns key material lifecycles; it consumes them through the
//! `KeyManager` trait. The in-memory keyrings below are reference
//! implementations for embeddings and tests. Both are read-only after
//! construction, so they are safe to share across concurrent operations.

use std::collections::BTreeMap;

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand_core::{OsRng, RngCore};

/// 256-bit symmetric master key.
pub type MasterKey = [u8; 32];

/// An ed25519 keypair used for URL signing.
#[derive(Clone)]
pub struct Keypair {
    pub signing: SigningKey,
    pub verifying: VerifyingKey,
}

impl Keypair {
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        let verifying = signing.verifying_key();
        Self { signing, verifying }
    }

    pub fn from_signing_key(signing: SigningKey) -> Self {
        let verifying = signing.verifying_key();
        Self { signing, verifying }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Key manager {name} has no key for version {version}")]
    UnknownVersion { name: String, version: u32 },
}

/// Versioned key material lookup.
///
/// `name()` identifies the manager; anything encrypted by it records that
/// name, and decryption requires an exact match.
pub trait KeyManager<K>: Send + Sync {
    fn name(&self) -> &str;

    fn current_version(&self) -> u32;

    /// Active key when `version` is `None`, otherwise that specific version.
    fn get(&self, version: Option<u32>) -> Result<&K, KeyError>;
}

/// In-memory versioned store of symmetric master keys.
pub struct SecretKeyring {
    name: String,
    current: u32,
    keys: BTreeMap<u32, MasterKey>,
}

impl SecretKeyring {
    pub fn new(name: impl Into<String>, current: u32, keys: BTreeMap<u32, MasterKey>) -> Self {
        Self {
            name: name.into(),
            current,
            keys,
        }
    }

    /// Single freshly generated key under version 1.
    pub fn generate(name: impl Into<String>) -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        let mut keys = BTreeMap::new();
        keys.insert(1, key);
        Self::new(name, 1, keys)
    }
}

impl KeyManager<MasterKey> for SecretKeyring {
    fn name(&self) -> &str {
        &self.name
    }

    fn current_version(&self) -> u32 {
        self.current
    }

    fn get(&self, version: Option<u32>) -> Result<&MasterKey, KeyError> {
        let version = version.unwrap_or(self.current);
        self.keys.get(&version).ok_or_else(|| KeyError::UnknownVersion {
            name: self.name.clone(),
            version,
        })
    }
}

/// In-memory versioned store of signing keypairs.
pub struct SignerKeyring {
    name: String,
    current: u32,
    keys: BTreeMap<u32, Keypair>,
}

impl SignerKeyring {
    pub fn new(name: impl Into<String>, current: u32, keys: BTreeMap<u32, Keypair>) -> Self {
        Self {
            name: name.into(),
            current,
            keys,
        }
    }

    pub fn generate(name: impl Into<String>) -> Self {
        let mut keys = BTreeMap::new();
        keys.insert(1, Keypair::generate());
        Self::new(name, 1, keys)
    }
}

impl KeyManager<Keypair> for SignerKeyring {
    fn name(&self) -> &str {
        &self.name
    }

    fn current_version(&self) -> u32 {
        self.current
    }

    fn get(&self, version: Option<u32>) -> Result<&Keypair, KeyError> {
        let version = version.unwrap_or(self.current);
        self.keys.get(&version).ok_or_else(|| KeyError::UnknownVersion {
            name: self.name.clone(),
            version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_keyring_lookup() {
        let ring = SecretKeyring::generate("vault");
        assert_eq!(ring.name(), "vault");
        assert_eq!(ring.current_version(), 1);
        assert!(ring.get(None).is_ok());
        assert!(ring.get(Some(1)).is_ok());

        let err = ring.get(Some(7)).unwrap_err();
        assert!(matches!(
            err,
            KeyError::UnknownVersion { version: 7, .. }
        ));
    }

    #[test]
    fn test_active_key_tracks_current_version() {
        let mut keys = BTreeMap::new();
        keys.insert(1, [1u8; 32]);
        keys.insert(2, [2u8; 32]);
        let ring = SecretKeyring::new("vault", 2, keys);

        assert_eq!(ring.get(None).unwrap(), &[2u8; 32]);
        assert_eq!(ring.get(Some(1)).unwrap(), &[1u8; 32]);
    }

    #[test]
    fn test_signer_keyring_roundtrip() {
        let ring = SignerKeyring::generate("urls");
        let pair = ring.get(None).unwrap();
        assert_eq!(pair.signing.verifying_key(), pair.verifying);
    }
}
