//! Keyed metadata value objects attached to file entities.
//!
//! Values are immutable once created: ingestion produces them, the caller
//! persists them with the entity, and downloads only read them back.

use serde_json::{json, Value as JsonValue};

use crate::keys::KeyManager;

/// Parameters recorded when a file was encrypted at rest.
///
/// `random_key` is a per-file sub-key, distinct from the master key.
/// `key_name`/`version` pin the master key manager that wrapped it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionMetadata {
    random_key: Vec<u8>,
    key_name: String,
    version: u32,
}

impl EncryptionMetadata {
    pub fn new(random_key: Vec<u8>, key_name: impl Into<String>, version: u32) -> Self {
        Self {
            random_key,
            key_name: key_name.into(),
            version,
        }
    }

    pub fn random_key(&self) -> &[u8] {
        &self.random_key
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Decryption requires the active manager to be the one that encrypted.
    pub fn is_key_compatible<K>(&self, manager: &dyn KeyManager<K>) -> bool {
        manager.name() == self.key_name
    }
}

/// A keyed, immutable metadata attachment. One value per key on an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Encryption(EncryptionMetadata),
}

impl MetadataValue {
    pub fn key(&self) -> &'static str {
        match self {
            MetadataValue::Encryption(_) => "encryption",
        }
    }

    /// Whether the value may be shown to end users.
    pub fn visible(&self) -> bool {
        match self {
            MetadataValue::Encryption(_) => false,
        }
    }

    /// Full representation, for the persistence layer.
    pub fn to_object(&self) -> JsonValue {
        match self {
            MetadataValue::Encryption(meta) => json!({
                "random_key": hex::encode(&meta.random_key),
                "key_name": meta.key_name,
                "version": meta.version,
            }),
        }
    }

    /// Public representation; secret material is omitted.
    pub fn to_json(&self) -> JsonValue {
        match self {
            MetadataValue::Encryption(meta) => json!({
                "key_name": meta.key_name,
                "version": meta.version,
            }),
        }
    }
}
