//! Stowage Core Library
//!
//! Domain models, error types, key-manager collaborators, and configuration
//! shared across the stowage crates.

pub mod config;
pub mod error;
pub mod keys;
pub mod models;
pub mod sanitize;

// Re-export commonly used types
pub use config::StorageConfig;
pub use error::{LogLevel, StorageError, StorageResult};
pub use keys::{KeyError, KeyManager, Keypair, MasterKey, SecretKeyring, SignerKeyring};
pub use models::{
    EncryptionMetadata, FileEntity, MetadataValue, SignedFileUrl, UploadMeta, UploadOptions,
    UploadOutcome, UrlBase,
};
