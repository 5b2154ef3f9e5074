//! Upload request options and result metadata.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::metadata::MetadataValue;

/// Per-upload behavior switches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadOptions {
    #[serde(default)]
    pub compress: bool,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub public: bool,
}

/// Result of one ingestion pass. Ephemeral: handed to the caller to
/// persist as a new file entity, never stored or mutated by this core.
#[derive(Debug, Clone)]
pub struct UploadMeta {
    /// Generated identifier; random, not content-addressed.
    pub name: String,
    /// Extension derived from content sniffing.
    pub extension: String,
    pub mimetype: String,
    /// Lowercase hex SHA-256 of the ingested bytes.
    pub hash: String,
    pub size: u64,
    /// Final on-disk location.
    pub filepath: PathBuf,
    /// Metadata produced during ingestion (e.g. encryption parameters).
    pub metadata: Vec<MetadataValue>,
}

/// What a storage provider's upload returns to its caller.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub bucket_name: String,
    pub provider: String,
    /// The filename the caller submitted, unchanged.
    pub filename: String,
    pub metadata: UploadMeta,
    pub options: UploadOptions,
}
