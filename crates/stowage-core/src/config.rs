//! Configuration module
//!
//! Settings are owned by the embedding application and threaded into the
//! storage core explicitly. `from_env` exists for the application edge;
//! nothing inside the core reads process state on its own.

use std::env;
use std::path::PathBuf;

// Defaults
const SNIFF_MIN_BYTES: usize = 4100;
const CHUNK_SIZE: usize = 65536;
const URL_TTL_SECONDS: i64 = 3600;
const DEFAULT_PROVIDER: &str = "local";

#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Root directory all buckets live under.
    pub root_dir: PathBuf,
    /// Backing location name; becomes the first path segment under the root.
    pub bucket: String,
    /// MIME strings uploads are allowed to classify as.
    pub allowed_mimetypes: Vec<String>,
    /// Leading bytes withheld for magic-number classification.
    pub sniff_min_bytes: usize,
    /// Expected source chunk size; used to recognize a final short chunk.
    pub chunk_size: usize,
    /// Default lifetime of signed URLs.
    pub url_ttl_seconds: i64,
    pub default_provider: String,
}

impl StorageConfig {
    pub fn new(
        root_dir: impl Into<PathBuf>,
        bucket: impl Into<String>,
        allowed_mimetypes: Vec<String>,
    ) -> Self {
        Self {
            root_dir: root_dir.into(),
            bucket: bucket.into(),
            allowed_mimetypes,
            sniff_min_bytes: SNIFF_MIN_BYTES,
            chunk_size: CHUNK_SIZE,
            url_ttl_seconds: URL_TTL_SECONDS,
            default_provider: DEFAULT_PROVIDER.to_string(),
        }
    }

    pub fn with_sniff_min_bytes(mut self, bytes: usize) -> Self {
        self.sniff_min_bytes = bytes;
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn with_url_ttl_seconds(mut self, seconds: i64) -> Self {
        self.url_ttl_seconds = seconds;
        self
    }

    /// Read configuration from `STOWAGE_*` environment variables, falling
    /// back to defaults. Intended for application entry points only.
    pub fn from_env() -> Self {
        let root_dir = env::var("STOWAGE_ROOT").unwrap_or_else(|_| "./data".to_string());
        let bucket = env::var("STOWAGE_BUCKET").unwrap_or_else(|_| "files".to_string());
        let allowed_mimetypes = env::var("STOWAGE_ALLOWED_MIMETYPES")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let mut config = Self::new(root_dir, bucket, allowed_mimetypes);

        if let Ok(v) = env::var("STOWAGE_SNIFF_MIN_BYTES") {
            if let Ok(n) = v.parse() {
                config.sniff_min_bytes = n;
            }
        }
        if let Ok(v) = env::var("STOWAGE_CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                config.chunk_size = n;
            }
        }
        if let Ok(v) = env::var("STOWAGE_URL_TTL_SECONDS") {
            if let Ok(n) = v.parse() {
                config.url_ttl_seconds = n;
            }
        }
        if let Ok(v) = env::var("STOWAGE_DEFAULT_PROVIDER") {
            config.default_provider = v;
        }

        config
    }

    /// `<root>/<bucket>`, the directory date partitions are created under.
    pub fn bucket_root(&self) -> PathBuf {
        self.root_dir.join(&self.bucket)
    }
}
