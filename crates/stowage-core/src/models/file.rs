//! File entity as consumed by the storage core.
//!
//! The entity is owned by an external persistence layer; this core reads
//! its attributes and the keyed metadata collection. `absolute_path ==
//! None` means the backing bytes have already been removed: downloads
//! fail with a not-found condition and deletes no-op.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::metadata::MetadataValue;
use super::upload::UploadOutcome;

#[derive(Debug, Clone)]
pub struct FileEntity {
    pub fileid: String,
    pub filename: String,
    pub original_filename: String,
    pub extension: String,
    pub mimetype: String,
    pub hash: String,
    pub filesize: u64,
    pub bucket_name: String,
    pub provider: String,
    pub absolute_path: Option<PathBuf>,
    pub encrypted: bool,
    pub compressed: bool,
    pub uri_path: String,
    pub region: String,
    pub public: bool,
    pub caption: Option<String>,
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    metadata: Vec<MetadataValue>,
    modified: bool,
}

impl FileEntity {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fileid: impl Into<String>,
        filename: impl Into<String>,
        original_filename: impl Into<String>,
        extension: impl Into<String>,
        mimetype: impl Into<String>,
        hash: impl Into<String>,
        filesize: u64,
        bucket_name: impl Into<String>,
        provider: impl Into<String>,
        absolute_path: Option<PathBuf>,
        uri_path: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            fileid: fileid.into(),
            filename: filename.into(),
            original_filename: original_filename.into(),
            extension: extension.into(),
            mimetype: mimetype.into(),
            hash: hash.into(),
            filesize,
            bucket_name: bucket_name.into(),
            provider: provider.into(),
            absolute_path,
            encrypted: false,
            compressed: false,
            uri_path: uri_path.into(),
            region: String::new(),
            public: false,
            caption: None,
            schema_version: 1,
            created_at: now,
            updated_at: now,
            metadata: Vec::new(),
            modified: false,
        }
    }

    /// Build an entity from a fresh upload outcome. The caller still owns
    /// persistence; this only maps the ephemeral metadata into entity shape.
    pub fn from_upload(
        outcome: UploadOutcome,
        fileid: impl Into<String>,
        original_filename: impl Into<String>,
        uri_path: impl Into<String>,
    ) -> Self {
        let meta = outcome.metadata;
        let mut entity = Self::new(
            fileid,
            meta.name.clone(),
            original_filename,
            meta.extension,
            meta.mimetype,
            meta.hash,
            meta.size,
            outcome.bucket_name,
            outcome.provider,
            Some(meta.filepath),
            uri_path,
        );
        entity.encrypted = outcome.options.encrypt;
        entity.compressed = outcome.options.compress;
        entity.public = outcome.options.public;
        entity.caption = outcome.options.caption;
        entity.metadata = meta.metadata;
        entity
    }

    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn with_compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn metadata(&self) -> &[MetadataValue] {
        &self.metadata
    }

    pub fn get_meta(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.iter().find(|m| m.key() == key)
    }

    pub fn has_meta(&self, key: &str) -> bool {
        self.get_meta(key).is_some()
    }

    /// Attach a metadata value. Returns false when the key is taken;
    /// existing values are never overwritten.
    pub fn add_meta(&mut self, value: MetadataValue) -> bool {
        if self.has_meta(value.key()) {
            return false;
        }
        self.metadata.push(value);
        self.modified = true;
        true
    }

    pub fn remove_meta(&mut self, key: &str) -> bool {
        let before = self.metadata.len();
        self.metadata.retain(|m| m.key() != key);
        let removed = self.metadata.len() != before;
        if removed {
            self.modified = true;
        }
        removed
    }

    pub fn same_hash(&self, hash: &str) -> bool {
        self.hash == hash
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metadata::EncryptionMetadata;

    fn entity() -> FileEntity {
        FileEntity::new(
            "12345",
            "d2c0e9a2",
            "report",
            "pdf",
            "application/pdf",
            "abc123",
            1024,
            "documents",
            "local",
            Some(PathBuf::from("/data/documents/2026/08/d2c0e9a2.pdf")),
            "/l",
        )
    }

    #[test]
    fn test_meta_collection_is_keyed_and_unique() {
        let mut file = entity();
        assert!(!file.is_modified());

        let meta = MetadataValue::Encryption(EncryptionMetadata::new(vec![1u8; 32], "vault", 1));
        assert!(file.add_meta(meta.clone()));
        assert!(file.has_meta("encryption"));
        assert!(file.is_modified());

        // Second value under the same key is rejected.
        assert!(!file.add_meta(meta));
        assert_eq!(file.metadata().len(), 1);

        assert!(file.remove_meta("encryption"));
        assert!(!file.has_meta("encryption"));
        assert!(!file.remove_meta("encryption"));
    }

    #[test]
    fn test_same_hash() {
        let file = entity();
        assert!(file.same_hash("abc123"));
        assert!(!file.same_hash("abc124"));
    }
}
