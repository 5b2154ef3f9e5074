//! Storage provider abstraction
//!
//! This module defines the capability trait every storage backend
//! implements. Entity-taking operations must verify provider
//! compatibility first via `ensure_compatible` and fail fast before any
//! I/O, since a mismatched entity means the caller routed it to the
//! wrong provider instance.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use stowage_core::{
    FileEntity, SignedFileUrl, StorageError, StorageResult, UploadOptions, UploadOutcome, UrlBase,
};

/// Raw byte stream handed to `upload`.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Decoded byte stream returned by `download`.
pub type ChunkStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// A downloadable file: plain bytes plus presentation attributes.
pub struct Download {
    pub stream: ChunkStream,
    /// `{original_filename}.{extension}`
    pub filename: String,
    pub mimetype: String,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("filename", &self.filename)
            .field("mimetype", &self.mimetype)
            .finish_non_exhaustive()
    }
}

/// Side channel invoked after a file's bytes were removed.
///
/// Replaces fire-and-forget event publication: the caller decides what a
/// removal means (detach the entity, notify, audit). A failing hook
/// degrades the delete to a not-deleted outcome; it never aborts it.
#[async_trait]
pub trait UnlinkHook: Send + Sync {
    async fn after_unlink(&self, file: &FileEntity) -> anyhow::Result<()>;
}

/// Storage backend capability interface.
#[async_trait]
pub trait StorageProvider: Send + Sync + std::fmt::Debug {
    /// Identity tag recorded on every entity this provider creates.
    fn provider(&self) -> &'static str;

    /// Ingest a byte stream and persist it under this provider's bucket.
    async fn upload(
        &self,
        source: ByteStream,
        filename: &str,
        options: UploadOptions,
    ) -> StorageResult<UploadOutcome>;

    /// Open the entity's bytes for reading, undoing at-rest encryption
    /// and compression.
    async fn download(&self, file: &FileEntity) -> StorageResult<Download>;

    /// Remove the entity's bytes, best-effort. `Ok(false)` means nothing
    /// was removed (already gone, or cleanup failed and was swallowed).
    async fn delete(
        &self,
        file: &FileEntity,
        after_unlink: Option<&dyn UnlinkHook>,
    ) -> StorageResult<bool>;

    /// Issue expiring signed download/view URLs for the entity.
    fn sign(
        &self,
        file: &FileEntity,
        download_url: &UrlBase,
        ttl_seconds: i64,
    ) -> StorageResult<SignedFileUrl>;

    /// Validate a previously issued signature token against the entity
    /// and the current wall clock.
    fn check_signature(&self, file: &FileEntity, token: &str) -> StorageResult<()>;

    fn is_compatible(&self, file: &FileEntity) -> bool {
        file.provider == self.provider()
    }
}

/// Shared compatibility guard, called at the top of every entity-taking
/// operation.
pub fn ensure_compatible(provider: &str, file: &FileEntity) -> StorageResult<()> {
    if file.provider != provider {
        return Err(StorageError::IncompatibleProvider {
            expected: provider.to_string(),
            actual: file.provider.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_compatible() {
        let file = FileEntity::new(
            "id", "name", "orig", "bin", "application/octet-stream", "h", 1, "b", "local", None,
            "/l",
        );

        assert!(ensure_compatible("local", &file).is_ok());

        let err = ensure_compatible("s3", &file).unwrap_err();
        match err {
            StorageError::IncompatibleProvider { expected, actual } => {
                assert_eq!(expected, "s3");
                assert_eq!(actual, "local");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
