//! File sink terminating an ingestion pass.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use stowage_core::{StorageError, StorageResult};

/// Writes pipeline output to its final path.
///
/// `finish` flushes and fsyncs; `discard` is the failure path and removes
/// whatever was partially written so an aborted pass leaves nothing behind.
pub struct FileSink {
    path: PathBuf,
    file: fs::File,
}

impl FileSink {
    pub async fn create(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let file = fs::File::create(&path)
            .await
            .map_err(|source| StorageError::CannotCreateFile {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&mut self, chunk: &Bytes) -> StorageResult<()> {
        self.file.write_all(chunk).await?;
        Ok(())
    }

    pub async fn finish(mut self) -> StorageResult<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }

    /// Best-effort removal of the partial file.
    pub async fn discard(self) {
        let path = self.path;
        drop(self.file);

        if let Err(err) = fs::remove_file(&path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Failed to remove partially written file"
                );
            }
        }
    }
}
