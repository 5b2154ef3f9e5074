//! Local filesystem storage provider.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio_util::io::ReaderStream;

use stowage_core::{
    FileEntity, KeyManager, Keypair, MasterKey, MetadataValue, SignedFileUrl, StorageConfig,
    StorageError, StorageResult, UploadOptions, UploadOutcome, UrlBase,
};
use stowage_pipeline::{
    upload_file, ChunkStage, DecryptStage, GunzipStage, StageStream, UploadRequest,
};

use crate::signer;
use crate::traits::{
    ensure_compatible, ByteStream, ChunkStream, Download, StorageProvider, UnlinkHook,
};

pub const LOCAL_PROVIDER: &str = "local";

/// Stores files under `<directory>/<bucket>/<YYYY>/<MM>/`.
///
/// Holds no per-call state: the root, the bucket name, the sniffing
/// settings, and the key managers are all read-only after construction,
/// so one instance serves concurrent uploads and downloads.
pub struct LocalStorage {
    directory: PathBuf,
    bucket_name: String,
    allowed_mimetypes: Vec<String>,
    sniff_min_bytes: usize,
    chunk_size: usize,
    secrets: Arc<dyn KeyManager<MasterKey>>,
    keypairs: Arc<dyn KeyManager<Keypair>>,
}

impl std::fmt::Debug for LocalStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStorage")
            .field("directory", &self.directory)
            .field("bucket_name", &self.bucket_name)
            .field("allowed_mimetypes", &self.allowed_mimetypes)
            .field("sniff_min_bytes", &self.sniff_min_bytes)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

impl LocalStorage {
    pub fn new(
        config: &StorageConfig,
        secrets: Arc<dyn KeyManager<MasterKey>>,
        keypairs: Arc<dyn KeyManager<Keypair>>,
    ) -> Self {
        Self {
            directory: config.root_dir.clone(),
            bucket_name: config.bucket.clone(),
            allowed_mimetypes: config.allowed_mimetypes.clone(),
            sniff_min_bytes: config.sniff_min_bytes,
            chunk_size: config.chunk_size,
            secrets,
            keypairs,
        }
    }

    /// Resolve the entity's backing path, requiring a stat-able regular
    /// file. A `None` path means the bytes were already removed.
    async fn resolve_path(&self, file: &FileEntity) -> StorageResult<PathBuf> {
        let path = file
            .absolute_path
            .as_ref()
            .ok_or_else(|| StorageError::NotFound(file.fileid.clone()))?;

        match fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(path.clone()),
            Ok(_) => Err(StorageError::NotFound(file.fileid.clone())),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    fileid = %file.fileid,
                    error = %err,
                    "Failed to stat file"
                );
                Err(StorageError::NotFound(file.fileid.clone()))
            }
        }
    }

    fn decode_stages(&self, file: &FileEntity) -> StorageResult<Vec<Box<dyn ChunkStage>>> {
        let mut stages: Vec<Box<dyn ChunkStage>> = Vec::new();

        if file.encrypted {
            let meta = file.get_meta("encryption").ok_or_else(|| {
                StorageError::CannotDecryptFile("encryption metadata is missing".to_string())
            })?;
            let encryption = match meta {
                MetadataValue::Encryption(encryption) => encryption,
            };

            if !encryption.is_key_compatible(self.secrets.as_ref()) {
                return Err(StorageError::CannotDecryptFile(
                    "invalid key for file".to_string(),
                ));
            }

            let master = self
                .secrets
                .get(Some(encryption.version()))
                .map_err(|e| StorageError::CannotDecryptFile(e.to_string()))?;

            stages.push(Box::new(DecryptStage::new(master, encryption.random_key())?));
        }

        if file.compressed {
            stages.push(Box::new(GunzipStage::new()));
        }

        Ok(stages)
    }
}

#[async_trait]
impl StorageProvider for LocalStorage {
    fn provider(&self) -> &'static str {
        LOCAL_PROVIDER
    }

    async fn upload(
        &self,
        source: ByteStream,
        filename: &str,
        options: UploadOptions,
    ) -> StorageResult<UploadOutcome> {
        let start = std::time::Instant::now();
        let dest_root = self.directory.join(&self.bucket_name);

        let metadata = upload_file(
            source,
            UploadRequest {
                filename,
                dest_root: &dest_root,
                allowed_mimetypes: &self.allowed_mimetypes,
                sniff_min_bytes: self.sniff_min_bytes,
                chunk_size: self.chunk_size,
                compress: options.compress,
                encrypt: options
                    .encrypt
                    .then_some(self.secrets.as_ref() as &dyn KeyManager<MasterKey>),
            },
        )
        .await?;

        tracing::info!(
            path = %metadata.filepath.display(),
            bucket = %self.bucket_name,
            mimetype = %metadata.mimetype,
            size_bytes = metadata.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(UploadOutcome {
            bucket_name: self.bucket_name.clone(),
            provider: self.provider().to_string(),
            filename: filename.to_string(),
            metadata,
            options,
        })
    }

    async fn download(&self, file: &FileEntity) -> StorageResult<Download> {
        ensure_compatible(self.provider(), file)?;

        let path = self.resolve_path(file).await?;
        let stages = self.decode_stages(file)?;

        let handle = fs::File::open(&path).await.map_err(|err| {
            tracing::warn!(
                path = %path.display(),
                fileid = %file.fileid,
                error = %err,
                "Failed to open file"
            );
            StorageError::NotFound(file.fileid.clone())
        })?;

        let reader = ReaderStream::with_capacity(handle, self.chunk_size);
        let stream: ChunkStream = Box::pin(StageStream::new(reader, stages));

        Ok(Download {
            stream,
            filename: format!("{}.{}", file.original_filename, file.extension),
            mimetype: file.mimetype.clone(),
        })
    }

    async fn delete(
        &self,
        file: &FileEntity,
        after_unlink: Option<&dyn UnlinkHook>,
    ) -> StorageResult<bool> {
        ensure_compatible(self.provider(), file)?;

        let path = match &file.absolute_path {
            Some(path) => path,
            None => return Ok(false),
        };

        match fs::remove_file(path).await {
            Ok(()) => {}
            // Already gone counts as removed.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    fileid = %file.fileid,
                    error = %err,
                    "Failed to unlink file"
                );
                return Ok(false);
            }
        }

        if let Some(hook) = after_unlink {
            if let Err(err) = hook.after_unlink(file).await {
                tracing::warn!(
                    fileid = %file.fileid,
                    error = %err,
                    "After-unlink hook failed"
                );
                return Ok(false);
            }
        }

        tracing::info!(
            path = %path.display(),
            fileid = %file.fileid,
            "Local storage delete successful"
        );

        Ok(true)
    }

    fn sign(
        &self,
        file: &FileEntity,
        download_url: &UrlBase,
        ttl_seconds: i64,
    ) -> StorageResult<SignedFileUrl> {
        ensure_compatible(self.provider(), file)?;
        signer::sign(
            self.keypairs.as_ref(),
            file,
            download_url,
            ttl_seconds,
            Utc::now().timestamp(),
        )
    }

    fn check_signature(&self, file: &FileEntity, token: &str) -> StorageResult<()> {
        ensure_compatible(self.provider(), file)?;
        signer::check(
            self.keypairs.as_ref(),
            file,
            token,
            Utc::now().timestamp(),
        )
    }
}
