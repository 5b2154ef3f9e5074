//! Ingestion orchestration.
//!
//! `process_file` is the generic entry: it generates the file's name,
//! asks the caller's plan factory for the remaining stages and the
//! destination path, then runs sniffer → hasher → plan stages → sink as
//! one pass. `upload_file` is the concrete planner used by storage
//! providers: date-partitioned destination, optional gzip, optional
//! per-file-keyed encryption (applied after compression).

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use uuid::Uuid;

use stowage_core::sanitize::file_extension;
use stowage_core::{
    EncryptionMetadata, KeyManager, MasterKey, MetadataValue, StorageError, StorageResult,
    UploadMeta,
};

use crate::cipher::{generate_sub_key, EncryptStage};
use crate::compress::GzipStage;
use crate::hash::HashSizeStage;
use crate::pipeline::run;
use crate::sink::FileSink;
use crate::sniff::MimeSniffStage;
use crate::stage::ChunkStage;

/// What a plan factory returns for a freshly named file.
pub struct StagePlan {
    /// Stages appended after the sniffer and hasher, in order.
    pub stages: Vec<Box<dyn ChunkStage>>,
    /// Final on-disk location of the ingested bytes.
    pub filepath: PathBuf,
    /// Metadata produced while planning (e.g. encryption parameters).
    pub metadata: Vec<MetadataValue>,
}

/// Run one ingestion pass over `source`.
///
/// Exactly one name is generated per call, before any bytes are read; the
/// plan factory receives it and decides path and extra stages. Allow-list
/// violations surface as `UnsupportedMimetype`; every other pipeline
/// failure is wrapped in `CannotUploadFile` with its cause preserved.
pub async fn process_file<S, F>(
    source: S,
    allowed: &[String],
    sniff_min_bytes: usize,
    chunk_size: usize,
    plan: F,
) -> StorageResult<UploadMeta>
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Unpin,
    F: FnOnce(&str) -> StorageResult<StagePlan>,
{
    let name = Uuid::new_v4().to_string();
    let plan = plan(&name)?;

    let mut sniff = MimeSniffStage::new(sniff_min_bytes, chunk_size, allowed);
    let mut hash = HashSizeStage::new();
    let mut extra = plan.stages;

    let sink = FileSink::create(&plan.filepath).await?;

    let mut stages: Vec<&mut dyn ChunkStage> = Vec::with_capacity(2 + extra.len());
    stages.push(&mut sniff);
    stages.push(&mut hash);
    for stage in extra.iter_mut() {
        stages.push(stage.as_mut());
    }

    if let Err(err) = run(source, &mut stages, sink).await {
        return Err(match err {
            err @ StorageError::UnsupportedMimetype { .. } => err,
            other => {
                tracing::error!(
                    filepath = %plan.filepath.display(),
                    error = %other,
                    "Upload pipeline failed"
                );
                StorageError::CannotUploadFile {
                    source: Box::new(other),
                }
            }
        });
    }

    let (mimetype, extension) = match (sniff.mimetype(), sniff.extension()) {
        (Some(mimetype), Some(extension)) => (mimetype.to_string(), extension.to_string()),
        _ => {
            return Err(StorageError::UnsupportedMimetype {
                detail: "content type could not be detected".to_string(),
                allowed: allowed.to_vec(),
            })
        }
    };

    Ok(UploadMeta {
        name,
        extension,
        mimetype,
        hash: hash
            .hash()
            .expect("digest is finalized when the pass succeeds")
            .to_string(),
        size: hash.size(),
        filepath: plan.filepath,
        metadata: plan.metadata,
    })
}

/// Upload parameters resolved by the storage provider.
pub struct UploadRequest<'a> {
    /// Caller-supplied filename; its extension names the on-disk file.
    pub filename: &'a str,
    /// `<root>/<bucket>`; date partitions are created under this.
    pub dest_root: &'a Path,
    pub allowed_mimetypes: &'a [String],
    pub sniff_min_bytes: usize,
    pub chunk_size: usize,
    pub compress: bool,
    pub encrypt: Option<&'a dyn KeyManager<MasterKey>>,
}

/// Ingest `source` under a `<YYYY>/<MM>` partition of the bucket root.
pub async fn upload_file<S>(source: S, request: UploadRequest<'_>) -> StorageResult<UploadMeta>
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Unpin,
{
    let now = Utc::now();
    let partition = request
        .dest_root
        .join(now.format("%Y").to_string())
        .join(now.format("%m").to_string());

    let extension = file_extension(request.filename).to_string();

    process_file(
        source,
        request.allowed_mimetypes,
        request.sniff_min_bytes,
        request.chunk_size,
        move |name| {
            // Pre-existing partitions are expected, not an error.
            std::fs::create_dir_all(&partition).map_err(|source| {
                StorageError::CannotCreateDirectory {
                    path: partition.clone(),
                    source,
                }
            })?;

            let filepath = partition.join(format!("{name}.{extension}"));

            let mut stages: Vec<Box<dyn ChunkStage>> = Vec::new();
            let mut metadata = Vec::new();

            if request.compress {
                stages.push(Box::new(GzipStage::new()));
            }

            if let Some(secrets) = request.encrypt {
                let random_key = generate_sub_key();
                let master = secrets
                    .get(None)
                    .map_err(|e| StorageError::CannotEncryptFile(e.to_string()))?;

                stages.push(Box::new(EncryptStage::new(master, &random_key)?));
                metadata.push(MetadataValue::Encryption(EncryptionMetadata::new(
                    random_key,
                    secrets.name(),
                    secrets.current_version(),
                )));
            }

            Ok(StagePlan {
                stages,
                filepath,
                metadata,
            })
        },
    )
    .await
}
