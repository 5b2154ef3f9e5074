//! Stowage Pipeline Library
//!
//! Single-pass streaming ingestion: a source byte stream flows once
//! through an ordered chain of chunk stages (mimetype sniffing, hashing,
//! optional gzip, optional authenticated encryption) into a file sink.
//! The same stage abstraction runs in reverse for downloads via
//! `StageStream`.

pub mod cipher;
pub mod compress;
pub mod hash;
pub mod ingest;
pub mod pipeline;
pub mod sink;
pub mod sniff;
pub mod stage;

// Re-export commonly used types
pub use cipher::{DecryptStage, EncryptStage};
pub use compress::{GunzipStage, GzipStage};
pub use hash::HashSizeStage;
pub use ingest::{process_file, upload_file, StagePlan, UploadRequest};
pub use pipeline::{run, StageStream};
pub use sink::FileSink;
pub use sniff::MimeSniffStage;
pub use stage::ChunkStage;
