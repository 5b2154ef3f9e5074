//! Stage abstraction for the one-pass ingestion/serving pipelines.

use bytes::Bytes;
use stowage_core::StorageResult;

/// A transform over a sequence of byte chunks.
///
/// Stages are synchronous: all I/O lives in the source stream and the
/// sink, so a stage only ever reshapes bytes already in memory. A stage
/// may emit zero, one, or many chunks per input (a compressor buffers; a
/// cipher emits a header before its first segment). `finish` is called
/// exactly once at end-of-stream to flush whatever the stage held back.
pub trait ChunkStage: Send {
    fn process(&mut self, chunk: Bytes) -> StorageResult<Vec<Bytes>>;

    fn finish(&mut self) -> StorageResult<Vec<Bytes>>;
}
