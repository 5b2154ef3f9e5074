//! Gzip compression stages.
//!
//! The flate2 write-side codecs accumulate output in an inner buffer;
//! each stage drains that buffer after every chunk so compressed bytes
//! keep flowing with the pass instead of piling up in memory.

use std::io::Write;

use bytes::Bytes;
use flate2::write::{GzDecoder, GzEncoder};
use flate2::Compression;
use stowage_core::StorageResult;

use crate::stage::ChunkStage;

fn drain(buffer: &mut Vec<u8>) -> Vec<Bytes> {
    if buffer.is_empty() {
        Vec::new()
    } else {
        vec![Bytes::from(std::mem::take(buffer))]
    }
}

pub struct GzipStage {
    encoder: GzEncoder<Vec<u8>>,
}

impl GzipStage {
    pub fn new() -> Self {
        Self {
            encoder: GzEncoder::new(Vec::new(), Compression::default()),
        }
    }
}

impl Default for GzipStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStage for GzipStage {
    fn process(&mut self, chunk: Bytes) -> StorageResult<Vec<Bytes>> {
        self.encoder.write_all(&chunk)?;
        Ok(drain(self.encoder.get_mut()))
    }

    fn finish(&mut self) -> StorageResult<Vec<Bytes>> {
        self.encoder.try_finish()?;
        Ok(drain(self.encoder.get_mut()))
    }
}

pub struct GunzipStage {
    decoder: GzDecoder<Vec<u8>>,
}

impl GunzipStage {
    pub fn new() -> Self {
        Self {
            decoder: GzDecoder::new(Vec::new()),
        }
    }
}

impl Default for GunzipStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStage for GunzipStage {
    fn process(&mut self, chunk: Bytes) -> StorageResult<Vec<Bytes>> {
        self.decoder.write_all(&chunk)?;
        Ok(drain(self.decoder.get_mut()))
    }

    fn finish(&mut self) -> StorageResult<Vec<Bytes>> {
        self.decoder.try_finish()?;
        Ok(drain(self.decoder.get_mut()))
    }
}
