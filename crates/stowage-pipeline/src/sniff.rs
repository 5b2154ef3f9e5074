//! Mimetype sniffing stage.
//!
//! Content type is decided from magic bytes, never from the declared
//! filename or content type. Detectors need a minimum sample to be
//! reliable, so leading chunks are retained until `min_bytes` have
//! accumulated (or the stream is about to end) and classified as one
//! contiguous buffer. Chunks are still forwarded downstream immediately;
//! retention is only for re-presenting them to the classifier, so a slow
//! classification never stalls the sink.

use bytes::Bytes;
use stowage_core::{StorageError, StorageResult};

use crate::stage::ChunkStage;

/// A chunk shorter than the source's chunk size can only be the last one.
pub fn is_final_short_chunk(chunk: &Bytes, chunk_size: usize) -> bool {
    chunk.len() < chunk_size
}

pub struct MimeSniffStage {
    min_bytes: usize,
    chunk_size: usize,
    allowed: Vec<String>,
    retained: Vec<Bytes>,
    seen: usize,
    detected: Option<(String, String)>,
}

impl MimeSniffStage {
    pub fn new(min_bytes: usize, chunk_size: usize, allowed: &[String]) -> Self {
        Self {
            min_bytes,
            chunk_size,
            allowed: allowed.to_vec(),
            retained: Vec::new(),
            seen: 0,
            detected: None,
        }
    }

    /// Detected MIME string, once classification has run.
    pub fn mimetype(&self) -> Option<&str> {
        self.detected.as_ref().map(|(m, _)| m.as_str())
    }

    /// Canonical extension for the detected type.
    pub fn extension(&self) -> Option<&str> {
        self.detected.as_ref().map(|(_, e)| e.as_str())
    }

    fn classify(&mut self, sample: &[u8]) -> StorageResult<()> {
        let kind = infer::get(sample).ok_or_else(|| StorageError::UnsupportedMimetype {
            detail: "content type could not be detected".to_string(),
            allowed: self.allowed.clone(),
        })?;

        let mimetype = kind.mime_type();
        if !self.allowed.iter().any(|m| m == mimetype) {
            return Err(StorageError::UnsupportedMimetype {
                detail: format!("{mimetype} is not allow-listed"),
                allowed: self.allowed.clone(),
            });
        }

        self.detected = Some((mimetype.to_string(), kind.extension().to_string()));
        self.retained.clear();
        Ok(())
    }

    fn sample_with(&self, chunk: &Bytes) -> Bytes {
        if self.retained.is_empty() {
            return chunk.clone();
        }
        let mut sample = Vec::with_capacity(self.seen);
        for held in &self.retained {
            sample.extend_from_slice(held);
        }
        sample.extend_from_slice(chunk);
        Bytes::from(sample)
    }
}

impl ChunkStage for MimeSniffStage {
    fn process(&mut self, chunk: Bytes) -> StorageResult<Vec<Bytes>> {
        if self.detected.is_some() {
            return Ok(vec![chunk]);
        }

        self.seen += chunk.len();

        // Below the minimum, a final short chunk is all we will ever get.
        let bypass =
            self.seen < self.min_bytes && is_final_short_chunk(&chunk, self.chunk_size);

        if self.seen >= self.min_bytes || bypass {
            let sample = self.sample_with(&chunk);
            self.classify(&sample)?;
            return Ok(vec![chunk]);
        }

        self.retained.push(chunk.clone());
        Ok(vec![chunk])
    }

    fn finish(&mut self) -> StorageResult<Vec<Bytes>> {
        // Classification runs at most once; this path only fires when the
        // whole stream ended below the threshold without a short chunk.
        // An empty stream lands here too and fails as undetectable.
        if self.detected.is_none() {
            let sample = self.sample_with(&Bytes::new());
            self.classify(&sample)?;
        }
        Ok(Vec::new())
    }
}
