//! Content digest and size accumulation.

use bytes::Bytes;
use sha2::{Digest, Sha256};
use stowage_core::StorageResult;

use crate::stage::ChunkStage;

/// Pass-through stage computing SHA-256 and a byte count over everything
/// that flows through it. No buffering; position in the chain is
/// irrelevant as long as it sees the plaintext bytes.
pub struct HashSizeStage {
    hasher: Sha256,
    size: u64,
    hash: Option<String>,
}

impl HashSizeStage {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
            size: 0,
            hash: None,
        }
    }

    /// Lowercase hex digest; available after `finish`.
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Default for HashSizeStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkStage for HashSizeStage {
    fn process(&mut self, chunk: Bytes) -> StorageResult<Vec<Bytes>> {
        self.hasher.update(&chunk);
        self.size += chunk.len() as u64;
        Ok(vec![chunk])
    }

    fn finish(&mut self) -> StorageResult<Vec<Bytes>> {
        let digest = self.hasher.clone().finalize();
        self.hash = Some(hex::encode(digest));
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_of(chunks: &[&[u8]]) -> (String, u64) {
        let mut stage = HashSizeStage::new();
        for chunk in chunks {
            let out = stage.process(Bytes::copy_from_slice(chunk)).unwrap();
            assert_eq!(out.len(), 1);
        }
        stage.finish().unwrap();
        (stage.hash().unwrap().to_string(), stage.size())
    }

    #[test]
    fn test_chunk_boundaries_do_not_matter() {
        let (a, size_a) = digest_of(&[b"hello world"]);
        let (b, size_b) = digest_of(&[b"hel", b"lo ", b"world"]);
        let (c, size_c) = digest_of(&[b"h", b"e", b"l", b"l", b"o", b" ", b"world"]);

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(size_a, 11);
        assert_eq!(size_b, 11);
        assert_eq!(size_c, 11);
    }

    #[test]
    fn test_known_digest() {
        // SHA-256 of the empty string is a published constant.
        let (hash, size) = digest_of(&[]);
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(size, 0);
    }
}
