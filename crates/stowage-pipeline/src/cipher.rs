//! Authenticated streaming encryption stages.
//!
//! At-rest layout: a 7-byte random nonce prefix followed by AES-256-GCM
//! STREAM segments of `SEGMENT_SIZE` plaintext bytes, each carrying a
//! 16-byte tag; the final segment is shorter and closes the stream, so
//! truncation is detected at decrypt time. The cipher key is derived per
//! file as HMAC-SHA256(master key, random sub-key); the sub-key travels
//! in the file's encryption metadata, the master key never leaves its
//! key manager.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::stream::{DecryptorBE32, EncryptorBE32};
use aes_gcm::{Aes256Gcm, Key, KeyInit};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use stowage_core::{MasterKey, StorageError, StorageResult};

use crate::stage::ChunkStage;

/// Plaintext bytes per encrypted segment.
pub const SEGMENT_SIZE: usize = 64 * 1024;
/// GCM authentication tag appended to every segment.
pub const TAG_SIZE: usize = 16;
/// Nonce prefix written ahead of the first segment.
pub const NONCE_SIZE: usize = 7;

/// Length of the per-file random sub-key.
pub const SUB_KEY_SIZE: usize = 32;

type HmacSha256 = Hmac<Sha256>;

fn derive_file_key(master_key: &MasterKey, random_key: &[u8]) -> [u8; 32] {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(master_key).expect("HMAC accepts any key length");
    mac.update(random_key);
    mac.finalize().into_bytes().into()
}

/// Generate a fresh per-file sub-key.
pub fn generate_sub_key() -> Vec<u8> {
    let mut key = vec![0u8; SUB_KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    key
}

pub struct EncryptStage {
    encryptor: Option<EncryptorBE32<Aes256Gcm>>,
    nonce: [u8; NONCE_SIZE],
    header_sent: bool,
    buffer: Vec<u8>,
}

impl std::fmt::Debug for EncryptStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptStage")
            .field("encryptor", &self.encryptor.is_some())
            .field("nonce", &self.nonce)
            .field("header_sent", &self.header_sent)
            .field("buffer_len", &self.buffer.len())
            .finish()
    }
}

impl EncryptStage {
    pub fn new(master_key: &MasterKey, random_key: &[u8]) -> StorageResult<Self> {
        if random_key.len() != SUB_KEY_SIZE {
            return Err(StorageError::CannotEncryptFile(format!(
                "sub-key must be {SUB_KEY_SIZE} bytes, got {}",
                random_key.len()
            )));
        }

        let file_key = derive_file_key(master_key, random_key);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&file_key));

        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        Ok(Self {
            encryptor: Some(EncryptorBE32::from_aead(
                cipher,
                GenericArray::from_slice(&nonce),
            )),
            nonce,
            header_sent: false,
            buffer: Vec::new(),
        })
    }

    fn emit(&mut self, out: &mut Vec<Bytes>, ciphertext: Vec<u8>) {
        if !self.header_sent {
            out.push(Bytes::copy_from_slice(&self.nonce));
            self.header_sent = true;
        }
        out.push(Bytes::from(ciphertext));
    }
}

impl ChunkStage for EncryptStage {
    fn process(&mut self, chunk: Bytes) -> StorageResult<Vec<Bytes>> {
        self.buffer.extend_from_slice(&chunk);

        let mut out = Vec::new();
        while self.buffer.len() >= SEGMENT_SIZE {
            let segment: Vec<u8> = self.buffer.drain(..SEGMENT_SIZE).collect();
            let ciphertext = self
                .encryptor
                .as_mut()
                .ok_or_else(|| {
                    StorageError::CannotEncryptFile("cipher stream already closed".to_string())
                })?
                .encrypt_next(segment.as_slice())
                .map_err(|e| StorageError::CannotEncryptFile(e.to_string()))?;
            self.emit(&mut out, ciphertext);
        }
        Ok(out)
    }

    fn finish(&mut self) -> StorageResult<Vec<Bytes>> {
        let encryptor = match self.encryptor.take() {
            Some(encryptor) => encryptor,
            None => return Ok(Vec::new()),
        };

        let ciphertext = encryptor
            .encrypt_last(self.buffer.as_slice())
            .map_err(|e| StorageError::CannotEncryptFile(e.to_string()))?;
        self.buffer.clear();

        let mut out = Vec::new();
        self.emit(&mut out, ciphertext);
        Ok(out)
    }
}

pub struct DecryptStage {
    file_key: [u8; 32],
    decryptor: Option<DecryptorBE32<Aes256Gcm>>,
    nonce: Vec<u8>,
    buffer: Vec<u8>,
    closed: bool,
}

impl std::fmt::Debug for DecryptStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptStage")
            .field("decryptor", &self.decryptor.is_some())
            .field("nonce_len", &self.nonce.len())
            .field("buffer_len", &self.buffer.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl DecryptStage {
    pub fn new(master_key: &MasterKey, random_key: &[u8]) -> StorageResult<Self> {
        if random_key.len() != SUB_KEY_SIZE {
            return Err(StorageError::CannotDecryptFile(format!(
                "sub-key must be {SUB_KEY_SIZE} bytes, got {}",
                random_key.len()
            )));
        }

        Ok(Self {
            file_key: derive_file_key(master_key, random_key),
            decryptor: None,
            nonce: Vec::with_capacity(NONCE_SIZE),
            buffer: Vec::new(),
            closed: false,
        })
    }

    fn absorb(&mut self, chunk: &[u8]) {
        let mut rest = chunk;
        if self.decryptor.is_none() {
            let missing = NONCE_SIZE - self.nonce.len();
            let take = missing.min(rest.len());
            self.nonce.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.nonce.len() == NONCE_SIZE {
                let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.file_key));
                self.decryptor = Some(DecryptorBE32::from_aead(
                    cipher,
                    GenericArray::from_slice(&self.nonce),
                ));
            }
        }
        self.buffer.extend_from_slice(rest);
    }

    fn drain_full_segments(&mut self, out: &mut Vec<Bytes>) -> StorageResult<()> {
        // A full SEGMENT + TAG block can only be an intermediate segment;
        // the closing segment is always shorter and is handled in finish.
        while self.buffer.len() > SEGMENT_SIZE + TAG_SIZE {
            let segment: Vec<u8> = self.buffer.drain(..SEGMENT_SIZE + TAG_SIZE).collect();
            let plaintext = self
                .decryptor
                .as_mut()
                .ok_or_else(|| {
                    StorageError::CannotDecryptFile("cipher stream already closed".to_string())
                })?
                .decrypt_next(segment.as_slice())
                .map_err(|_| {
                    StorageError::CannotDecryptFile("authentication failed".to_string())
                })?;
            out.push(Bytes::from(plaintext));
        }
        Ok(())
    }
}

impl ChunkStage for DecryptStage {
    fn process(&mut self, chunk: Bytes) -> StorageResult<Vec<Bytes>> {
        self.absorb(&chunk);

        let mut out = Vec::new();
        if self.decryptor.is_some() {
            self.drain_full_segments(&mut out)?;
        }
        Ok(out)
    }

    fn finish(&mut self) -> StorageResult<Vec<Bytes>> {
        if self.closed {
            return Ok(Vec::new());
        }
        self.closed = true;

        let mut out = Vec::new();
        self.drain_full_segments(&mut out)?;

        let decryptor = self.decryptor.take().ok_or_else(|| {
            StorageError::CannotDecryptFile("ciphertext shorter than nonce header".to_string())
        })?;

        let remaining = std::mem::take(&mut self.buffer);
        let plaintext = decryptor
            .decrypt_last(remaining.as_slice())
            .map_err(|_| StorageError::CannotDecryptFile("authentication failed".to_string()))?;
        out.push(Bytes::from(plaintext));
        Ok(out)
    }
}
