//! Error types module
//!
//! All storage-facing errors are unified under the `StorageError` enum.
//! Variants split into two families the caller is expected to branch on:
//! validation-shaped outcomes (`is_recoverable() == true`, e.g. an upload
//! with an unsupported mimetype or an expired download link) and
//! infrastructure faults (disk, crypto) that should propagate up.

use std::io;
use std::path::PathBuf;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Content could not be classified, or its mimetype is not allow-listed.
    /// Both cases share this kind; `detail` tells them apart.
    #[error("Unsupported mimetype: {detail} (allowed: {})", .allowed.join(", "))]
    UnsupportedMimetype {
        detail: String,
        allowed: Vec<String>,
    },

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Signed URL has expired")]
    UrlExpired,

    #[error("Signed URL signature is invalid")]
    UrlInvalidSignature,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("File belongs to provider {actual}, not {expected}")]
    IncompatibleProvider { expected: String, actual: String },

    #[error("Storage provider not implemented: {0}")]
    UnknownProvider(String),

    #[error("Cannot create directory {path}: {source}")]
    CannotCreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot create file {path}: {source}")]
    CannotCreateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot upload file: {source}")]
    CannotUploadFile {
        #[source]
        source: Box<StorageError>,
    },

    #[error("Cannot encrypt file: {0}")]
    CannotEncryptFile(String),

    #[error("Cannot decrypt file: {0}")]
    CannotDecryptFile(String),

    #[error("Cannot sign file URL: {0}")]
    CannotSignUrl(String),

    #[error("Cannot evaluate URL signature: {0}")]
    CannotEvaluateSignature(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Static metadata for each variant: (error_code, recoverable, log_level).
fn static_metadata(err: &StorageError) -> (&'static str, bool, LogLevel) {
    match err {
        StorageError::UnsupportedMimetype { .. } => {
            ("UNSUPPORTED_MIMETYPE", true, LogLevel::Debug)
        }
        StorageError::NotFound(_) => ("NOT_FOUND", true, LogLevel::Debug),
        StorageError::UrlExpired => ("URL_EXPIRED", true, LogLevel::Debug),
        StorageError::UrlInvalidSignature => ("URL_INVALID_SIGNATURE", true, LogLevel::Debug),
        StorageError::InvalidUrl(_) => ("INVALID_URL", true, LogLevel::Debug),
        StorageError::IncompatibleProvider { .. } => {
            ("INCOMPATIBLE_PROVIDER", false, LogLevel::Error)
        }
        StorageError::UnknownProvider(_) => ("UNKNOWN_PROVIDER", false, LogLevel::Error),
        StorageError::CannotCreateDirectory { .. } => {
            ("CANNOT_CREATE_DIRECTORY", false, LogLevel::Error)
        }
        StorageError::CannotCreateFile { .. } => ("CANNOT_CREATE_FILE", false, LogLevel::Error),
        StorageError::CannotUploadFile { .. } => ("CANNOT_UPLOAD_FILE", false, LogLevel::Error),
        StorageError::CannotEncryptFile(_) => ("CANNOT_ENCRYPT_FILE", false, LogLevel::Error),
        StorageError::CannotDecryptFile(_) => ("CANNOT_DECRYPT_FILE", false, LogLevel::Error),
        StorageError::CannotSignUrl(_) => ("CANNOT_SIGN_URL", false, LogLevel::Error),
        StorageError::CannotEvaluateSignature(_) => {
            ("CANNOT_EVALUATE_SIGNATURE", false, LogLevel::Error)
        }
        StorageError::Io(_) => ("IO_ERROR", false, LogLevel::Error),
    }
}

impl StorageError {
    /// Machine-readable error code (e.g. "NOT_FOUND")
    pub fn error_code(&self) -> &'static str {
        static_metadata(self).0
    }

    /// Whether this error is a business-validation outcome the caller
    /// should branch on, as opposed to an infrastructure fault.
    pub fn is_recoverable(&self) -> bool {
        static_metadata(self).1
    }

    pub fn log_level(&self) -> LogLevel {
        static_metadata(self).2
    }

    /// Get detailed error information including the source chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
