pub mod file;
pub mod metadata;
pub mod upload;
pub mod url;

pub use file::FileEntity;
pub use metadata::{EncryptionMetadata, MetadataValue};
pub use upload::{UploadMeta, UploadOptions, UploadOutcome};
pub use url::{SignedFileUrl, UrlBase};
