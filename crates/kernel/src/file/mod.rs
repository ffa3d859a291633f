//! File and media management.
//!
//! Provides object storage backends and the concurrent asset uploader.

pub mod storage;
pub mod upload;

pub use storage::{FileStorage, LocalFileStorage};
pub use upload::{
    AssetClass, AssetUploader, MAX_FILE_SIZE, PendingAssets, PendingAttachment, UploadError,
    UploadFailure, UploadOutcome,
};

#[cfg(feature = "s3")]
pub use storage::S3FileStorage;
