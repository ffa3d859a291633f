//! Best-effort asset upload coordinator.
//!
//! Pending attachments are uploaded concurrently per asset class. A failed
//! file never aborts its siblings or the other class; the outcome lists the
//! URLs that succeeded, in original submission order, plus every failure.
//! Nothing is retried automatically.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::storage::FileStorage;

/// Maximum file size (10 MB).
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Allowed MIME types for images.
pub const IMAGE_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

/// Allowed MIME types for documents.
pub const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
    "text/csv",
    "application/zip",
];

/// Default number of uploads in flight at once.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;

/// Default per-file upload timeout.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Asset class; each class is uploaded and ordered independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Image,
    Document,
}

impl AssetClass {
    pub fn allowed_mime_types(&self) -> &'static [&'static str] {
        match self {
            AssetClass::Image => IMAGE_MIME_TYPES,
            AssetClass::Document => DOCUMENT_MIME_TYPES,
        }
    }
}

/// A binary attachment awaiting upload.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl PendingAttachment {
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

impl std::fmt::Debug for PendingAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAttachment")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Attachments awaiting upload, per class, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingAssets {
    pub images: Vec<PendingAttachment>,
    pub documents: Vec<PendingAttachment>,
}

impl PendingAssets {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.images.len() + self.documents.len()
    }
}

/// Why a single file was not uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("file too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("file type not allowed: {0}")]
    DisallowedType(String),

    #[error("empty file")]
    Empty,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("upload timed out after {0:?}")]
    TimedOut(Duration),

    #[error("upload task aborted")]
    Aborted,
}

/// A per-file upload failure, reported alongside a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFailure {
    pub class: AssetClass,
    /// Position of the file within its class, as submitted.
    pub index: usize,
    pub filename: String,
    pub error: String,
}

/// URLs that were uploaded, in submission order, plus failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    pub images: Vec<String>,
    pub documents: Vec<String>,
    pub failures: Vec<UploadFailure>,
}

/// Uploads pending attachments with bounded concurrency.
#[derive(Clone)]
pub struct AssetUploader {
    storage: Arc<dyn FileStorage>,
    /// Shared across both classes so the bound covers the whole publish.
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl AssetUploader {
    pub fn new(storage: Arc<dyn FileStorage>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            storage,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            timeout,
        }
    }

    pub fn storage(&self) -> &Arc<dyn FileStorage> {
        &self.storage
    }

    /// Upload every pending attachment. Never fails as a whole.
    pub async fn upload_all(&self, pending: PendingAssets) -> UploadOutcome {
        if pending.is_empty() {
            return UploadOutcome::default();
        }

        let ((images, mut failures), (documents, document_failures)) = tokio::join!(
            self.upload_class(AssetClass::Image, pending.images),
            self.upload_class(AssetClass::Document, pending.documents),
        );
        failures.extend(document_failures);

        UploadOutcome {
            images,
            documents,
            failures,
        }
    }

    /// Fan out one class, then reassemble results by submission index.
    async fn upload_class(
        &self,
        class: AssetClass,
        files: Vec<PendingAttachment>,
    ) -> (Vec<String>, Vec<UploadFailure>) {
        let filenames: Vec<String> = files.iter().map(|f| f.filename.clone()).collect();
        let mut slots: Vec<Option<Result<String, UploadError>>> = vec![None; files.len()];
        let mut join_set: JoinSet<(usize, Result<String, UploadError>)> = JoinSet::new();

        for (index, file) in files.into_iter().enumerate() {
            let storage = Arc::clone(&self.storage);
            let permits = Arc::clone(&self.permits);
            let timeout = self.timeout;

            join_set.spawn(async move {
                let result = upload_one(storage, permits, timeout, class, file).await;
                (index, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                // Slot stays empty and is reported as aborted below
                Err(e) => warn!(class = ?class, error = %e, "upload task failed to complete"),
            }
        }

        let mut urls = Vec::new();
        let mut failures = Vec::new();
        for (index, slot) in slots.into_iter().enumerate() {
            match slot.unwrap_or(Err(UploadError::Aborted)) {
                Ok(url) => urls.push(url),
                Err(error) => failures.push(UploadFailure {
                    class,
                    index,
                    filename: filenames[index].clone(),
                    error: error.to_string(),
                }),
            }
        }

        (urls, failures)
    }
}

impl std::fmt::Debug for AssetUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetUploader")
            .field("scheme", &self.storage.scheme())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Check size and MIME type before spending a storage call.
pub fn check_attachment(class: AssetClass, file: &PendingAttachment) -> Result<(), UploadError> {
    if file.data.is_empty() {
        return Err(UploadError::Empty);
    }

    if file.data.len() > MAX_FILE_SIZE {
        return Err(UploadError::TooLarge {
            size: file.data.len(),
            max: MAX_FILE_SIZE,
        });
    }

    // Ignore parameters such as `; charset=utf-8`
    let mime = file
        .content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if !class.allowed_mime_types().contains(&mime.as_str()) {
        return Err(UploadError::DisallowedType(file.content_type.clone()));
    }

    Ok(())
}

async fn upload_one(
    storage: Arc<dyn FileStorage>,
    permits: Arc<Semaphore>,
    timeout: Duration,
    class: AssetClass,
    file: PendingAttachment,
) -> Result<String, UploadError> {
    check_attachment(class, &file)?;

    let _permit = permits.acquire_owned().await.map_err(|_| UploadError::Aborted)?;

    let uri = storage.generate_uri(&file.filename);
    match tokio::time::timeout(timeout, storage.write(&uri, &file.data)).await {
        Ok(Ok(())) => {
            debug!(class = ?class, filename = %file.filename, uri = %uri, "asset uploaded");
            Ok(storage.public_url(&uri))
        }
        Ok(Err(e)) => Err(UploadError::Storage(format!("{e:#}"))),
        Err(_) => Err(UploadError::TimedOut(timeout)),
    }
}
