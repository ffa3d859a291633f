//! Serving of locally stored uploads.
//!
//! Only mounted when assets live on the local filesystem; object stores serve
//! their own public URLs.

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::Path;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::fs;
use tracing::warn;

use crate::state::AppState;

/// Create the uploads router, serving `uploads_dir` under the `files_url` prefix.
pub fn router(uploads_dir: PathBuf, files_url: &str) -> Router<AppState> {
    let prefix = files_url.trim_end_matches('/');
    let dir = Arc::new(uploads_dir);

    Router::new().route(
        &format!("{prefix}/{{*path}}"),
        get(move |Path(path): Path<String>| {
            let dir = Arc::clone(&dir);
            async move { serve_upload(&dir, &path).await }
        }),
    )
}

async fn serve_upload(dir: &FsPath, path: &str) -> Response {
    let path = path.trim_start_matches('/');
    if path.contains("..") || path.contains('\0') || path.ends_with(".partial") {
        return StatusCode::NOT_FOUND.into_response();
    }

    let file_path = dir.join(path);
    let content = match fs::read(&file_path).await {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %file_path.display(), error = %e, "failed to read upload");
            }
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    (
        [
            (header::CONTENT_TYPE, mime_from_path(&file_path)),
            (header::CACHE_CONTROL, "public, max-age=86400"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        Body::from(content),
    )
        .into_response()
}

fn mime_from_path(path: &FsPath) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        // Inline SVG can carry script
        Some("svg") => "application/octet-stream",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("csv") => "text/csv; charset=utf-8",
        Some("zip") => "application/zip",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}
