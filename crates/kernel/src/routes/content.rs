//! Content API route handlers.
//!
//! Publish and update take `multipart/form-data`: one `draft` part holding the
//! draft as JSON, plus any number of `images` and `documents` file parts, in
//! display order.

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::warn;

use crate::content::{Draft, ListQuery, PublishReport, RenderedContent};
use crate::error::{AppError, AppResult};
use crate::file::PendingAttachment;
use crate::models::{ContentStatus, PublishableContent};
use crate::state::AppState;

/// Largest accepted request body. Individual files are capped separately.
pub const MAX_REQUEST_SIZE: usize = 64 * 1024 * 1024;

/// Create the content router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/content", get(list_content).post(publish_content))
        .route(
            "/api/content/{slug}",
            get(render_content)
                .put(update_content)
                .delete(delete_content),
        )
        .route("/api/content/{slug}/rename", post(rename_content))
        .route("/api/content/{slug}/status", post(set_content_status))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_SIZE))
}

#[derive(Debug, Deserialize)]
struct RenameRequest {
    slug: String,
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: ContentStatus,
}

/// Collect the draft and its attachments from a multipart body.
async fn read_submission(mut multipart: Multipart) -> AppResult<Draft> {
    let mut draft: Option<Draft> = None;
    let mut images = Vec::new();
    let mut documents = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "draft" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("failed to read draft: {e}")))?;
                let parsed = serde_json::from_slice(&bytes)
                    .map_err(|e| AppError::BadRequest(format!("invalid draft JSON: {e}")))?;
                draft = Some(parsed);
            }
            "images" | "documents" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(|e| {
                    AppError::BadRequest(format!("failed to read file {filename}: {e}"))
                })?;

                let attachment = PendingAttachment::new(filename, content_type, data.to_vec());
                if name == "images" {
                    images.push(attachment);
                } else {
                    documents.push(attachment);
                }
            }
            other => warn!(field = %other, "ignoring unexpected multipart field"),
        }
    }

    let mut draft =
        draft.ok_or_else(|| AppError::BadRequest("missing draft part".to_string()))?;
    draft.pending.images = images;
    draft.pending.documents = documents;
    Ok(draft)
}

/// POST /api/content
async fn publish_content(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<PublishReport>)> {
    let draft = read_submission(multipart).await?;
    let report = state.publisher().publish(draft).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// PUT /api/content/{slug}
async fn update_content(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<PublishReport>> {
    let draft = read_submission(multipart).await?;
    let report = state.publisher().update(&slug, draft).await?;
    Ok(Json(report))
}

/// POST /api/content/{slug}/rename
async fn rename_content(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<RenameRequest>,
) -> AppResult<Json<PublishableContent>> {
    let record = state.publisher().rename(&slug, &request.slug).await?;
    Ok(Json(record))
}

/// POST /api/content/{slug}/status
async fn set_content_status(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(request): Json<StatusRequest>,
) -> AppResult<Json<PublishableContent>> {
    let record = state.publisher().set_status(&slug, request.status).await?;
    Ok(Json(record))
}

/// DELETE /api/content/{slug}
async fn delete_content(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    state.publisher().delete(&slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/content/{slug}
async fn render_content(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<RenderedContent>> {
    let rendered = state.publisher().render(&slug).await?;
    Ok(Json(rendered))
}

/// GET /api/content
///
/// Visitors only ever see published records, whatever status is requested.
async fn list_content(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<RenderedContent>>> {
    let query = ListQuery {
        status: ContentStatus::Published,
        ..query
    };
    let records = state.publisher().list(query).await?;
    Ok(Json(records))
}
