#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! The REAL kernel pipeline and routes run against in-memory backends from
//! `showcase-test-utils`, so no database or object store is needed.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use showcase_kernel::content::PublishService;
use showcase_kernel::{AppState, PipelineConfig};
use showcase_test_utils::{MemoryContentStore, MemoryFileStorage};

/// Boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "----ShowcaseTestBoundary";

/// Test application wrapper using the REAL kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<MemoryContentStore>,
    pub storage: Arc<MemoryFileStorage>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_backends(MemoryContentStore::new(), MemoryFileStorage::new())
    }

    pub fn with_backends(store: MemoryContentStore, storage: MemoryFileStorage) -> Self {
        let store = Arc::new(store);
        let storage = Arc::new(storage);
        let state = AppState::from_parts(store.clone(), storage.clone(), &pipeline_config());
        let router = showcase_kernel::routes::router().with_state(state.clone());

        Self {
            router,
            state,
            store,
            storage,
        }
    }

    pub fn publisher(&self) -> &PublishService {
        self.state.publisher()
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// POST or PUT a multipart submission.
    pub async fn submit(&self, method: &str, uri: &str, body: Vec<u8>) -> Response {
        self.request(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Send a JSON body.
    pub async fn send_json(&self, method: &str, uri: &str, body: Value) -> Response {
        self.request(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }
}

/// Pipeline settings with a short upload timeout for stalled-write tests.
pub fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        upload_timeout: Duration::from_millis(200),
        ..PipelineConfig::default()
    }
}

/// Build a publish service directly over the given backends.
pub fn publisher(store: Arc<MemoryContentStore>, storage: Arc<MemoryFileStorage>) -> PublishService {
    PublishService::new(store, storage, &pipeline_config())
}

/// A file part for [`multipart_body`].
pub struct FilePart<'a> {
    pub field: &'a str,
    pub filename: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

/// Build a multipart body with a `draft` JSON part and file parts.
pub fn multipart_body(draft: &Value, files: &[FilePart<'_>]) -> Vec<u8> {
    let mut body = Vec::new();

    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
Content-Disposition: form-data; name=\"draft\"\r\n\
Content-Type: application/json\r\n\
\r\n\
{draft}\r\n"
        )
        .as_bytes(),
    );

    for file in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\n\
Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
Content-Type: {}\r\n\
\r\n",
                file.field, file.filename, file.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Collect a response body as JSON.
pub async fn response_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Response is not JSON")
}
