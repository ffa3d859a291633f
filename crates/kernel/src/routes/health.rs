//! `GET /health`: 200 while the content store answers, 503 otherwise.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct Health {
    status: &'static str,
    store: bool,
    store_latency_ms: u64,
    storage: &'static str,
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    let started = Instant::now();
    let store = state.store_healthy().await;
    let store_latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let (code, status) = match store {
        true => (StatusCode::OK, "healthy"),
        false => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    (
        code,
        Json(Health {
            status,
            store,
            store_latency_ms,
            storage: state.storage().scheme(),
        }),
    )
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
