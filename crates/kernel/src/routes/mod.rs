//! HTTP route handlers.

use axum::Router;

use crate::state::AppState;

pub mod content;
pub mod files;
pub mod health;

/// All application routes, without state or middleware.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(content::router())
}
