//! Showcase server.
//!
//! Serves the content API over the publishing pipeline.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use showcase_kernel::routes;
use showcase_kernel::{AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("failed to load configuration")?;
    info!(
        port = config.port,
        max_probes = config.pipeline.max_probes,
        upload_concurrency = config.pipeline.upload_concurrency,
        "starting showcase"
    );

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    let cors = build_cors_layer(&config);

    let mut router = routes::router();
    if state.storage().scheme() == "local" && config.files_url.starts_with('/') {
        router = router.merge(routes::files::router(
            config.uploads_dir.clone(),
            &config.files_url,
        ));
        info!(prefix = %config.files_url, "serving local uploads");
    }

    // TraceLayer → CORS → routes
    let app = router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// CORS for the content API. A `*` entry allows any origin.
fn build_cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    if config.cors_allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins = config.cors_allowed_origins.iter().filter_map(|origin| {
        origin
            .parse::<HeaderValue>()
            .inspect_err(|_| warn!(%origin, "ignoring unparseable CORS origin"))
            .ok()
    });
    layer.allow_origin(AllowOrigin::list(origins))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
