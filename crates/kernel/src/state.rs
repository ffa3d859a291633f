//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{Config, PipelineConfig};
use crate::content::{ContentStore, PgContentStore, PublishService};
use crate::db;
use crate::file::{FileStorage, LocalFileStorage};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Publish pipeline and record lifecycle.
    publisher: PublishService,

    /// Object store backing uploaded assets.
    storage: Arc<dyn FileStorage>,
}

impl AppState {
    /// Create application state: connect, migrate, and wire the pipeline.
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = db::create_pool(config)
            .await
            .context("failed to create database pool")?;
        db::run_migrations(&pool).await?;
        info!("Connected to PostgreSQL");

        let store: Arc<dyn ContentStore> =
            Arc::new(PgContentStore::new(pool, config.store_timeout));
        let storage = build_storage(config).await?;
        info!(scheme = storage.scheme(), "File storage ready");

        Ok(Self::from_parts(store, storage, &config.pipeline))
    }

    /// Assemble state from already-built backends.
    pub fn from_parts(
        store: Arc<dyn ContentStore>,
        storage: Arc<dyn FileStorage>,
        pipeline: &PipelineConfig,
    ) -> Self {
        let publisher = PublishService::new(store, Arc::clone(&storage), pipeline);
        Self {
            inner: Arc::new(AppStateInner { publisher, storage }),
        }
    }

    pub fn publisher(&self) -> &PublishService {
        &self.inner.publisher
    }

    pub fn storage(&self) -> &Arc<dyn FileStorage> {
        &self.inner.storage
    }

    /// Whether the content store is reachable.
    pub async fn store_healthy(&self) -> bool {
        self.inner.publisher.store().ping().await
    }
}

#[cfg(feature = "s3")]
async fn build_storage(config: &Config) -> Result<Arc<dyn FileStorage>> {
    use crate::file::S3FileStorage;

    let Some(s3) = &config.s3 else {
        return Ok(local_storage(config));
    };

    let storage = S3FileStorage::connect(s3)
        .await
        .context("failed to initialize S3 storage")?;

    Ok(Arc::new(storage))
}

#[cfg(not(feature = "s3"))]
async fn build_storage(config: &Config) -> Result<Arc<dyn FileStorage>> {
    Ok(local_storage(config))
}

fn local_storage(config: &Config) -> Arc<dyn FileStorage> {
    Arc::new(LocalFileStorage::new(
        config.uploads_dir.clone(),
        config.files_url.clone(),
    ))
}
