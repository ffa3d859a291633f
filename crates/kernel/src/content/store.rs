//! Content store port and PostgreSQL backend.
//!
//! Records are stored as one JSONB document per row, keyed by slug, with the
//! listing columns (`kind`, `status`, `featured`, `created`) lifted out for
//! indexing. The unique constraint on `slug` is the final arbiter of slug
//! ownership; a conflicting insert or rename surfaces as
//! [`StoreError::SlugTaken`].

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::PgPool;
use sqlx::types::Json;

use crate::error::StoreError;
use crate::models::{ContentKind, ContentStatus, PublishableContent};

/// Default page size for listings.
pub const DEFAULT_LIST_LIMIT: i64 = 20;

/// Largest page a listing may request.
pub const MAX_LIST_LIMIT: i64 = 100;

/// Listing query. The slug tiebreak keeps pages stable within one second.
const LIST_SQL: &str = r#"
    SELECT document FROM content
    WHERE status = $1
      AND ($2::text IS NULL OR kind = $2)
      AND ($3::bool IS NULL OR featured = $3)
    ORDER BY featured DESC, created DESC, slug ASC
    LIMIT $4 OFFSET $5
"#;

/// Listing filter.
#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    #[serde(default = "ListQuery::default_status")]
    pub status: ContentStatus,
    pub kind: Option<ContentKind>,
    pub featured: Option<bool>,
    #[serde(default = "ListQuery::default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl ListQuery {
    fn default_status() -> ContentStatus {
        ContentStatus::Published
    }

    fn default_limit() -> i64 {
        DEFAULT_LIST_LIMIT
    }

    /// Published records of every kind.
    pub fn published() -> Self {
        Self {
            status: ContentStatus::Published,
            kind: None,
            featured: None,
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }

    pub fn kind(mut self, kind: ContentKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn featured(mut self, featured: bool) -> Self {
        self.featured = Some(featured);
        self
    }

    /// Clamp paging to sane bounds.
    pub fn clamped(mut self) -> Self {
        self.limit = self.limit.clamp(1, MAX_LIST_LIMIT);
        self.offset = self.offset.max(0);
        self
    }

    /// Whether a record passes this filter (paging aside).
    pub fn matches(&self, record: &PublishableContent) -> bool {
        record.status == self.status
            && self.kind.is_none_or(|k| record.kind == k)
            && self.featured.is_none_or(|f| record.featured == f)
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::published()
    }
}

/// Persistence port for publishable content.
///
/// Every method is a single atomic operation: a failed write leaves no partial
/// record behind.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Point lookup: is `slug` in use?
    async fn exists(&self, slug: &str) -> Result<bool, StoreError>;

    async fn find(&self, slug: &str) -> Result<Option<PublishableContent>, StoreError>;

    /// Insert a new record; fails with `SlugTaken` if the slug is in use.
    async fn insert(&self, record: &PublishableContent) -> Result<(), StoreError>;

    /// Replace the record stored under `record.slug`.
    async fn update(&self, record: &PublishableContent) -> Result<(), StoreError>;

    /// Move a record to a new slug.
    async fn rename(
        &self,
        from: &str,
        to: &str,
        changed: i64,
    ) -> Result<PublishableContent, StoreError>;

    async fn set_status(
        &self,
        slug: &str,
        status: ContentStatus,
        changed: i64,
    ) -> Result<PublishableContent, StoreError>;

    /// Delete by slug. Returns whether a record was removed.
    async fn delete(&self, slug: &str) -> Result<bool, StoreError>;

    /// List records ordered featured-first, then newest.
    async fn list(&self, query: &ListQuery) -> Result<Vec<PublishableContent>, StoreError>;

    /// Whether the backend is reachable.
    async fn ping(&self) -> bool;
}

/// PostgreSQL-backed content store.
#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgContentStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Bound a store call by the configured timeout.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }

    /// Lock a row, apply `change`, and write it back under `new_slug` in one
    /// transaction.
    async fn rewrite(
        &self,
        slug: &str,
        new_slug: &str,
        change: impl FnOnce(&mut PublishableContent),
    ) -> Result<PublishableContent, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start transaction")?;

        let row: Option<(Json<PublishableContent>,)> =
            sqlx::query_as("SELECT document FROM content WHERE slug = $1 FOR UPDATE")
                .bind(slug)
                .fetch_optional(&mut *tx)
                .await
                .context("failed to lock content row")?;

        let Some((Json(mut record),)) = row else {
            return Err(StoreError::NotFound(slug.to_string()));
        };

        change(&mut record);
        record.slug = new_slug.to_string();

        sqlx::query(
            r#"
            UPDATE content
            SET slug = $2, kind = $3, status = $4, featured = $5, changed = $6, document = $7
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .bind(&record.slug)
        .bind(record.kind.as_str())
        .bind(record.status.as_str())
        .bind(record.featured)
        .bind(record.changed)
        .bind(Json(&record))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, new_slug))?;

        tx.commit().await.context("failed to commit transaction")?;

        Ok(record)
    }
}

/// Translate unique violations into `SlugTaken`.
fn map_write_error(err: sqlx::Error, slug: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::SlugTaken(slug.to_string());
        }
    }
    StoreError::Backend(anyhow::Error::new(err).context("failed to write content"))
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn exists(&self, slug: &str) -> Result<bool, StoreError> {
        self.bounded(async {
            let found: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM content WHERE slug = $1)")
                    .bind(slug)
                    .fetch_one(&self.pool)
                    .await
                    .context("failed to probe slug")?;
            Ok::<_, StoreError>(found)
        })
        .await
    }

    async fn find(&self, slug: &str) -> Result<Option<PublishableContent>, StoreError> {
        self.bounded(async {
            let row: Option<(Json<PublishableContent>,)> =
                sqlx::query_as("SELECT document FROM content WHERE slug = $1")
                    .bind(slug)
                    .fetch_optional(&self.pool)
                    .await
                    .context("failed to fetch content by slug")?;
            Ok::<_, StoreError>(row.map(|(Json(record),)| record))
        })
        .await
    }

    async fn insert(&self, record: &PublishableContent) -> Result<(), StoreError> {
        self.bounded(async {
            sqlx::query(
                r#"
                INSERT INTO content (slug, kind, status, featured, author_id, created, changed, document)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(&record.slug)
            .bind(record.kind.as_str())
            .bind(record.status.as_str())
            .bind(record.featured)
            .bind(&record.author_id)
            .bind(record.created)
            .bind(record.changed)
            .bind(Json(record))
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, &record.slug))?;
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn update(&self, record: &PublishableContent) -> Result<(), StoreError> {
        self.bounded(async {
            let result = sqlx::query(
                r#"
                UPDATE content
                SET kind = $2, status = $3, featured = $4, changed = $5, document = $6
                WHERE slug = $1
                "#,
            )
            .bind(&record.slug)
            .bind(record.kind.as_str())
            .bind(record.status.as_str())
            .bind(record.featured)
            .bind(record.changed)
            .bind(Json(record))
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, &record.slug))?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(record.slug.clone()));
            }
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn rename(
        &self,
        from: &str,
        to: &str,
        changed: i64,
    ) -> Result<PublishableContent, StoreError> {
        self.bounded(self.rewrite(from, to, |record| record.changed = changed))
            .await
    }

    async fn set_status(
        &self,
        slug: &str,
        status: ContentStatus,
        changed: i64,
    ) -> Result<PublishableContent, StoreError> {
        self.bounded(self.rewrite(slug, slug, |record| {
            record.status = status;
            record.changed = changed;
        }))
        .await
    }

    async fn delete(&self, slug: &str) -> Result<bool, StoreError> {
        self.bounded(async {
            let result = sqlx::query("DELETE FROM content WHERE slug = $1")
                .bind(slug)
                .execute(&self.pool)
                .await
                .context("failed to delete content")?;
            Ok::<_, StoreError>(result.rows_affected() > 0)
        })
        .await
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<PublishableContent>, StoreError> {
        self.bounded(async {
            let rows: Vec<(Json<PublishableContent>,)> = sqlx::query_as(LIST_SQL)
            .bind(query.status.as_str())
            .bind(query.kind.map(|k| k.as_str()))
            .bind(query.featured)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await
            .context("failed to list content")?;

            Ok::<_, StoreError>(rows.into_iter().map(|(Json(record),)| record).collect())
        })
        .await
    }

    async fn ping(&self) -> bool {
        crate::db::check_health(&self.pool).await
    }
}

impl std::fmt::Debug for PgContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgContentStore")
            .field("timeout", &self.timeout)
            .finish()
    }
}
