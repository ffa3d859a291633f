//! Publish orchestrator.
//!
//! Turns a submitted draft into one persisted record:
//! validate, upload assets, resolve the slug, normalize tiers, then a single
//! atomic insert. Validation happens before any external call, so a rejected
//! draft never touches the object store or the database. Asset uploads are
//! best-effort; their failures ride along on the report.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::content::draft::{Draft, PublishRequest};
use crate::content::filter::ContentSanitizer;
use crate::content::slug::{SlugResolver, base_slug};
use crate::content::store::{ContentStore, ListQuery};
use crate::content::tiers::normalize;
use crate::error::{PublishError, StoreError};
use crate::file::storage::FileStorage;
use crate::file::upload::{AssetUploader, UploadFailure, UploadOutcome};
use crate::models::{Assets, ContentStatus, Pricing, PublishableContent};

/// Pipeline phase, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishPhase {
    Validating,
    UploadingAssets,
    ResolvingSlug,
    NormalizingTiers,
    Persisting,
    Done,
    Failed,
}

impl PublishPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishPhase::Validating => "validating",
            PublishPhase::UploadingAssets => "uploading_assets",
            PublishPhase::ResolvingSlug => "resolving_slug",
            PublishPhase::NormalizingTiers => "normalizing_tiers",
            PublishPhase::Persisting => "persisting",
            PublishPhase::Done => "done",
            PublishPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for PublishPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful publish or update.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub content: PublishableContent,
    /// Assets that could not be uploaded. The record was written without them.
    pub upload_failures: Vec<UploadFailure>,
}

/// A record prepared for the renderer: rich text sanitized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedContent {
    #[serde(flatten)]
    pub content: PublishableContent,
    pub featured_image: Option<String>,
}

/// Runs the publish pipeline and the record lifecycle operations.
#[derive(Clone)]
pub struct PublishService {
    inner: Arc<PublishServiceInner>,
}

struct PublishServiceInner {
    store: Arc<dyn ContentStore>,
    uploader: AssetUploader,
    resolver: SlugResolver,
    sanitizer: ContentSanitizer,
    max_publish_attempts: u32,
}

/// Tracks the current phase of one pipeline run.
struct PhaseLog {
    title: String,
    phase: PublishPhase,
    /// URLs written by this run; orphaned if the run fails.
    uploaded: Vec<String>,
}

impl PhaseLog {
    fn start(title: &str) -> Self {
        debug!(title = %title, phase = %PublishPhase::Validating, "publish phase");
        Self {
            title: title.to_string(),
            phase: PublishPhase::Validating,
            uploaded: Vec::new(),
        }
    }

    fn track_uploads(&mut self, outcome: &UploadOutcome) {
        self.uploaded = outcome
            .images
            .iter()
            .chain(&outcome.documents)
            .cloned()
            .collect();
    }

    fn enter(&mut self, phase: PublishPhase) {
        debug!(title = %self.title, from = %self.phase, phase = %phase, "publish phase");
        self.phase = phase;
    }

    /// Record a fatal error against the current phase and pass it through.
    fn fail(&mut self, error: PublishError) -> PublishError {
        warn!(
            title = %self.title,
            phase = %self.phase,
            error = %error,
            "publish failed"
        );
        if !self.uploaded.is_empty() {
            warn!(
                title = %self.title,
                orphaned = ?self.uploaded,
                "uploaded assets left unreferenced"
            );
        }
        self.phase = PublishPhase::Failed;
        error
    }
}

impl PublishService {
    pub fn new(
        store: Arc<dyn ContentStore>,
        storage: Arc<dyn FileStorage>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PublishServiceInner {
                store,
                uploader: AssetUploader::new(
                    storage,
                    config.upload_concurrency,
                    config.upload_timeout,
                ),
                resolver: SlugResolver::new(config.max_probes),
                sanitizer: ContentSanitizer::new(),
                max_publish_attempts: config.max_publish_attempts.max(1),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.inner.store
    }

    /// Publish a new record from a submitted draft.
    pub async fn publish(
        &self,
        request: impl Into<PublishRequest>,
    ) -> Result<PublishReport, PublishError> {
        let PublishRequest { mut draft } = request.into();
        let mut log = PhaseLog::start(&draft.title);

        let pricing = Self::check(&draft).map_err(|e| log.fail(e))?;

        log.enter(PublishPhase::UploadingAssets);
        let pending = std::mem::take(&mut draft.pending);
        let outcome = self.inner.uploader.upload_all(pending).await;
        log.track_uploads(&outcome);
        let assets = merge_assets(&draft.existing_assets, &outcome);
        report_upload_failures(&draft.title, &outcome);

        log.enter(PublishPhase::ResolvingSlug);
        let store = self.inner.store.as_ref();
        let slug = self
            .inner
            .resolver
            .resolve(store, &draft.title)
            .await
            .map_err(|e| log.fail(e))?;

        log.enter(PublishPhase::NormalizingTiers);
        let pricing = match pricing {
            Some(pricing) => Some(Pricing {
                tiers: normalize(&pricing.tiers, pricing.tier_cardinality)
                    .map_err(|errors| log.fail(tier_errors(errors)))?,
                ..pricing
            }),
            None => None,
        };

        let now = chrono::Utc::now().timestamp();
        let mut record = build_record(draft, slug, pricing, assets, now, now);

        let mut attempt = 1;
        loop {
            log.enter(PublishPhase::Persisting);
            match store.insert(&record).await {
                Ok(()) => break,
                Err(StoreError::SlugTaken(taken)) => {
                    if attempt >= self.inner.max_publish_attempts {
                        return Err(log.fail(PublishError::SlugCollisionExhausted {
                            base: base_slug(&record.title),
                            attempts: attempt,
                        }));
                    }
                    attempt += 1;
                    warn!(slug = %taken, attempt, "slug claimed concurrently, resolving again");

                    log.enter(PublishPhase::ResolvingSlug);
                    record.slug = self
                        .inner
                        .resolver
                        .resolve(store, &record.title)
                        .await
                        .map_err(|e| log.fail(e))?;
                }
                Err(e) => return Err(log.fail(e.into())),
            }
        }

        log.enter(PublishPhase::Done);
        info!(
            slug = %record.slug,
            kind = %record.kind,
            status = %record.status,
            images = record.assets.images.len(),
            documents = record.assets.documents.len(),
            upload_failures = outcome.failures.len(),
            "content published"
        );

        Ok(PublishReport {
            content: record,
            upload_failures: outcome.failures,
        })
    }

    /// Replace an existing record's content. The slug never changes here.
    ///
    /// Kept assets come from the draft's `existing_assets`; new uploads are
    /// appended after them.
    pub async fn update(
        &self,
        slug: &str,
        request: impl Into<PublishRequest>,
    ) -> Result<PublishReport, PublishError> {
        let PublishRequest { mut draft } = request.into();
        let mut log = PhaseLog::start(&draft.title);

        let pricing = Self::check(&draft).map_err(|e| log.fail(e))?;

        let existing = self
            .inner
            .store
            .find(slug)
            .await
            .map_err(|e| log.fail(e.into()))?
            .ok_or_else(|| log.fail(PublishError::NotFound(slug.to_string())))?;

        log.enter(PublishPhase::UploadingAssets);
        let pending = std::mem::take(&mut draft.pending);
        let outcome = self.inner.uploader.upload_all(pending).await;
        log.track_uploads(&outcome);
        let assets = merge_assets(&draft.existing_assets, &outcome);
        report_upload_failures(&draft.title, &outcome);

        log.enter(PublishPhase::NormalizingTiers);
        let pricing = match pricing {
            Some(pricing) => Some(Pricing {
                tiers: normalize(&pricing.tiers, pricing.tier_cardinality)
                    .map_err(|errors| log.fail(tier_errors(errors)))?,
                ..pricing
            }),
            None => None,
        };

        let now = chrono::Utc::now().timestamp();
        let record = build_record(
            draft,
            existing.slug,
            pricing,
            assets,
            existing.created,
            now,
        );

        log.enter(PublishPhase::Persisting);
        self.inner
            .store
            .update(&record)
            .await
            .map_err(|e| log.fail(not_found_or(e)))?;

        log.enter(PublishPhase::Done);
        info!(slug = %record.slug, status = %record.status, "content updated");

        Ok(PublishReport {
            content: record,
            upload_failures: outcome.failures,
        })
    }

    /// Move a record to a new slug derived from `requested`.
    ///
    /// The record's own slug counts as free, so a request that resolves back
    /// to it is a no-op.
    pub async fn rename(
        &self,
        slug: &str,
        requested: &str,
    ) -> Result<PublishableContent, PublishError> {
        let store = self.inner.store.as_ref();

        let current = store
            .find(slug)
            .await?
            .ok_or_else(|| PublishError::NotFound(slug.to_string()))?;

        let mut attempt = 1;
        loop {
            let target = self
                .inner
                .resolver
                .resolve_explicit(store, requested, Some(&current.slug))
                .await?;
            if target == current.slug {
                return Ok(current);
            }

            let now = chrono::Utc::now().timestamp();

            match store.rename(slug, &target, now).await {
                Ok(record) => {
                    info!(from = %slug, to = %record.slug, "content renamed");
                    return Ok(record);
                }
                Err(StoreError::SlugTaken(taken)) if attempt < self.inner.max_publish_attempts => {
                    attempt += 1;
                    warn!(slug = %taken, attempt, "slug claimed concurrently, resolving again");
                }
                Err(StoreError::SlugTaken(_)) => {
                    return Err(PublishError::SlugCollisionExhausted {
                        base: base_slug(requested),
                        attempts: attempt,
                    });
                }
                Err(e) => return Err(not_found_or(e)),
            }
        }
    }

    pub async fn set_status(
        &self,
        slug: &str,
        status: ContentStatus,
    ) -> Result<PublishableContent, PublishError> {
        let now = chrono::Utc::now().timestamp();
        let record = self
            .inner
            .store
            .set_status(slug, status, now)
            .await
            .map_err(not_found_or)?;

        info!(slug = %slug, status = %status, "content status changed");
        Ok(record)
    }

    /// Hard-delete a record. Uploaded assets are left in the object store.
    pub async fn delete(&self, slug: &str) -> Result<(), PublishError> {
        if !self.inner.store.delete(slug).await? {
            return Err(PublishError::NotFound(slug.to_string()));
        }
        info!(slug = %slug, "content deleted");
        Ok(())
    }

    /// Fetch a record as stored, whatever its status.
    pub async fn get(&self, slug: &str) -> Result<PublishableContent, PublishError> {
        self.inner
            .store
            .find(slug)
            .await?
            .ok_or_else(|| PublishError::NotFound(slug.to_string()))
    }

    /// Fetch a published record, sanitized for display.
    ///
    /// Drafts and archived records are reported as not found.
    pub async fn render(&self, slug: &str) -> Result<RenderedContent, PublishError> {
        match self.inner.store.find(slug).await? {
            Some(record) if record.is_published() => Ok(self.sanitized(record)),
            _ => Err(PublishError::NotFound(slug.to_string())),
        }
    }

    /// List records matching `query`, sanitized for display.
    pub async fn list(&self, query: ListQuery) -> Result<Vec<RenderedContent>, PublishError> {
        let records = self.inner.store.list(&query.clamped()).await?;
        Ok(records.into_iter().map(|r| self.sanitized(r)).collect())
    }

    /// Sanitize every rich-text field of a record.
    fn sanitized(&self, mut record: PublishableContent) -> RenderedContent {
        let sanitizer = &self.inner.sanitizer;

        record.body = sanitizer.sanitize(&record.body);
        if let Some(pricing) = record.pricing.as_mut() {
            for tier in pricing.tiers.values_mut() {
                tier.description = sanitizer.sanitize(&tier.description);
            }
        }
        for step in &mut record.steps {
            step.description = sanitizer.sanitize(&step.description);
        }
        for faq in &mut record.faqs {
            faq.answer = sanitizer.sanitize(&faq.answer);
        }

        let featured_image = record.assets.featured_image().map(str::to_string);
        RenderedContent {
            content: record,
            featured_image,
        }
    }

    /// Validate a draft and dry-run tier normalization.
    ///
    /// Returns the raw pricing to normalize later, `None` for kinds without
    /// pricing.
    fn check(draft: &Draft) -> Result<Option<Pricing>, PublishError> {
        let errors = draft.validation_errors();
        if !errors.is_empty() {
            return Err(PublishError::Validation(errors));
        }

        if !draft.kind.has_pricing() {
            return Ok(None);
        }

        normalize(&draft.tiers, draft.tier_cardinality).map_err(tier_errors)?;
        Ok(Some(Pricing {
            tier_cardinality: draft.tier_cardinality,
            tiers: draft.tiers.clone(),
        }))
    }
}

impl fmt::Debug for PublishService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishService")
            .field("uploader", &self.inner.uploader)
            .field("resolver", &self.inner.resolver)
            .field("max_publish_attempts", &self.inner.max_publish_attempts)
            .finish()
    }
}

fn tier_errors(errors: Vec<crate::content::tiers::TierError>) -> PublishError {
    PublishError::Validation(errors.iter().map(|e| e.to_validation()).collect())
}

/// Lift store-level `NotFound` to the pipeline's own variant.
fn not_found_or(error: StoreError) -> PublishError {
    match error {
        StoreError::NotFound(slug) => PublishError::NotFound(slug),
        other => PublishError::Persistence(other),
    }
}

/// Kept assets first, then the newly uploaded ones, per class.
fn merge_assets(existing: &Assets, outcome: &UploadOutcome) -> Assets {
    Assets {
        images: existing
            .images
            .iter()
            .chain(&outcome.images)
            .cloned()
            .collect(),
        documents: existing
            .documents
            .iter()
            .chain(&outcome.documents)
            .cloned()
            .collect(),
    }
}

fn report_upload_failures(title: &str, outcome: &UploadOutcome) {
    for failure in &outcome.failures {
        warn!(
            title = %title,
            class = ?failure.class,
            index = failure.index,
            filename = %failure.filename,
            error = %failure.error,
            "asset upload failed"
        );
    }
}

fn build_record(
    draft: Draft,
    slug: String,
    pricing: Option<Pricing>,
    assets: Assets,
    created: i64,
    changed: i64,
) -> PublishableContent {
    PublishableContent {
        slug,
        title: draft.title.trim().to_string(),
        kind: draft.kind,
        category: draft.category,
        tags: draft.tags,
        summary: draft.summary,
        body: draft.body,
        pricing,
        steps: draft.steps,
        faqs: draft.faqs,
        requirements: draft.requirements,
        assets,
        status: draft.status,
        featured: draft.featured,
        author_id: draft.author_id,
        created,
        changed,
    }
}
