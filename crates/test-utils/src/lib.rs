//! Showcase test utilities.
//!
//! In-memory backends for the content store and object store, plus draft
//! fixtures, so the publish pipeline can be exercised without PostgreSQL.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use parking_lot::RwLock;

use showcase_kernel::content::{ContentStore, Draft, ListQuery};
use showcase_kernel::error::StoreError;
use showcase_kernel::file::{FileStorage, PendingAttachment};
use showcase_kernel::models::{
    ContentKind, ContentStatus, PublishableContent, Tier, TierCardinality, TierName,
};

/// Content store backed by a map, with probe accounting.
#[derive(Default)]
pub struct MemoryContentStore {
    records: RwLock<BTreeMap<String, PublishableContent>>,
    probes: AtomicUsize,
    /// Upcoming `exists` calls that report every slug as free.
    stale_probes: AtomicUsize,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` probes miss existing records, as if another writer
    /// claimed the slug between probe and insert.
    pub fn with_stale_probes(self, n: usize) -> Self {
        self.stale_probes.store(n, Ordering::SeqCst);
        self
    }

    /// Seed a record directly, bypassing the pipeline.
    pub fn seed(&self, record: PublishableContent) {
        self.records.write().insert(record.slug.clone(), record);
    }

    /// Number of `exists` calls made so far.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn reset_probes(&self) {
        self.probes.store(0, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn slugs(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }

    fn take_stale_probe(&self) -> bool {
        self.stale_probes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn exists(&self, slug: &str) -> Result<bool, StoreError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.take_stale_probe() {
            return Ok(false);
        }
        Ok(self.records.read().contains_key(slug))
    }

    async fn find(&self, slug: &str) -> Result<Option<PublishableContent>, StoreError> {
        Ok(self.records.read().get(slug).cloned())
    }

    async fn insert(&self, record: &PublishableContent) -> Result<(), StoreError> {
        let mut records = self.records.write();
        if records.contains_key(&record.slug) {
            return Err(StoreError::SlugTaken(record.slug.clone()));
        }
        records.insert(record.slug.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &PublishableContent) -> Result<(), StoreError> {
        let mut records = self.records.write();
        match records.get_mut(&record.slug) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(record.slug.clone())),
        }
    }

    async fn rename(
        &self,
        from: &str,
        to: &str,
        changed: i64,
    ) -> Result<PublishableContent, StoreError> {
        let mut records = self.records.write();
        if records.contains_key(to) {
            return Err(StoreError::SlugTaken(to.to_string()));
        }
        let mut record = records
            .remove(from)
            .ok_or_else(|| StoreError::NotFound(from.to_string()))?;
        record.slug = to.to_string();
        record.changed = changed;
        records.insert(to.to_string(), record.clone());
        Ok(record)
    }

    async fn set_status(
        &self,
        slug: &str,
        status: ContentStatus,
        changed: i64,
    ) -> Result<PublishableContent, StoreError> {
        let mut records = self.records.write();
        let record = records
            .get_mut(slug)
            .ok_or_else(|| StoreError::NotFound(slug.to_string()))?;
        record.status = status;
        record.changed = changed;
        Ok(record.clone())
    }

    async fn delete(&self, slug: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().remove(slug).is_some())
    }

    async fn list(&self, query: &ListQuery) -> Result<Vec<PublishableContent>, StoreError> {
        let mut matching: Vec<PublishableContent> = self
            .records
            .read()
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            b.featured
                .cmp(&a.featured)
                .then(b.created.cmp(&a.created))
                .then(a.slug.cmp(&b.slug))
        });

        Ok(matching
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(0))
            .take(usize::try_from(query.limit).unwrap_or(0))
            .collect())
    }

    async fn ping(&self) -> bool {
        true
    }
}

/// Object store kept in memory, with scripted failures.
pub struct MemoryFileStorage {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
    failing: RwLock<HashSet<String>>,
    stalling: RwLock<HashSet<String>>,
    next_id: AtomicU64,
    base_url: String,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
            failing: RwLock::new(HashSet::new()),
            stalling: RwLock::new(HashSet::new()),
            next_id: AtomicU64::new(1),
            base_url: "https://cdn.test".to_string(),
        }
    }

    /// Writes of `filename` fail with a storage error.
    pub fn fail_on(self, filename: &str) -> Self {
        self.failing.write().insert(filename.to_string());
        self
    }

    /// Writes of `filename` never complete.
    pub fn stall_on(self, filename: &str) -> Self {
        self.stalling.write().insert(filename.to_string());
        self
    }

    /// Number of stored objects.
    pub fn stored(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn contains_url(&self, url: &str) -> bool {
        let Some(path) = url.strip_prefix(&format!("{}/", self.base_url)) else {
            return false;
        };
        self.blobs.read().contains_key(&format!("mem://{path}"))
    }
}

impl Default for MemoryFileStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// The original filename encoded in a `mem://<id>/<filename>` URI.
fn filename_of(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn write(&self, uri: &str, data: &[u8]) -> anyhow::Result<()> {
        let filename = filename_of(uri).to_string();

        let stall = self.stalling.read().contains(&filename);
        let fail = self.failing.read().contains(&filename);

        if stall {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if fail {
            bail!("simulated storage failure for {filename}");
        }

        self.blobs.write().insert(uri.to_string(), data.to_vec());
        Ok(())
    }

    async fn delete(&self, uri: &str) -> anyhow::Result<()> {
        self.blobs.write().remove(uri);
        Ok(())
    }

    fn generate_uri(&self, filename: &str) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        format!("mem://{id}/{filename}")
    }

    fn public_url(&self, uri: &str) -> String {
        let path = uri.strip_prefix("mem://").unwrap_or(uri);
        format!("{}/{path}", self.base_url)
    }

    fn scheme(&self) -> &'static str {
        "mem"
    }
}

/// A publishable single-tier service draft.
pub fn service_draft(title: &str) -> Draft {
    let mut draft = Draft::new(ContentKind::Service, "author-1");
    draft.title = title.to_string();
    draft.terms_accepted = true;
    draft.status = ContentStatus::Published;
    draft.tiers.insert(TierName::Starter, tier("Basic", 50));
    draft
}

/// A publishable three-tier service draft.
pub fn triple_service_draft(title: &str) -> Draft {
    let mut draft = service_draft(title);
    draft.tier_cardinality = TierCardinality::Triple;
    draft.tiers.insert(TierName::Standard, tier("Standard", 120));
    draft.tiers.insert(TierName::Advanced, tier("Premium", 300));
    draft
}

/// A publishable blog post draft.
pub fn post_draft(title: &str) -> Draft {
    let mut draft = Draft::new(ContentKind::Post, "author-1");
    draft.title = title.to_string();
    draft.terms_accepted = true;
    draft.status = ContentStatus::Published;
    draft.body = "<p>Hello</p>".to_string();
    draft
}

/// A populated tier.
pub fn tier(title: &str, price: u32) -> Tier {
    Tier {
        title: title.to_string(),
        description: format!("{title} package"),
        delivery_days: 3,
        revisions: 1,
        price,
        ..Tier::blank()
    }
}

/// A small PNG attachment.
pub fn png(filename: &str) -> PendingAttachment {
    PendingAttachment::new(filename, "image/png", vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a])
}

/// A small PDF attachment.
pub fn pdf(filename: &str) -> PendingAttachment {
    PendingAttachment::new(filename, "application/pdf", b"%PDF-1.7".to_vec())
}
