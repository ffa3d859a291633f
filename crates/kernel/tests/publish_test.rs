#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Publish pipeline tests.
//!
//! Drive the REAL `PublishService` over in-memory backends: slug resolution,
//! tier normalization, best-effort uploads and the record lifecycle.

use std::sync::Arc;

use showcase_kernel::PipelineConfig;
use showcase_kernel::content::{ListQuery, PublishService};
use showcase_kernel::error::{PublishError, StoreError};
use showcase_kernel::file::AssetClass;
use showcase_kernel::models::{Category, ContentKind, ContentStatus, TierCardinality, TierName};
use showcase_test_utils::{
    MemoryContentStore, MemoryFileStorage, pdf, png, post_draft, service_draft, tier,
    triple_service_draft,
};

mod common;
use common::{pipeline_config, publisher};

fn backends() -> (Arc<MemoryContentStore>, Arc<MemoryFileStorage>) {
    (
        Arc::new(MemoryContentStore::new()),
        Arc::new(MemoryFileStorage::new()),
    )
}

// =============================================================================
// Publish
// =============================================================================

#[tokio::test]
async fn publish_single_tier_service() {
    let (store, storage) = backends();
    let service = publisher(store.clone(), storage);

    let report = service
        .publish(service_draft("SEO Audit & Report!!"))
        .await
        .unwrap();

    let content = &report.content;
    assert_eq!(content.slug, "seo-audit-report");
    assert_eq!(content.status, ContentStatus::Published);

    // Draft seeds all three tiers; single cardinality keeps only starter
    let pricing = content.pricing.as_ref().unwrap();
    assert_eq!(pricing.tier_cardinality, TierCardinality::Single);
    assert_eq!(
        pricing.tiers.keys().copied().collect::<Vec<_>>(),
        vec![TierName::Starter]
    );

    assert!(report.upload_failures.is_empty());
    assert_eq!(store.slugs(), vec!["seo-audit-report"]);
}

#[tokio::test]
async fn same_title_gets_suffixed_slug() {
    let (store, storage) = backends();
    let service = publisher(store.clone(), storage);

    let first = service.publish(service_draft("Launch Package")).await.unwrap();
    let second = service.publish(service_draft("Launch Package")).await.unwrap();

    assert_eq!(first.content.slug, "launch-package");
    assert_eq!(second.content.slug, "launch-package-1");
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn collisions_probe_at_most_n_plus_one() {
    let (store, storage) = backends();
    let service = publisher(store.clone(), storage);

    for _ in 0..4 {
        service.publish(service_draft("Brand Kit")).await.unwrap();
    }

    store.reset_probes();
    let report = service.publish(service_draft("Brand Kit")).await.unwrap();

    assert_eq!(report.content.slug, "brand-kit-4");
    assert!(store.probe_count() <= 5, "probed {} times", store.probe_count());
}

#[tokio::test]
async fn missing_advanced_tier_is_rejected_before_side_effects() {
    let (store, storage) = backends();
    let service = publisher(store.clone(), storage.clone());

    let mut draft = triple_service_draft("Growth Plan");
    draft.tiers.remove(&TierName::Advanced);
    draft.pending.images.push(png("cover.png"));

    let err = service.publish(draft).await.unwrap_err();

    let PublishError::Validation(errors) = &err else {
        panic!("expected validation error, got {err:?}");
    };
    assert!(
        errors.iter().any(|e| e.field.as_deref() == Some("tiers.advanced")),
        "errors: {errors:?}"
    );
    assert!(err.to_string().contains("advanced"));

    assert!(store.is_empty());
    assert_eq!(store.probe_count(), 0);
    assert_eq!(storage.stored(), 0);
}

#[tokio::test]
async fn blank_advanced_tier_counts_as_missing() {
    let (store, storage) = backends();
    let service = publisher(store.clone(), storage);

    let mut draft = service_draft("Growth Plan");
    draft.tier_cardinality = TierCardinality::Triple;
    draft.tiers.insert(TierName::Standard, tier("Standard", 100));
    // Advanced stays as the blank seed

    let err = service.publish(draft).await.unwrap_err();
    assert_eq!(err.validation_errors().len(), 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn triple_tier_service_keeps_all_three() {
    let (store, storage) = backends();
    let service = publisher(store, storage);

    let report = service
        .publish(triple_service_draft("Full Stack Build"))
        .await
        .unwrap();

    let pricing = report.content.pricing.unwrap();
    assert_eq!(pricing.tiers.len(), 3);
    assert_eq!(pricing.tiers[&TierName::Advanced].title, "Premium");
}

#[tokio::test]
async fn punctuation_title_fails_validation() {
    let (store, storage) = backends();
    let service = publisher(store.clone(), storage);

    let err = service.publish(service_draft("!!! ???")).await.unwrap_err();

    assert_eq!(err.validation_errors()[0].field.as_deref(), Some("title"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn unknown_feature_key_rejected() {
    let (store, storage) = backends();
    let service = publisher(store.clone(), storage);

    let mut draft = service_draft("Keyword Sprint");
    draft.category = Category::Seo;
    let starter = tier("Basic", 50);
    draft.tiers.insert(
        TierName::Starter,
        showcase_kernel::models::Tier {
            features: starter.features.with("keyword_research", true).with("drone_footage", true),
            ..starter
        },
    );

    let err = service.publish(draft).await.unwrap_err();
    let errors = err.validation_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("drone_footage"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn posts_persist_without_pricing() {
    let (store, storage) = backends();
    let service = publisher(store, storage);

    let report = service.publish(post_draft("Hello World")).await.unwrap();

    assert_eq!(report.content.kind, ContentKind::Post);
    assert!(report.content.pricing.is_none());
}

// =============================================================================
// Assets
// =============================================================================

#[tokio::test]
async fn failed_image_does_not_block_publish() {
    let store = Arc::new(MemoryContentStore::new());
    let storage = Arc::new(MemoryFileStorage::new().fail_on("two.png"));
    let service = publisher(store.clone(), storage.clone());

    let mut draft = service_draft("Logo Design");
    draft.pending.images = vec![png("one.png"), png("two.png"), png("three.png")];
    draft.pending.documents = vec![pdf("brief.pdf")];

    let report = service.publish(draft).await.unwrap();

    let images = &report.content.assets.images;
    assert_eq!(images.len(), 2);
    assert!(images[0].ends_with("/one.png"));
    assert!(images[1].ends_with("/three.png"));
    assert!(storage.contains_url(&images[0]));
    assert_eq!(report.content.assets.documents.len(), 1);

    assert_eq!(report.upload_failures.len(), 1);
    let failure = &report.upload_failures[0];
    assert_eq!(failure.class, AssetClass::Image);
    assert_eq!(failure.index, 1);
    assert_eq!(failure.filename, "two.png");

    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn upload_order_survives_many_files() {
    let (store, storage) = backends();
    let service = publisher(store, storage);

    let names: Vec<String> = (0..12).map(|i| format!("shot-{i:02}.png")).collect();
    let mut draft = post_draft("Gallery");
    draft.pending.images = names.iter().map(|n| png(n)).collect();

    let report = service.publish(draft).await.unwrap();

    let uploaded: Vec<&str> = report
        .content
        .assets
        .images
        .iter()
        .map(|url| url.rsplit('/').next().unwrap())
        .collect();
    assert_eq!(uploaded, names.iter().map(String::as_str).collect::<Vec<_>>());
}

#[tokio::test]
async fn stalled_and_rejected_uploads_are_failures() {
    let store = Arc::new(MemoryContentStore::new());
    let storage = Arc::new(MemoryFileStorage::new().stall_on("slow.png"));
    let service = publisher(store, storage);

    let mut draft = post_draft("Case Study");
    draft.pending.images = vec![png("slow.png"), pdf("not-an-image.pdf"), png("ok.png")];

    let report = service.publish(draft).await.unwrap();

    assert_eq!(report.content.assets.images.len(), 1);
    assert!(report.content.assets.images[0].ends_with("/ok.png"));

    let failures = &report.upload_failures;
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].index, 0);
    assert!(failures[0].error.contains("timed out"), "{}", failures[0].error);
    assert_eq!(failures[1].index, 1);
    assert!(failures[1].error.contains("not allowed"), "{}", failures[1].error);
}

// =============================================================================
// Races and caps
// =============================================================================

#[tokio::test]
async fn slug_claimed_between_probe_and_insert_is_retried() {
    // The first probe misses the seeded record, so the first insert collides
    let store = Arc::new(MemoryContentStore::new().with_stale_probes(1));
    store.seed(seed_record("launch-package"));
    let service = publisher(store.clone(), Arc::new(MemoryFileStorage::new()));

    let report = service.publish(service_draft("Launch Package")).await.unwrap();

    assert_eq!(report.content.slug, "launch-package-1");
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn concurrent_publishes_get_distinct_slugs() {
    let (store, storage) = backends();
    let service = publisher(store.clone(), storage);

    let (a, b, c) = tokio::join!(
        service.publish(service_draft("Launch Package")),
        service.publish(service_draft("Launch Package")),
        service.publish(service_draft("Launch Package")),
    );

    let mut slugs = vec![
        a.unwrap().content.slug,
        b.unwrap().content.slug,
        c.unwrap().content.slug,
    ];
    slugs.sort();
    assert_eq!(
        slugs,
        vec!["launch-package", "launch-package-1", "launch-package-2"]
    );
}

#[tokio::test]
async fn probe_cap_surfaces_exhaustion() {
    let store = Arc::new(MemoryContentStore::new());
    let config = PipelineConfig {
        max_probes: 3,
        ..pipeline_config()
    };
    let service = PublishService::new(store.clone(), Arc::new(MemoryFileStorage::new()), &config);

    for _ in 0..3 {
        service.publish(service_draft("Audit")).await.unwrap();
    }

    let err = service.publish(service_draft("Audit")).await.unwrap_err();
    match err {
        PublishError::SlugCollisionExhausted { base, attempts } => {
            assert_eq!(base, "audit");
            assert_eq!(attempts, 3);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn insert_retries_are_capped() {
    // Every probe misses, so every insert collides with the seeded record
    let store = Arc::new(MemoryContentStore::new().with_stale_probes(1000));
    store.seed(seed_record("audit"));
    let service = publisher(store.clone(), Arc::new(MemoryFileStorage::new()));

    let err = service.publish(service_draft("Audit")).await.unwrap_err();

    assert!(matches!(
        err,
        PublishError::SlugCollisionExhausted { attempts: 5, .. }
    ));
    assert_eq!(store.len(), 1);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn update_never_changes_slug() {
    let (store, storage) = backends();
    let service = publisher(store.clone(), storage);

    let mut draft = service_draft("Launch Package");
    draft.pending.images = vec![png("a.png")];
    let original = service.publish(draft).await.unwrap().content;

    let mut edit = service_draft("Launch Package Deluxe");
    edit.existing_assets = original.assets.clone();
    edit.pending.images = vec![png("b.png")];
    let report = service.update("launch-package", edit).await.unwrap();

    let updated = report.content;
    assert_eq!(updated.slug, "launch-package");
    assert_eq!(updated.title, "Launch Package Deluxe");
    assert_eq!(updated.created, original.created);
    assert_eq!(updated.assets.images.len(), 2);
    assert_eq!(updated.assets.images[0], original.assets.images[0]);
    assert!(updated.assets.images[1].ends_with("/b.png"));
    assert_eq!(store.slugs(), vec!["launch-package"]);
}

#[tokio::test]
async fn update_missing_record_is_not_found() {
    let (store, storage) = backends();
    let service = publisher(store, storage);

    let err = service
        .update("nope", service_draft("Anything"))
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::NotFound(slug) if slug == "nope"));
}

#[tokio::test]
async fn invalid_update_fails_validation_before_lookup() {
    let (store, storage) = backends();
    let service = publisher(store, storage.clone());

    let mut draft = service_draft("Anything");
    draft.terms_accepted = false;
    draft.pending.images = vec![png("a.png")];

    let err = service.update("missing", draft).await.unwrap_err();
    assert!(matches!(err, PublishError::Validation(_)));
    assert_eq!(
        err.validation_errors()[0].field.as_deref(),
        Some("terms_accepted")
    );
    assert_eq!(storage.stored(), 0);
}

#[tokio::test]
async fn rename_to_own_resolution_keeps_slug() {
    let (store, storage) = backends();
    let service = publisher(store.clone(), storage);

    service.publish(service_draft("Starter Kit")).await.unwrap();
    service.publish(service_draft("Starter Kit")).await.unwrap();

    // "starter-kit" belongs to the other record; "starter-kit-1" is already ours
    let same = service
        .rename("starter-kit-1", "Starter Kit")
        .await
        .unwrap();
    assert_eq!(same.slug, "starter-kit-1");
    assert_eq!(store.slugs(), vec!["starter-kit", "starter-kit-1"]);
}

#[tokio::test]
async fn rename_moves_record() {
    let (store, storage) = backends();
    let service = publisher(store.clone(), storage);

    service.publish(service_draft("Launch Package")).await.unwrap();
    service.publish(service_draft("Starter Kit")).await.unwrap();

    let renamed = service
        .rename("launch-package", "Rocket Launch")
        .await
        .unwrap();
    assert_eq!(renamed.slug, "rocket-launch");
    assert!(matches!(
        service.get("launch-package").await,
        Err(PublishError::NotFound(_))
    ));

    // Taken target gets a suffix
    let renamed = service.rename("rocket-launch", "starter-kit").await.unwrap();
    assert_eq!(renamed.slug, "starter-kit-1");

    // Current slug is a no-op
    let same = service.rename("starter-kit-1", "starter-kit-1").await.unwrap();
    assert_eq!(same.slug, "starter-kit-1");

    let err = service.rename("starter-kit-1", "***").await.unwrap_err();
    assert_eq!(err.validation_errors()[0].field.as_deref(), Some("slug"));

    let err = service.rename("missing", "whatever").await.unwrap_err();
    assert!(matches!(err, PublishError::NotFound(_)));
}

#[tokio::test]
async fn render_hides_unpublished() {
    let (store, storage) = backends();
    let service = publisher(store, storage);

    let mut draft = post_draft("Work In Progress");
    draft.status = ContentStatus::Draft;
    service.publish(draft).await.unwrap();

    assert!(matches!(
        service.render("work-in-progress").await,
        Err(PublishError::NotFound(_))
    ));
    // The raw record is still reachable
    assert_eq!(
        service.get("work-in-progress").await.unwrap().status,
        ContentStatus::Draft
    );

    service
        .set_status("work-in-progress", ContentStatus::Published)
        .await
        .unwrap();
    assert!(service.render("work-in-progress").await.is_ok());

    service
        .set_status("work-in-progress", ContentStatus::Archived)
        .await
        .unwrap();
    assert!(service.render("work-in-progress").await.is_err());
}

#[tokio::test]
async fn render_sanitizes_rich_text() {
    let (store, storage) = backends();
    let service = publisher(store.clone(), storage);

    let mut draft = service_draft("Landing Page");
    draft.body = r#"<p>Hi</p><script>steal()</script><a href="https://x.test" target="_blank">x</a>"#
        .to_string();
    draft.pending.images = vec![png("hero.png"), png("second.png")];
    service.publish(draft).await.unwrap();

    let rendered = service.render("landing-page").await.unwrap();
    assert!(!rendered.content.body.contains("script"));
    assert!(rendered.content.body.contains(r#"rel="noopener noreferrer""#));
    assert!(rendered.featured_image.unwrap().ends_with("/hero.png"));

    // Stored as supplied
    let stored = service.get("landing-page").await.unwrap();
    assert!(stored.body.contains("<script>"));
}

#[tokio::test]
async fn list_orders_featured_first() {
    let (store, storage) = backends();
    let service = publisher(store, storage);

    service.publish(post_draft("Plain Post")).await.unwrap();
    let mut featured = service_draft("Featured Service");
    featured.featured = true;
    service.publish(featured).await.unwrap();
    let mut hidden = post_draft("Hidden Post");
    hidden.status = ContentStatus::Draft;
    service.publish(hidden).await.unwrap();

    let listed = service.list(ListQuery::published()).await.unwrap();
    let slugs: Vec<&str> = listed.iter().map(|r| r.content.slug.as_str()).collect();
    assert_eq!(slugs, vec!["featured-service", "plain-post"]);

    let posts = service
        .list(ListQuery::published().kind(ContentKind::Post))
        .await
        .unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].content.slug, "plain-post");
}

#[tokio::test]
async fn delete_removes_record() {
    let (store, storage) = backends();
    let service = publisher(store.clone(), storage);

    service.publish(post_draft("Short Lived")).await.unwrap();
    service.delete("short-lived").await.unwrap();

    assert!(store.is_empty());
    assert!(matches!(
        service.delete("short-lived").await,
        Err(PublishError::NotFound(_))
    ));
}

#[tokio::test]
async fn set_status_on_missing_record() {
    let (store, storage) = backends();
    let service = publisher(store, storage);

    let err = service
        .set_status("ghost", ContentStatus::Archived)
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::NotFound(_)));
    assert!(!matches!(
        err,
        PublishError::Persistence(StoreError::NotFound(_))
    ));
}

fn seed_record(slug: &str) -> showcase_kernel::models::PublishableContent {
    showcase_kernel::models::PublishableContent {
        slug: slug.to_string(),
        title: "Seeded".to_string(),
        kind: ContentKind::Post,
        category: Category::Other,
        tags: Vec::new(),
        summary: String::new(),
        body: String::new(),
        pricing: None,
        steps: Vec::new(),
        faqs: Vec::new(),
        requirements: Vec::new(),
        assets: Default::default(),
        status: ContentStatus::Published,
        featured: false,
        author_id: "seed".to_string(),
        created: 0,
        changed: 0,
    }
}
