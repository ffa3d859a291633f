//! Slug derivation and uniqueness resolution.
//!
//! The base transform is pure; uniqueness is established by probing the
//! content store with one point lookup per candidate. The store's unique
//! constraint remains the final arbiter, so callers must be ready to resolve
//! again when an insert reports the slug as taken.

use tracing::debug;

use crate::content::store::ContentStore;
use crate::error::PublishError;

/// Longest base slug kept before truncation.
pub const MAX_SLUG_LEN: usize = 128;

/// Default cap on candidates probed for one base slug.
pub const DEFAULT_MAX_PROBES: u32 = 100;

/// Convert a title into its base slug.
///
/// Lowercases, strips every character outside `[a-z0-9\s-]`, turns runs of
/// whitespace and hyphens into a single hyphen, and trims hyphens from both
/// ends. Re-running the transform on its own output is a no-op.
pub fn base_slug(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_hyphen = false;

    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            // Leading separators are dropped by never emitting into an empty slug
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c == '-' || c.is_whitespace() {
            pending_hyphen = true;
        }
    }

    truncate_slug(slug)
}

/// Cut an over-long slug at the last hyphen inside the limit.
fn truncate_slug(slug: String) -> String {
    if slug.len() <= MAX_SLUG_LEN {
        return slug;
    }

    // Only ASCII reaches this point, so every index is a char boundary
    let truncated = &slug[..MAX_SLUG_LEN];
    match truncated.rfind('-') {
        Some(last_hyphen) if last_hyphen > 0 => truncated[..last_hyphen].to_string(),
        _ => truncated.to_string(),
    }
}

/// Resolves titles into slugs unused in the content store.
#[derive(Debug, Clone, Copy)]
pub struct SlugResolver {
    max_probes: u32,
}

impl SlugResolver {
    pub fn new(max_probes: u32) -> Self {
        Self {
            max_probes: max_probes.max(1),
        }
    }

    pub fn max_probes(&self) -> u32 {
        self.max_probes
    }

    /// Resolve a title into a slug unused at the moment of resolution.
    ///
    /// Fails validation when the title strips to nothing.
    pub async fn resolve(
        &self,
        store: &dyn ContentStore,
        title: &str,
    ) -> Result<String, PublishError> {
        let base = base_slug(title);
        if base.is_empty() {
            return Err(PublishError::invalid(
                "title",
                "title must contain at least one letter or digit",
            ));
        }
        self.resolve_base(store, &base).await
    }

    /// Resolve an explicitly requested slug, as used by rename.
    ///
    /// `own` is the renamed record's current slug, which is never treated as
    /// taken.
    pub async fn resolve_explicit(
        &self,
        store: &dyn ContentStore,
        requested: &str,
        own: Option<&str>,
    ) -> Result<String, PublishError> {
        let base = base_slug(requested);
        if base.is_empty() {
            return Err(PublishError::invalid(
                "slug",
                "slug must contain at least one letter or digit",
            ));
        }
        self.probe(store, &base, own).await
    }

    /// Probe `base`, `base-1`, `base-2`, ... until one is free.
    ///
    /// With `n` taken candidates this performs exactly `n + 1` lookups.
    pub async fn resolve_base(
        &self,
        store: &dyn ContentStore,
        base: &str,
    ) -> Result<String, PublishError> {
        self.probe(store, base, None).await
    }

    async fn probe(
        &self,
        store: &dyn ContentStore,
        base: &str,
        own: Option<&str>,
    ) -> Result<String, PublishError> {
        for attempt in 0..self.max_probes {
            let candidate = if attempt == 0 {
                base.to_string()
            } else {
                format!("{base}-{attempt}")
            };

            if own == Some(candidate.as_str()) || !store.exists(&candidate).await? {
                debug!(base = %base, slug = %candidate, probes = attempt + 1, "slug resolved");
                return Ok(candidate);
            }
        }

        Err(PublishError::SlugCollisionExhausted {
            base: base.to_string(),
            attempts: self.max_probes,
        })
    }
}

impl Default for SlugResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PROBES)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base_slug_basic() {
        assert_eq!(base_slug("Hello World"), "hello-world");
        assert_eq!(base_slug("Launch Package"), "launch-package");
    }

    #[test]
    fn test_base_slug_strips_punctuation() {
        assert_eq!(base_slug("SEO Audit & Report!!"), "seo-audit-report");
        assert_eq!(base_slug("What's New?"), "whats-new");
        assert_eq!(base_slug("Item #42: The Answer"), "item-42-the-answer");
    }

    #[test]
    fn test_base_slug_collapses_separators() {
        assert_eq!(base_slug("hello   world"), "hello-world");
        assert_eq!(base_slug("a---b"), "a-b");
        assert_eq!(base_slug("a - b"), "a-b");
        assert_eq!(base_slug("tabs\tand\nnewlines"), "tabs-and-newlines");
    }

    #[test]
    fn test_base_slug_trims() {
        assert_eq!(base_slug("  hello  "), "hello");
        assert_eq!(base_slug("---hello---"), "hello");
    }

    #[test]
    fn test_base_slug_empty() {
        assert_eq!(base_slug(""), "");
        assert_eq!(base_slug("---"), "");
        assert_eq!(base_slug("!!! ???"), "");
        assert_eq!(base_slug("日本語"), "");
    }

    #[test]
    fn test_base_slug_long_text() {
        let words = vec!["content"; 40].join(" ");
        let slug = base_slug(&words);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));

        let unbroken = "a".repeat(200);
        assert_eq!(base_slug(&unbroken).len(), MAX_SLUG_LEN);
    }

    #[test]
    fn test_base_slug_idempotent() {
        let long = vec!["word"; 60].join(" ");
        let titles: [&str; 6] = [
            "SEO Audit & Report!!",
            "  Launch   Package -- 2026 ",
            "Ünïcödé Títle with àccents",
            "already-a-slug",
            "---",
            long.as_str(),
        ];
        for title in titles {
            let once = base_slug(title);
            assert_eq!(base_slug(&once), once, "not idempotent for {title:?}");
        }
    }
}
