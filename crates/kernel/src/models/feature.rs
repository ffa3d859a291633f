//! Content categories and their tier feature domains.
//!
//! Each category enumerates the feature names its pricing tiers may toggle.
//! Keys outside that domain are rejected when a draft is validated.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum length of a free-form feature key (category `other`).
const MAX_FEATURE_KEY_LEN: usize = 64;

/// Agency offering category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    WebDevelopment,
    Seo,
    SocialMedia,
    ContentWriting,
    GraphicDesign,
    VideoProduction,
    #[default]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::WebDevelopment => "web_development",
            Category::Seo => "seo",
            Category::SocialMedia => "social_media",
            Category::ContentWriting => "content_writing",
            Category::GraphicDesign => "graphic_design",
            Category::VideoProduction => "video_production",
            Category::Other => "other",
        }
    }

    /// Feature names valid for tiers in this category.
    ///
    /// `None` means the category accepts any well-formed key.
    pub fn features(&self) -> Option<&'static [&'static str]> {
        match self {
            Category::WebDevelopment => Some(&[
                "responsive_design",
                "source_code",
                "cms_integration",
                "ecommerce",
                "hosting_setup",
                "speed_optimization",
            ]),
            Category::Seo => Some(&[
                "keyword_research",
                "on_page_audit",
                "technical_audit",
                "backlink_analysis",
                "competitor_analysis",
                "monthly_report",
            ]),
            Category::SocialMedia => Some(&[
                "content_calendar",
                "post_design",
                "community_management",
                "paid_ads",
                "analytics_report",
            ]),
            Category::ContentWriting => Some(&[
                "topic_research",
                "seo_optimization",
                "proofreading",
                "images_included",
                "plagiarism_report",
            ]),
            Category::GraphicDesign => Some(&[
                "source_files",
                "vector_file",
                "print_ready",
                "mockup",
                "brand_guide",
            ]),
            Category::VideoProduction => Some(&[
                "script_writing",
                "voice_over",
                "background_music",
                "subtitles",
                "color_grading",
            ]),
            Category::Other => None,
        }
    }

    /// Check whether a feature key belongs to this category's domain.
    pub fn accepts_feature(&self, key: &str) -> bool {
        match self.features() {
            Some(known) => known.contains(&key),
            None => is_valid_feature_key(key),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Free-form keys must look like machine names: `[a-z0-9_]{1,64}`.
fn is_valid_feature_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_FEATURE_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Feature toggles of one pricing tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(BTreeMap<String, bool>);

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy with `key` set to `enabled`.
    pub fn with(&self, key: impl Into<String>, enabled: bool) -> Self {
        let mut features = self.0.clone();
        features.insert(key.into(), enabled);
        Self(features)
    }

    /// Return a copy with `key` flipped (absent keys become enabled).
    pub fn toggled(&self, key: &str) -> Self {
        let enabled = !self.is_enabled(key);
        self.with(key, enabled)
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        self.0.get(key).copied().unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys not in the category's feature domain.
    pub fn unknown_keys(&self, category: Category) -> Vec<&str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|k| !category.accepts_feature(k))
            .collect()
    }
}

impl FromIterator<(String, bool)> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
