//! Publishable content record.
//!
//! A `PublishableContent` is the persisted form of a service, portfolio case
//! study, or blog post. It is stored as one flat document keyed by slug.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::feature::{Category, FeatureSet};

/// Kind of publishable content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// A purchasable service with pricing tiers.
    #[default]
    Service,
    /// A portfolio case study.
    Portfolio,
    /// A blog post.
    Post,
}

impl ContentKind {
    /// Machine name used in storage and query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Service => "service",
            ContentKind::Portfolio => "portfolio",
            ContentKind::Post => "post",
        }
    }

    /// Whether this kind carries pricing tiers.
    pub fn has_pricing(&self) -> bool {
        matches!(self, ContentKind::Service)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service" => Ok(ContentKind::Service),
            "portfolio" => Ok(ContentKind::Portfolio),
            "post" => Ok(ContentKind::Post),
            other => Err(format!("unknown content kind: {other}")),
        }
    }
}

/// Lifecycle status controlling visibility to the render path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Published => "published",
            ContentStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ContentStatus::Draft),
            "published" => Ok(ContentStatus::Published),
            "archived" => Ok(ContentStatus::Archived),
            other => Err(format!("unknown content status: {other}")),
        }
    }
}

/// How many pricing tiers a service offers at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierCardinality {
    /// Only the `starter` tier.
    #[default]
    Single,
    /// `starter`, `standard` and `advanced`.
    Triple,
}

impl TierCardinality {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierCardinality::Single => "single",
            TierCardinality::Triple => "triple",
        }
    }

    /// Tier names that must exist for this cardinality, in display order.
    pub fn required_tiers(&self) -> &'static [TierName] {
        match self {
            TierCardinality::Single => &[TierName::Starter],
            TierCardinality::Triple => &[TierName::Starter, TierName::Standard, TierName::Advanced],
        }
    }
}

impl fmt::Display for TierCardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of a pricing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierName {
    Starter,
    Standard,
    Advanced,
}

impl TierName {
    pub const ALL: [TierName; 3] = [TierName::Starter, TierName::Standard, TierName::Advanced];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierName::Starter => "starter",
            TierName::Standard => "standard",
            TierName::Advanced => "advanced",
        }
    }
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One purchasable package within a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Delivery time in days (at least 1).
    pub delivery_days: u32,

    #[serde(default)]
    pub revisions: u32,

    /// Price in whole currency units.
    pub price: u32,

    #[serde(default)]
    pub features: FeatureSet,
}

impl Tier {
    /// A blank tier used to pre-seed new drafts.
    pub fn blank() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            delivery_days: 1,
            revisions: 0,
            price: 0,
            features: FeatureSet::default(),
        }
    }

    /// A tier counts as populated once the author has given it a title.
    pub fn is_populated(&self) -> bool {
        !self.title.trim().is_empty()
    }
}

impl Default for Tier {
    fn default() -> Self {
        Self::blank()
    }
}

/// Tier name to tier mapping.
pub type TierMap = BTreeMap<TierName, Tier>;

/// Normalized pricing of a persisted service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub tier_cardinality: TierCardinality,
    pub tiers: TierMap,
}

/// One step of the delivery process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// A frequently asked question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faq {
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

/// Public URLs of uploaded assets, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assets {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub documents: Vec<String>,
}

impl Assets {
    /// The featured image is the first image by position.
    pub fn featured_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.documents.is_empty()
    }
}

/// Persisted content record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishableContent {
    /// Globally unique URL identifier.
    pub slug: String,

    pub title: String,

    pub kind: ContentKind,

    pub category: Category,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Plain-text teaser.
    #[serde(default)]
    pub summary: String,

    /// Rich-text HTML fragment supplied by the author. Never trusted.
    #[serde(default)]
    pub body: String,

    /// Present for services only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,

    #[serde(default)]
    pub steps: Vec<Step>,

    #[serde(default)]
    pub faqs: Vec<Faq>,

    #[serde(default)]
    pub requirements: Vec<String>,

    #[serde(default)]
    pub assets: Assets,

    pub status: ContentStatus,

    #[serde(default)]
    pub featured: bool,

    /// Opaque identifier supplied by the identity provider.
    pub author_id: String,

    /// Unix timestamp when created.
    pub created: i64,

    /// Unix timestamp when last changed.
    pub changed: i64,
}

impl PublishableContent {
    pub fn is_published(&self) -> bool {
        self.status == ContentStatus::Published
    }
}
