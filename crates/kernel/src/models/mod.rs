//! Content data model.

pub mod content;
pub mod feature;

pub use content::{
    Assets, ContentKind, ContentStatus, Faq, Pricing, PublishableContent, Step, Tier,
    TierCardinality, TierMap, TierName,
};
pub use feature::{Category, FeatureSet};
