//! Pricing tier normalization.
//!
//! Reshapes a draft's tier map to exactly the tiers its cardinality requires.
//! Missing tiers are reported, never fabricated.

use thiserror::Error;

use crate::error::ValidationError;
use crate::models::{Category, Tier, TierCardinality, TierMap, TierName};

/// Tier normalization failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TierError {
    /// A tier required by the cardinality is absent or was never populated.
    #[error("{tier} tier is required when cardinality is {cardinality}")]
    Missing {
        tier: TierName,
        cardinality: TierCardinality,
    },
}

impl TierError {
    pub fn to_validation(&self) -> ValidationError {
        match self {
            TierError::Missing { tier, .. } => {
                ValidationError::field(format!("tiers.{tier}"), self.to_string())
            }
        }
    }
}

/// Prune `tiers` to exactly the set required by `cardinality`.
///
/// Pure and total: the same inputs always give the same result. Every missing
/// tier is reported, not just the first.
pub fn normalize(tiers: &TierMap, cardinality: TierCardinality) -> Result<TierMap, Vec<TierError>> {
    let mut normalized = TierMap::new();
    let mut missing = Vec::new();

    for name in cardinality.required_tiers() {
        match tiers.get(name) {
            Some(tier) if tier.is_populated() => {
                normalized.insert(*name, tier.clone());
            }
            _ => missing.push(TierError::Missing {
                tier: *name,
                cardinality,
            }),
        }
    }

    if missing.is_empty() {
        Ok(normalized)
    } else {
        Err(missing)
    }
}

/// Per-tier field checks against the draft's category.
pub fn validate_tier(name: TierName, tier: &Tier, category: Category) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let field = |suffix: &str| format!("tiers.{name}.{suffix}");

    if tier.title.trim().is_empty() {
        errors.push(ValidationError::field(field("title"), "title is required"));
    }

    if tier.delivery_days < 1 {
        errors.push(ValidationError::field(
            field("delivery_days"),
            "delivery time must be at least one day",
        ));
    }

    for key in tier.features.unknown_keys(category) {
        errors.push(ValidationError::field(
            field("features"),
            format!("unknown feature \"{key}\" for category {category}"),
        ));
    }

    errors
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::FeatureSet;

    fn tier(title: &str, price: u32) -> Tier {
        Tier {
            title: title.to_string(),
            price,
            ..Tier::blank()
        }
    }

    fn full_map() -> TierMap {
        let mut tiers = TierMap::new();
        tiers.insert(TierName::Starter, tier("Basic", 50));
        tiers.insert(TierName::Standard, tier("Plus", 120));
        tiers.insert(TierName::Advanced, tier("Pro", 300));
        tiers
    }

    #[test]
    fn single_keeps_only_starter() {
        let normalized = normalize(&full_map(), TierCardinality::Single).unwrap();
        assert_eq!(normalized.keys().copied().collect::<Vec<_>>(), vec![TierName::Starter]);
        assert_eq!(normalized[&TierName::Starter].price, 50);
    }

    #[test]
    fn triple_keeps_all_three() {
        let normalized = normalize(&full_map(), TierCardinality::Triple).unwrap();
        assert_eq!(normalized.len(), 3);
        assert_eq!(normalized, full_map());
    }

    #[test]
    fn triple_missing_advanced_fails() {
        let mut tiers = full_map();
        tiers.remove(&TierName::Advanced);
        let errors = normalize(&tiers, TierCardinality::Triple).unwrap_err();
        assert_eq!(
            errors,
            vec![TierError::Missing {
                tier: TierName::Advanced,
                cardinality: TierCardinality::Triple
            }]
        );
        assert_eq!(
            errors[0].to_validation().field.as_deref(),
            Some("tiers.advanced")
        );
    }

    #[test]
    fn unpopulated_tier_counts_as_missing() {
        let mut tiers = full_map();
        tiers.insert(TierName::Standard, Tier::blank());
        let errors = normalize(&tiers, TierCardinality::Triple).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("standard"));
    }

    #[test]
    fn single_without_starter_fails() {
        let errors = normalize(&TierMap::new(), TierCardinality::Single).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn normalize_is_deterministic() {
        let tiers = full_map();
        assert_eq!(
            normalize(&tiers, TierCardinality::Single),
            normalize(&tiers, TierCardinality::Single)
        );
    }

    #[test]
    fn validate_tier_rejects_unknown_feature() {
        let mut basic = tier("Basic", 50);
        basic.features = FeatureSet::new().with("keyword_reserach", true);
        let errors = validate_tier(TierName::Starter, &basic, Category::Seo);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("keyword_reserach"));
    }

    #[test]
    fn validate_tier_requires_delivery_days() {
        let mut basic = tier("Basic", 50);
        basic.delivery_days = 0;
        let errors = validate_tier(TierName::Starter, &basic, Category::Other);
        assert_eq!(
            errors[0].field.as_deref(),
            Some("tiers.starter.delivery_days")
        );
    }
}
