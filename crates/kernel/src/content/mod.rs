//! Structured content publishing.
//!
//! This module provides:
//! - Draft: multi-step authoring state machine
//! - SlugResolver: URL slug derivation and uniqueness
//! - Tier normalization for service pricing
//! - ContentSanitizer: allow-list HTML filtering for the read path
//! - ContentStore: persistence port and PostgreSQL backend
//! - PublishService: the publish pipeline and record lifecycle

pub mod draft;
pub mod filter;
pub mod publish;
pub mod slug;
pub mod store;
pub mod tiers;

pub use draft::{Draft, DraftAction, DraftSession, DraftStep, FieldUpdate, PublishRequest};
pub use filter::{ContentSanitizer, FilterPipeline, TextFilter};
pub use publish::{PublishPhase, PublishReport, PublishService, RenderedContent};
pub use slug::{SlugResolver, base_slug};
pub use store::{ContentStore, ListQuery, PgContentStore};
pub use tiers::{TierError, normalize};
