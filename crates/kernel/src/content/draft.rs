//! Multi-step authoring draft.
//!
//! A [`DraftSession`] is an immutable value: every change goes through
//! [`DraftSession::apply`], which consumes the session and returns the next
//! one. Step-specific controls (add a FAQ, reorder steps, toggle a feature)
//! never mutate nested collections; they build a [`DraftAction::UpdateField`]
//! carrying the recomputed collection, so each session is a plain snapshot
//! that can be diffed or kept for undo.
//!
//! Nothing here persists. Dropping a session discards it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content::slug::base_slug;
use crate::content::tiers::{normalize, validate_tier};
use crate::error::ValidationError;
use crate::file::upload::{AssetClass, PendingAssets, PendingAttachment};
use crate::models::{
    Assets, Category, ContentKind, ContentStatus, Faq, Step, Tier, TierCardinality, TierMap,
    TierName,
};

/// Longest title accepted.
pub const MAX_TITLE_LEN: usize = 255;

/// Authoring steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStep {
    Overview,
    Pricing,
    Assets,
    Requirements,
    Description,
    Review,
}

impl DraftStep {
    pub const ALL: [DraftStep; 6] = [
        DraftStep::Overview,
        DraftStep::Pricing,
        DraftStep::Assets,
        DraftStep::Requirements,
        DraftStep::Description,
        DraftStep::Review,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            DraftStep::Overview => "Overview",
            DraftStep::Pricing => "Pricing",
            DraftStep::Assets => "Assets",
            DraftStep::Requirements => "Requirements",
            DraftStep::Description => "Description",
            DraftStep::Review => "Review",
        }
    }

    /// The following step, clamped at `Review`.
    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1).min(Self::ALL.len() - 1)]
    }

    /// The preceding step, clamped at `Overview`.
    pub fn previous(&self) -> Self {
        Self::ALL[self.index().saturating_sub(1)]
    }
}

impl fmt::Display for DraftStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The author's unpersisted copy of a content record.
///
/// Also the JSON shape accepted by the HTTP API. Pending attachments travel
/// separately as multipart parts and are never serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Draft {
    pub kind: ContentKind,
    pub title: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub summary: String,
    pub body: String,
    pub tier_cardinality: TierCardinality,
    pub tiers: TierMap,
    pub steps: Vec<Step>,
    pub faqs: Vec<Faq>,
    pub requirements: Vec<String>,
    /// Already-uploaded assets to keep, in display order.
    pub existing_assets: Assets,
    #[serde(skip)]
    pub pending: PendingAssets,
    pub terms_accepted: bool,
    pub featured: bool,
    /// Requested status; only `draft` and `published` may be submitted.
    pub status: ContentStatus,
    pub author_id: String,
}

impl Draft {
    /// A fresh draft with blank starter, standard and advanced tiers.
    pub fn new(kind: ContentKind, author_id: impl Into<String>) -> Self {
        let tiers = TierName::ALL
            .iter()
            .map(|name| (*name, Tier::blank()))
            .collect();

        Self {
            kind,
            tiers,
            author_id: author_id.into(),
            ..Self::default()
        }
    }

    /// Whether any tier has been given a title.
    pub fn has_populated_tier(&self) -> bool {
        self.tiers.values().any(Tier::is_populated)
    }

    /// The submission gate: title, accepted terms, and a priced tier for
    /// services.
    pub fn can_submit(&self) -> bool {
        !self.title.trim().is_empty()
            && self.terms_accepted
            && (!self.kind.has_pricing() || self.has_populated_tier())
    }

    /// Every field-level problem that would stop a publish.
    pub fn validation_errors(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let title = self.title.trim();
        if title.is_empty() {
            errors.push(ValidationError::field("title", "title is required"));
        } else if base_slug(title).is_empty() {
            errors.push(ValidationError::field(
                "title",
                "title must contain at least one letter or digit",
            ));
        } else if title.chars().count() > MAX_TITLE_LEN {
            errors.push(ValidationError::field(
                "title",
                format!("title must be at most {MAX_TITLE_LEN} characters"),
            ));
        }

        if !self.terms_accepted {
            errors.push(ValidationError::field(
                "terms_accepted",
                "terms must be accepted",
            ));
        }

        if self.status == ContentStatus::Archived {
            errors.push(ValidationError::field(
                "status",
                "a draft can only be submitted as draft or published",
            ));
        }

        if self.kind.has_pricing() {
            if !self.has_populated_tier() {
                errors.push(ValidationError::field(
                    "tiers",
                    "at least one pricing tier is required",
                ));
            }

            // Only tiers that survive normalization are checked field by field
            match normalize(&self.tiers, self.tier_cardinality) {
                Ok(tiers) => {
                    for (name, tier) in &tiers {
                        errors.extend(validate_tier(*name, tier, self.category));
                    }
                }
                Err(missing) => errors.extend(missing.iter().map(|e| e.to_validation())),
            }
        }

        for (i, step) in self.steps.iter().enumerate() {
            if step.title.trim().is_empty() {
                errors.push(ValidationError::field(
                    format!("steps.{i}.title"),
                    "step title is required",
                ));
            }
        }

        for (i, faq) in self.faqs.iter().enumerate() {
            if faq.question.trim().is_empty() {
                errors.push(ValidationError::field(
                    format!("faqs.{i}.question"),
                    "question is required",
                ));
            }
        }

        errors
    }

    // Derived controls. Each returns the action replacing one field with a
    // recomputed value; `self` is left untouched.

    pub fn add_faq(&self, faq: Faq) -> DraftAction {
        let mut faqs = self.faqs.clone();
        faqs.push(faq);
        DraftAction::UpdateField(FieldUpdate::Faqs(faqs))
    }

    pub fn remove_faq(&self, index: usize) -> DraftAction {
        DraftAction::UpdateField(FieldUpdate::Faqs(without(&self.faqs, index)))
    }

    /// Add a tag, trimmed and lowercased. Blank and duplicate tags are ignored.
    pub fn add_tag(&self, tag: &str) -> DraftAction {
        let tag = tag.trim().to_lowercase();
        let mut tags = self.tags.clone();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
        DraftAction::UpdateField(FieldUpdate::Tags(tags))
    }

    pub fn remove_tag(&self, tag: &str) -> DraftAction {
        let tag = tag.trim().to_lowercase();
        let tags = self.tags.iter().filter(|t| **t != tag).cloned().collect();
        DraftAction::UpdateField(FieldUpdate::Tags(tags))
    }

    pub fn add_step(&self, step: Step) -> DraftAction {
        let mut steps = self.steps.clone();
        steps.push(step);
        DraftAction::UpdateField(FieldUpdate::Steps(steps))
    }

    pub fn remove_step(&self, index: usize) -> DraftAction {
        DraftAction::UpdateField(FieldUpdate::Steps(without(&self.steps, index)))
    }

    /// Swap step `index` with the one above it.
    pub fn move_step_up(&self, index: usize) -> DraftAction {
        let mut steps = self.steps.clone();
        if index > 0 && index < steps.len() {
            steps.swap(index - 1, index);
        }
        DraftAction::UpdateField(FieldUpdate::Steps(steps))
    }

    /// Swap step `index` with the one below it.
    pub fn move_step_down(&self, index: usize) -> DraftAction {
        let mut steps = self.steps.clone();
        if index + 1 < steps.len() {
            steps.swap(index, index + 1);
        }
        DraftAction::UpdateField(FieldUpdate::Steps(steps))
    }

    pub fn add_requirement(&self, requirement: &str) -> DraftAction {
        let requirement = requirement.trim();
        let mut requirements = self.requirements.clone();
        if !requirement.is_empty() {
            requirements.push(requirement.to_string());
        }
        DraftAction::UpdateField(FieldUpdate::Requirements(requirements))
    }

    pub fn remove_requirement(&self, index: usize) -> DraftAction {
        DraftAction::UpdateField(FieldUpdate::Requirements(without(
            &self.requirements,
            index,
        )))
    }

    /// Flip one feature of one tier. A missing tier starts out blank.
    pub fn toggle_feature(&self, tier: TierName, feature: &str) -> DraftAction {
        let mut tiers = self.tiers.clone();
        let current = tiers.remove(&tier).unwrap_or_default();
        tiers.insert(
            tier,
            Tier {
                features: current.features.toggled(feature),
                ..current
            },
        );
        DraftAction::UpdateField(FieldUpdate::Tiers(tiers))
    }

    pub fn set_tier(&self, name: TierName, tier: Tier) -> DraftAction {
        let mut tiers = self.tiers.clone();
        tiers.insert(name, tier);
        DraftAction::UpdateField(FieldUpdate::Tiers(tiers))
    }

    /// Queue a file for upload at publish time.
    pub fn attach(&self, class: AssetClass, attachment: PendingAttachment) -> DraftAction {
        let mut pending = self.pending.clone();
        match class {
            AssetClass::Image => pending.images.push(attachment),
            AssetClass::Document => pending.documents.push(attachment),
        }
        DraftAction::UpdateField(FieldUpdate::Pending(pending))
    }

    pub fn detach(&self, class: AssetClass, index: usize) -> DraftAction {
        let pending = match class {
            AssetClass::Image => PendingAssets {
                images: without(&self.pending.images, index),
                documents: self.pending.documents.clone(),
            },
            AssetClass::Document => PendingAssets {
                images: self.pending.images.clone(),
                documents: without(&self.pending.documents, index),
            },
        };
        DraftAction::UpdateField(FieldUpdate::Pending(pending))
    }
}

/// Copy of `items` without position `index`; out of range leaves it whole.
fn without<T: Clone>(items: &[T], index: usize) -> Vec<T> {
    items
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, item)| item.clone())
        .collect()
}

/// Replacement value for exactly one draft field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Kind(ContentKind),
    Title(String),
    Category(Category),
    Tags(Vec<String>),
    Summary(String),
    Body(String),
    TierCardinality(TierCardinality),
    Tiers(TierMap),
    Steps(Vec<Step>),
    Faqs(Vec<Faq>),
    Requirements(Vec<String>),
    ExistingAssets(Assets),
    Pending(PendingAssets),
    TermsAccepted(bool),
    Featured(bool),
    Status(ContentStatus),
}

impl FieldUpdate {
    /// Field name as used in validation errors.
    pub fn field(&self) -> &'static str {
        match self {
            FieldUpdate::Kind(_) => "kind",
            FieldUpdate::Title(_) => "title",
            FieldUpdate::Category(_) => "category",
            FieldUpdate::Tags(_) => "tags",
            FieldUpdate::Summary(_) => "summary",
            FieldUpdate::Body(_) => "body",
            FieldUpdate::TierCardinality(_) => "tier_cardinality",
            FieldUpdate::Tiers(_) => "tiers",
            FieldUpdate::Steps(_) => "steps",
            FieldUpdate::Faqs(_) => "faqs",
            FieldUpdate::Requirements(_) => "requirements",
            FieldUpdate::ExistingAssets(_) => "existing_assets",
            FieldUpdate::Pending(_) => "pending",
            FieldUpdate::TermsAccepted(_) => "terms_accepted",
            FieldUpdate::Featured(_) => "featured",
            FieldUpdate::Status(_) => "status",
        }
    }

    fn apply_to(self, draft: Draft) -> Draft {
        match self {
            FieldUpdate::Kind(kind) => Draft { kind, ..draft },
            FieldUpdate::Title(title) => Draft { title, ..draft },
            FieldUpdate::Category(category) => Draft { category, ..draft },
            FieldUpdate::Tags(tags) => Draft { tags, ..draft },
            FieldUpdate::Summary(summary) => Draft { summary, ..draft },
            FieldUpdate::Body(body) => Draft { body, ..draft },
            FieldUpdate::TierCardinality(tier_cardinality) => Draft {
                tier_cardinality,
                ..draft
            },
            FieldUpdate::Tiers(tiers) => Draft { tiers, ..draft },
            FieldUpdate::Steps(steps) => Draft { steps, ..draft },
            FieldUpdate::Faqs(faqs) => Draft { faqs, ..draft },
            FieldUpdate::Requirements(requirements) => Draft {
                requirements,
                ..draft
            },
            FieldUpdate::ExistingAssets(existing_assets) => Draft {
                existing_assets,
                ..draft
            },
            FieldUpdate::Pending(pending) => Draft { pending, ..draft },
            FieldUpdate::TermsAccepted(terms_accepted) => Draft {
                terms_accepted,
                ..draft
            },
            FieldUpdate::Featured(featured) => Draft { featured, ..draft },
            FieldUpdate::Status(status) => Draft { status, ..draft },
        }
    }
}

/// Input to [`DraftSession::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftAction {
    Next,
    Previous,
    /// Jump back to an earlier step, or stay on the current one.
    GoTo(DraftStep),
    UpdateField(FieldUpdate),
}

/// A validated draft, ready for the publish pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub draft: Draft,
}

impl From<Draft> for PublishRequest {
    fn from(draft: Draft) -> Self {
        Self { draft }
    }
}

/// One authoring session: the draft plus the step cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSession {
    draft: Draft,
    cursor: DraftStep,
    last_mutated_by: Option<DraftStep>,
}

impl DraftSession {
    pub fn new(kind: ContentKind, author_id: impl Into<String>) -> Self {
        Self::from_draft(Draft::new(kind, author_id))
    }

    /// Resume editing an existing draft from the first step.
    pub fn from_draft(draft: Draft) -> Self {
        Self {
            draft,
            cursor: DraftStep::Overview,
            last_mutated_by: None,
        }
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn cursor(&self) -> DraftStep {
        self.cursor
    }

    /// The step that last changed a field, if any.
    pub fn last_mutated_by(&self) -> Option<DraftStep> {
        self.last_mutated_by
    }

    /// Apply one transition.
    pub fn apply(self, action: DraftAction) -> Self {
        match action {
            DraftAction::Next => Self {
                cursor: self.cursor.next(),
                ..self
            },
            DraftAction::Previous => Self {
                cursor: self.cursor.previous(),
                ..self
            },
            DraftAction::GoTo(step) if step <= self.cursor => Self {
                cursor: step,
                ..self
            },
            DraftAction::GoTo(_) => self,
            DraftAction::UpdateField(update) => Self {
                draft: update.apply_to(self.draft),
                last_mutated_by: Some(self.cursor),
                ..self
            },
        }
    }

    pub fn can_submit(&self) -> bool {
        self.draft.can_submit()
    }

    pub fn validation_errors(&self) -> Vec<ValidationError> {
        self.draft.validation_errors()
    }

    /// Close the session, handing the draft to the publish pipeline.
    pub fn submit(self) -> Result<PublishRequest, Vec<ValidationError>> {
        let errors = self.draft.validation_errors();
        if errors.is_empty() {
            Ok(PublishRequest { draft: self.draft })
        } else {
            Err(errors)
        }
    }
}
