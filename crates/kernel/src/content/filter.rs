//! Rich-text sanitization for the read path.
//!
//! Author markup is stored as supplied and filtered here, immediately before
//! it is handed to the renderer:
//! - `AllowListFilter`: keeps a fixed tag and attribute allow-list, strips the rest
//! - `BlankTargetFilter`: forces `rel="noopener noreferrer"` onto `target="_blank"` links
//!
//! Running the pipeline on its own output is a no-op.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Trait for text filters in the pipeline.
pub trait TextFilter: Send + Sync {
    /// Filter name for debugging.
    fn name(&self) -> &str;

    /// Process the input text and return filtered output.
    fn process(&self, input: &str) -> String;
}

/// Tags that survive sanitization.
pub const ALLOWED_TAGS: &[&str] = &[
    "p",
    "br",
    "h2",
    "h3",
    "strong",
    "b",
    "em",
    "i",
    "u",
    "s",
    "ul",
    "ol",
    "li",
    "a",
    "img",
    "blockquote",
    "code",
    "hr",
    "span",
    "div",
];

/// Attributes that survive sanitization, on any allowed tag.
pub const ALLOWED_ATTRIBUTES: &[&str] = &[
    "href",
    "target",
    "rel",
    "class",
    "style",
    "src",
    "alt",
    "width",
    "height",
    "data-color",
];

/// URL schemes accepted in `href` and `src`.
pub const ALLOWED_URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Tags removed together with everything inside them.
///
/// Covers every element the HTML parser reads as raw text, whose markup would
/// otherwise come out escaped.
const CONTENT_STRIPPED_TAGS: &[&str] = &[
    "script",
    "style",
    "noscript",
    "xmp",
    "textarea",
    "iframe",
    "noembed",
    "noframes",
    "title",
    "plaintext",
];

/// The `rel` value forced onto links opening a new browsing context.
pub const BLANK_TARGET_REL: &str = "noopener noreferrer";

/// Pipeline of text filters applied in sequence.
pub struct FilterPipeline {
    filters: Vec<Box<dyn TextFilter>>,
}

impl FilterPipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Add a filter to the pipeline.
    pub fn add<F: TextFilter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Process text through all filters in the pipeline.
    pub fn process(&self, input: &str) -> String {
        self.filters
            .iter()
            .fold(input.to_string(), |acc, filter| filter.process(&acc))
    }
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Allow-list HTML filter backed by ammonia.
///
/// Disallowed tags are unwrapped (their text kept) except `script` and
/// `style`, which are dropped with their contents. Disallowed attributes and
/// URLs with other schemes are removed.
pub struct AllowListFilter {
    builder: ammonia::Builder<'static>,
}

impl AllowListFilter {
    pub fn new() -> Self {
        let mut builder = ammonia::Builder::empty();
        builder
            .tags(ALLOWED_TAGS.iter().copied().collect::<HashSet<_>>())
            .generic_attributes(ALLOWED_ATTRIBUTES.iter().copied().collect::<HashSet<_>>())
            .url_schemes(ALLOWED_URL_SCHEMES.iter().copied().collect::<HashSet<_>>())
            .clean_content_tags(CONTENT_STRIPPED_TAGS.iter().copied().collect::<HashSet<_>>())
            .url_relative(ammonia::UrlRelative::PassThrough)
            // `rel` is an allowed attribute, which ammonia only permits when it
            // does not manage `rel` itself; BlankTargetFilter hardens it instead
            .link_rel(None)
            .strip_comments(true);
        Self { builder }
    }
}

impl Default for AllowListFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl TextFilter for AllowListFilter {
    fn name(&self) -> &str {
        "allow_list"
    }

    fn process(&self, input: &str) -> String {
        self.builder.clean(input).to_string()
    }
}

// Matches opening anchor tags as serialized by html5ever: every attribute
// is double-quoted and `"` inside values is always escaped.
#[allow(clippy::expect_used)]
static ANCHOR_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a((?:\s+[a-zA-Z0-9_:-]+="[^"]*")*)\s*>"#).expect("valid regex literal")
});

#[allow(clippy::expect_used)]
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+([a-zA-Z0-9_:-]+)="([^"]*)""#).expect("valid regex literal")
});

/// Forces `rel="noopener noreferrer"` onto every `target="_blank"` anchor.
///
/// Expects serializer-normalized HTML, so it must run after `AllowListFilter`.
/// Any author-supplied `rel` on such an anchor is replaced.
pub struct BlankTargetFilter;

impl BlankTargetFilter {
    fn harden(caps: &Captures<'_>) -> String {
        let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or("");

        let opens_blank = ATTRIBUTE.captures_iter(attrs).any(|a| {
            a[1].eq_ignore_ascii_case("target") && a[2].trim().eq_ignore_ascii_case("_blank")
        });
        if !opens_blank {
            return caps[0].to_string();
        }

        let mut tag = String::from("<a");
        for a in ATTRIBUTE.captures_iter(attrs) {
            if a[1].eq_ignore_ascii_case("rel") {
                continue;
            }
            tag.push_str(&a[0]);
        }
        tag.push_str(&format!(" rel=\"{BLANK_TARGET_REL}\">"));
        tag
    }
}

impl TextFilter for BlankTargetFilter {
    fn name(&self) -> &str {
        "blank_target"
    }

    fn process(&self, input: &str) -> String {
        ANCHOR_TAG
            .replace_all(input, |caps: &Captures<'_>| Self::harden(caps))
            .into_owned()
    }
}

/// The read-path sanitizer applied to every rich-text field.
pub struct ContentSanitizer {
    pipeline: FilterPipeline,
}

impl ContentSanitizer {
    pub fn new() -> Self {
        Self {
            pipeline: FilterPipeline::new()
                .add(AllowListFilter::new())
                .add(BlankTargetFilter),
        }
    }

    /// Sanitize an untrusted HTML fragment.
    pub fn sanitize(&self, html: &str) -> String {
        if html.is_empty() {
            return String::new();
        }
        self.pipeline.process(html)
    }
}

impl Default for ContentSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContentSanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSanitizer").finish()
    }
}
