//! Capability flag transformer for marketing fragments.
//!
//! A pure pass over navigation entries, benefit blocks, FAQ entries and
//! free-text blocks that removes or rewrites whatever refers to a disabled
//! capability. Nothing is cached; every call evaluates the given
//! [`FeatureFlagSet`] afresh.
//!
//! | Fragment   | Gating                                           |
//! |------------|--------------------------------------------------|
//! | navigation | href matched against a fixed route table         |
//! | benefit    | explicit capability tag                          |
//! | FAQ        | explicit tag, else keyword match on the text     |
//! | text block | declared clauses replaced or removed in place    |

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use contentkit_shared::{
    Capability, ContentKitError, FaqEntry, FeatureFlagSet, Result, lenient_capability,
};

// ---------------------------------------------------------------------------
// Rule tables
// ---------------------------------------------------------------------------

/// Route prefixes that only make sense while a capability is enabled.
const GATED_ROUTES: &[(Capability, &[&str])] = &[
    (Capability::Chat, &["/chat"]),
    (Capability::Directory, &["/therapeuten", "/verzeichnis"]),
    (Capability::Community, &["/community", "/forum"]),
];

/// Lowercase terms that mark an untagged FAQ entry as being about a capability.
const FAQ_TERMS: &[(Capability, &[&str])] = &[
    (
        Capability::Chat,
        &["chat", "ki-assistent", "künstliche intelligenz"],
    ),
    (
        Capability::Directory,
        &["therapeutenverzeichnis", "therapeutensuche", "verzeichnis"],
    ),
    (Capability::Community, &["community", "forum"]),
];

static MULTI_SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

static SPACE_BEFORE_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([,.;:!?])").expect("valid regex"));

// ---------------------------------------------------------------------------
// Fragment types
// ---------------------------------------------------------------------------

/// A navigation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavItem {
    pub label: String,
    pub href: String,
}

/// A benefit block on a landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Benefit {
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(
        default,
        deserialize_with = "lenient_capability",
        skip_serializing_if = "Option::is_none"
    )]
    pub capability: Option<Capability>,
}

/// A substring of a text block that only holds while `capability` is enabled.
/// A clause with no known capability is never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatedClause {
    #[serde(
        default,
        deserialize_with = "lenient_capability",
        skip_serializing_if = "Option::is_none"
    )]
    pub capability: Option<Capability>,
    pub text: String,
    /// Text to use instead when disabled. Removed when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
}

/// Free-form copy (hero, "why", contact CTA) with capability-specific clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clauses: Vec<GatedClause>,
}

impl TextBlock {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            clauses: Vec::new(),
        }
    }
}

/// Any independently filterable piece of marketing content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentFragment {
    Navigation(NavItem),
    Benefit(Benefit),
    Faq(FaqEntry),
    Text(TextBlock),
}

/// The site's full set of marketing fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentSet {
    #[serde(default)]
    pub navigation: Vec<NavItem>,
    #[serde(default)]
    pub benefits: Vec<Benefit>,
    #[serde(default)]
    pub faq: Vec<FaqEntry>,
    #[serde(default)]
    pub hero: TextBlock,
    #[serde(default)]
    pub why: TextBlock,
    #[serde(default)]
    pub contact_cta: TextBlock,
}

impl FragmentSet {
    /// Load a fragment set from JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ContentKitError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            ContentKitError::parse(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Apply `flags` to every fragment kind.
    pub fn filter(&self, flags: &FeatureFlagSet) -> Self {
        let filtered = Self {
            navigation: filter_navigation(&self.navigation, flags),
            benefits: filter_benefits(&self.benefits, flags),
            faq: filter_faq(&self.faq, flags),
            hero: rewrite_text(&self.hero, flags),
            why: rewrite_text(&self.why, flags),
            contact_cta: rewrite_text(&self.contact_cta, flags),
        };
        debug!(
            navigation = filtered.navigation.len(),
            benefits = filtered.benefits.len(),
            faq = filtered.faq.len(),
            "fragments filtered"
        );
        filtered
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// The capability a site-relative href is gated on, if any.
pub fn route_capability(href: &str) -> Option<Capability> {
    GATED_ROUTES
        .iter()
        .find(|(_, prefixes)| prefixes.iter().any(|p| route_matches(href, p)))
        .map(|(cap, _)| *cap)
}

fn route_matches(href: &str, prefix: &str) -> bool {
    match href.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with(['/', '?', '#']),
        None => false,
    }
}

/// Capabilities an FAQ entry is about. An explicit tag wins over keywords.
pub fn faq_capabilities(entry: &FaqEntry) -> Vec<Capability> {
    if let Some(cap) = entry.capability {
        return vec![cap];
    }
    let haystack = format!("{} {}", entry.question, entry.answer).to_lowercase();
    FAQ_TERMS
        .iter()
        .filter(|(_, terms)| terms.iter().any(|t| haystack.contains(t)))
        .map(|(cap, _)| *cap)
        .collect()
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

fn gate_open(capability: Option<Capability>, flags: &FeatureFlagSet) -> bool {
    capability.is_none_or(|cap| flags.is_enabled(cap))
}

/// Whether a navigation entry survives `flags`.
pub fn nav_visible(item: &NavItem, flags: &FeatureFlagSet) -> bool {
    gate_open(route_capability(&item.href), flags)
}

/// Whether a benefit survives `flags`.
pub fn benefit_visible(benefit: &Benefit, flags: &FeatureFlagSet) -> bool {
    gate_open(benefit.capability, flags)
}

/// Whether an FAQ entry survives `flags`: none of its capabilities is off.
pub fn faq_visible(entry: &FaqEntry, flags: &FeatureFlagSet) -> bool {
    faq_capabilities(entry)
        .into_iter()
        .all(|cap| flags.is_enabled(cap))
}

/// Drop navigation entries pointing at a disabled capability's routes.
pub fn filter_navigation(items: &[NavItem], flags: &FeatureFlagSet) -> Vec<NavItem> {
    items
        .iter()
        .filter(|item| nav_visible(item, flags))
        .cloned()
        .collect()
}

/// Drop benefits tagged with a disabled capability.
pub fn filter_benefits(benefits: &[Benefit], flags: &FeatureFlagSet) -> Vec<Benefit> {
    benefits
        .iter()
        .filter(|b| benefit_visible(b, flags))
        .cloned()
        .collect()
}

/// Drop FAQ entries about any disabled capability.
pub fn filter_faq(entries: &[FaqEntry], flags: &FeatureFlagSet) -> Vec<FaqEntry> {
    entries
        .iter()
        .filter(|e| faq_visible(e, flags))
        .cloned()
        .collect()
}

/// Replace or remove the clauses of disabled capabilities.
///
/// Clauses of enabled capabilities are kept on the result, so rewriting an
/// already rewritten block with the same flags changes nothing.
pub fn rewrite_text(block: &TextBlock, flags: &FeatureFlagSet) -> TextBlock {
    let mut text = block.text.clone();
    let mut changed = false;
    let mut kept = Vec::with_capacity(block.clauses.len());

    for clause in &block.clauses {
        if gate_open(clause.capability, flags) {
            kept.push(clause.clone());
            continue;
        }
        if !clause.text.is_empty() && text.contains(&clause.text) {
            text = text.replace(&clause.text, clause.replacement.as_deref().unwrap_or(""));
            changed = true;
        }
    }

    if changed {
        text = tidy_whitespace(&text);
    }
    TextBlock {
        text,
        clauses: kept,
    }
}

fn tidy_whitespace(text: &str) -> String {
    let collapsed = MULTI_SPACE_RE.replace_all(text, " ");
    SPACE_BEFORE_PUNCT_RE
        .replace_all(&collapsed, "$1")
        .trim()
        .to_string()
}

/// Filter a mixed list of fragments, each by the rule for its kind.
pub fn filter_fragments(fragments: &[ContentFragment], flags: &FeatureFlagSet) -> Vec<ContentFragment> {
    fragments
        .iter()
        .filter_map(|fragment| match fragment {
            ContentFragment::Navigation(item) => nav_visible(item, flags).then(|| fragment.clone()),
            ContentFragment::Benefit(benefit) => {
                benefit_visible(benefit, flags).then(|| fragment.clone())
            }
            ContentFragment::Faq(entry) => faq_visible(entry, flags).then(|| fragment.clone()),
            ContentFragment::Text(block) => Some(ContentFragment::Text(rewrite_text(block, flags))),
        })
        .collect()
}
