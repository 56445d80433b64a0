//! Core domain types for ContentKit articles.
//!
//! Two record shapes enter the system ([`StaticRecord`] from the compiled
//! article registry, [`PersistedRecord`] from the database) and leave it as a
//! single canonical [`ContentItem`]. Only the normalizer matches on
//! [`RawRecord`]; everything downstream sees `ContentItem`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flags::Capability;

/// Author id used for static records that name no author.
pub const EDITORIAL_AUTHOR_ID: &str = "editorial";

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Where a content item came from. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Static,
    Persisted,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static => f.write_str("static"),
            Self::Persisted => f.write_str("persisted"),
        }
    }
}

// ---------------------------------------------------------------------------
// ContentItem and its parts
// ---------------------------------------------------------------------------

/// Author identity plus an optional display projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    /// Stable author identity.
    pub id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Avatar/portrait URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Professional title (e.g. "Psychologin M.Sc.").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// An image embedded in a body section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionImage {
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// One body section of an article.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Section {
    /// Section heading. Empty for a lead section before the first heading.
    #[serde(default)]
    pub heading: String,
    /// Paragraphs in display order.
    #[serde(default)]
    pub paragraphs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<SectionImage>,
}

/// Article hero/teaser image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturedImage {
    pub url: String,
    #[serde(default)]
    pub alt: String,
}

/// A question/answer pair. Used both inside articles and as a marketing
/// fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
    /// Explicit capability tag. When absent, capability filtering falls back
    /// to a keyword match over question and answer.
    #[serde(
        default,
        deserialize_with = "crate::flags::lenient_capability",
        skip_serializing_if = "Option::is_none"
    )]
    pub capability: Option<Capability>,
}

/// The canonical, source-agnostic article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Unique across both sources. Static items reuse their slug.
    pub id: String,
    /// URL-safe identity, unique within a merged collection.
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub body: Vec<Section>,
    pub category: String,
    pub tags: Vec<String>,
    pub keywords: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: AuthorRef,
    /// Author-declared related slugs, in declared order.
    pub explicit_related: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<FeaturedImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub summary_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub faq: Vec<FaqEntry>,
    pub provenance: Provenance,
}

// ---------------------------------------------------------------------------
// Raw records
// ---------------------------------------------------------------------------

/// An article as authored in the compiled static registry (JSON).
///
/// Required fields are optional here so that a malformed entry can be
/// reported and dropped instead of failing the whole registry load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticRecord {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// RFC 3339 timestamp or plain `YYYY-MM-DD` date.
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Author display name; static records carry no author profile.
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub related: Vec<String>,
    #[serde(default)]
    pub featured_image: Option<FeaturedImage>,
    #[serde(default)]
    pub summary_points: Vec<String>,
    #[serde(default)]
    pub faq: Vec<FaqEntry>,
}

/// A published, non-deleted article row as returned by the persisted store,
/// with its author projection and explicit cross-references joined in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    /// Markdown body.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub author_display_name: Option<String>,
    #[serde(default)]
    pub author_image: Option<String>,
    #[serde(default)]
    pub author_title: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub featured_image_url: Option<String>,
    #[serde(default)]
    pub featured_image_alt: Option<String>,
    #[serde(default)]
    pub summary_points: Vec<String>,
    #[serde(default)]
    pub faq: Option<Vec<FaqEntry>>,
    #[serde(default)]
    pub related_slugs: Vec<String>,
}

/// A record from either origin, consumed only by the normalizer.
#[derive(Debug, Clone)]
pub enum RawRecord {
    Static(StaticRecord),
    Persisted(PersistedRecord),
}

impl RawRecord {
    /// Origin of this record.
    pub fn provenance(&self) -> Provenance {
        match self {
            Self::Static(_) => Provenance::Static,
            Self::Persisted(_) => Provenance::Persisted,
        }
    }

    /// Best-effort slug for diagnostics; may be empty.
    pub fn slug_hint(&self) -> &str {
        match self {
            Self::Static(r) => r.slug.as_deref().unwrap_or(""),
            Self::Persisted(r) => &r.slug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_record_tolerates_missing_fields() {
        let json = r#"{ "title": "Ohne Slug" }"#;
        let record: StaticRecord = serde_json::from_str(json).expect("deserialize");
        assert!(record.slug.is_none());
        assert_eq!(record.title.as_deref(), Some("Ohne Slug"));
        assert!(record.tags.is_empty());
        assert!(record.related.is_empty());
    }

    #[test]
    fn faq_entry_capability_is_optional() {
        let json = r#"[
            { "question": "Was kostet das?", "answer": "Nichts." },
            { "question": "Gibt es einen Chat?", "answer": "Ja.", "capability": "chat" }
        ]"#;
        let faq: Vec<FaqEntry> = serde_json::from_str(json).expect("deserialize");
        assert_eq!(faq[0].capability, None);
        assert_eq!(faq[1].capability, Some(Capability::Chat));
    }

    #[test]
    fn raw_record_reports_provenance() {
        let record = RawRecord::Static(StaticRecord {
            slug: Some("panikattacken".into()),
            ..Default::default()
        });
        assert_eq!(record.provenance(), Provenance::Static);
        assert_eq!(record.slug_hint(), "panikattacken");
        assert_eq!(Provenance::Persisted.to_string(), "persisted");
    }

    #[test]
    fn static_fixture_deserializes() {
        let fixture = std::fs::read_to_string("../../../fixtures/json/articles.fixture.json")
            .expect("read fixture");
        let records: Vec<StaticRecord> =
            serde_json::from_str(&fixture).expect("deserialize fixture articles");
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].slug.as_deref(), Some("panikattacken-verstehen"));
    }
}
