//! Merge engine: one deduplicated, recency-ordered article collection.
//!
//! Persisted items take precedence over static ones when slugs collide.
//! The result is sorted by `published_at` descending with a stable sort, so
//! equal timestamps keep precedence order.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, instrument, warn};

use contentkit_shared::ContentItem;

/// Merge static and persisted items.
///
/// Total and idempotent: feeding an already merged collection back in (with
/// nothing on the other side) yields it unchanged.
#[instrument(skip_all, fields(static_count = static_items.len(), persisted_count = persisted_items.len()))]
pub fn merge(static_items: Vec<ContentItem>, persisted_items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<ContentItem> = Vec::with_capacity(static_items.len() + persisted_items.len());

    for item in persisted_items.into_iter().chain(static_items) {
        if seen.insert(item.slug.clone()) {
            merged.push(item);
        } else {
            warn!(slug = %item.slug, provenance = %item.provenance, "duplicate slug shadowed");
        }
    }

    merged.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    debug!(count = merged.len(), "merged content collection");
    merged
}

/// A merged collection with read-only lookup helpers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentCollection {
    items: Vec<ContentItem>,
}

impl ContentCollection {
    /// Merge both sources into a collection.
    pub fn from_sources(static_items: Vec<ContentItem>, persisted_items: Vec<ContentItem>) -> Self {
        Self {
            items: merge(static_items, persisted_items),
        }
    }

    /// Newest first.
    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<ContentItem> {
        self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContentItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn by_slug(&self, slug: &str) -> Option<&ContentItem> {
        self.items.iter().find(|i| i.slug == slug)
    }

    /// Items in `category`, newest first.
    pub fn by_category(&self, category: &str) -> Vec<&ContentItem> {
        self.items.iter().filter(|i| i.category == category).collect()
    }

    /// Items carrying `tag` (case-sensitive), newest first.
    pub fn by_tag(&self, tag: &str) -> Vec<&ContentItem> {
        self.items
            .iter()
            .filter(|i| i.tags.iter().any(|t| t == tag))
            .collect()
    }

    /// Distinct non-empty categories, sorted.
    pub fn all_categories(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|i| !i.category.is_empty())
            .map(|i| i.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct tags across all items, sorted.
    pub fn all_tags(&self) -> Vec<String> {
        self.items
            .iter()
            .flat_map(|i| i.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Article count per non-empty category, sorted by category.
    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for item in self.items.iter().filter(|i| !i.category.is_empty()) {
            *counts.entry(item.category.clone()).or_insert(0) += 1;
        }
        counts
    }
}

impl<'a> IntoIterator for &'a ContentCollection {
    type Item = &'a ContentItem;
    type IntoIter = std::slice::Iter<'a, ContentItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
pub(crate) mod test_items {
    use chrono::{TimeZone, Utc};
    use contentkit_shared::{AuthorRef, ContentItem, Provenance};

    /// Build an item published on 2024-05-`day`.
    pub(crate) fn item(slug: &str, day: u32, provenance: Provenance) -> ContentItem {
        let published_at = Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap();
        ContentItem {
            id: slug.into(),
            slug: slug.into(),
            title: slug.to_uppercase(),
            excerpt: String::new(),
            body: vec![],
            category: String::new(),
            tags: vec![],
            keywords: vec![],
            published_at,
            updated_at: published_at,
            author: AuthorRef {
                id: "editorial".into(),
                name: None,
                image: None,
                title: None,
            },
            explicit_related: vec![],
            featured_image: None,
            summary_points: vec![],
            faq: vec![],
            provenance,
        }
    }

    pub(crate) fn tagged(
        slug: &str,
        day: u32,
        category: &str,
        tags: &[&str],
        keywords: &[&str],
    ) -> ContentItem {
        ContentItem {
            category: category.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..item(slug, day, Provenance::Static)
        }
    }
}
