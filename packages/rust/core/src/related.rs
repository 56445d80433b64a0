//! Relatedness scorer.
//!
//! Author-declared links win. Remaining slots are filled by a weighted
//! overlap score: same category +10, each shared tag +3, each shared keyword
//! +2. Items scoring zero are never suggested. Ties keep collection order,
//! which is newest first for a merged collection.

use std::collections::HashSet;

use serde::Serialize;
use tracing::trace;

use contentkit_shared::ContentItem;

/// Number of related items when the caller has no preference.
pub const DEFAULT_RELATED_LIMIT: usize = 3;

pub const CATEGORY_WEIGHT: u32 = 10;
pub const TAG_WEIGHT: u32 = 3;
pub const KEYWORD_WEIGHT: u32 = 2;

/// Why an item was suggested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "score", rename_all = "lowercase")]
pub enum RelationReason {
    /// Listed in the article's explicit related slugs.
    Explicit,
    /// Picked by overlap score.
    Scored(u32),
}

/// A suggested related item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelatedMatch<'a> {
    pub item: &'a ContentItem,
    pub reason: RelationReason,
}

/// Weighted category/tag/keyword overlap between two items.
pub fn relatedness_score(item: &ContentItem, other: &ContentItem) -> u32 {
    let mut score = 0;
    if !item.category.is_empty() && item.category == other.category {
        score += CATEGORY_WEIGHT;
    }
    score += TAG_WEIGHT * shared_count(&item.tags, &other.tags);
    score += KEYWORD_WEIGHT * shared_count(&item.keywords, &other.keywords);
    score
}

fn shared_count(ours: &[String], theirs: &[String]) -> u32 {
    let ours: HashSet<&str> = ours.iter().map(String::as_str).collect();
    let theirs: HashSet<&str> = theirs.iter().map(String::as_str).collect();
    u32::try_from(ours.intersection(&theirs).count()).unwrap_or(u32::MAX)
}

/// Up to `limit` items related to `item`, with the reason for each.
pub fn related_matches<'a>(
    item: &ContentItem,
    collection: &'a [ContentItem],
    limit: usize,
) -> Vec<RelatedMatch<'a>> {
    let mut picked: Vec<RelatedMatch<'a>> = Vec::with_capacity(limit);
    if limit == 0 {
        return picked;
    }

    let mut taken: HashSet<&str> = HashSet::new();
    taken.insert(item.slug.as_str());

    for slug in &item.explicit_related {
        if picked.len() == limit {
            break;
        }
        if taken.contains(slug.as_str()) {
            continue;
        }
        match collection.iter().find(|c| c.slug == *slug) {
            Some(found) => {
                taken.insert(found.slug.as_str());
                picked.push(RelatedMatch {
                    item: found,
                    reason: RelationReason::Explicit,
                });
            }
            None => trace!(from = %item.slug, to = %slug, "explicit related slug not found"),
        }
    }

    if picked.len() >= limit {
        return picked;
    }

    let mut scored: Vec<(u32, &'a ContentItem)> = collection
        .iter()
        .filter(|c| !taken.contains(c.slug.as_str()))
        .map(|c| (relatedness_score(item, c), c))
        .filter(|(score, _)| *score > 0)
        .collect();
    // Stable: equal scores keep collection order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let remaining = limit - picked.len();
    picked.extend(scored.into_iter().take(remaining).map(|(score, c)| RelatedMatch {
        item: c,
        reason: RelationReason::Scored(score),
    }));
    picked
}

/// Up to `limit` items related to `item`.
pub fn related_to<'a>(
    item: &ContentItem,
    collection: &'a [ContentItem],
    limit: usize,
) -> Vec<&'a ContentItem> {
    related_matches(item, collection, limit)
        .into_iter()
        .map(|m| m.item)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::test_items::tagged;

    fn slugs(items: &[&ContentItem]) -> Vec<String> {
        items.iter().map(|i| i.slug.clone()).collect()
    }

    #[test]
    fn category_match_outranks_tag_match() {
        // A: Angst [Panik, Atemtechnik]; B: Angst [Burnout]; C: Depression [Panik, Selbsthilfe]
        let a = tagged("a", 3, "Angst", &["Panik", "Atemtechnik"], &[]);
        let b = tagged("b", 2, "Angst", &["Burnout"], &[]);
        let c = tagged("c", 1, "Depression", &["Panik", "Selbsthilfe"], &[]);
        let collection = vec![a.clone(), b, c];

        assert_eq!(slugs(&related_to(&a, &collection, 2)), vec!["b", "c"]);

        let matches = related_matches(&a, &collection, 2);
        assert_eq!(matches[0].reason, RelationReason::Scored(10));
        assert_eq!(matches[1].reason, RelationReason::Scored(3));
    }

    #[test]
    fn category_alone_beats_two_shared_tags() {
        let item = tagged("item", 5, "Angst", &["x", "y"], &[]);
        let same_category = tagged("kategorie", 1, "Angst", &[], &[]);
        let two_tags = tagged("zwei-tags", 4, "Schlaf", &["x", "y"], &[]);
        assert_eq!(relatedness_score(&item, &same_category), 10);
        assert_eq!(relatedness_score(&item, &two_tags), 6);

        let collection = vec![item.clone(), two_tags, same_category];
        assert_eq!(
            slugs(&related_to(&item, &collection, 2)),
            vec!["kategorie", "zwei-tags"]
        );
    }

    #[test]
    fn zero_score_items_are_excluded_even_when_newest() {
        let item = tagged("item", 5, "Angst", &["Panik"], &["atmung"]);
        let newest_unrelated = tagged("neuester", 30, "Finanzen", &["Geld"], &["budget"]);
        let keyword_only = tagged("stichwort", 1, "Schlaf", &[], &["atmung"]);
        let collection = vec![newest_unrelated, item.clone(), keyword_only];

        let matches = related_matches(&item, &collection, 3);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].item.slug, "stichwort");
        assert_eq!(matches[0].reason, RelationReason::Scored(KEYWORD_WEIGHT));
    }

    #[test]
    fn explicit_links_win_when_they_fill_the_limit() {
        let mut item = tagged("item", 10, "Angst", &["Panik"], &[]);
        item.explicit_related = vec!["fern-1".into(), "fern-2".into()];
        let collection = vec![
            tagged("nah", 9, "Angst", &["Panik"], &[]),
            tagged("fern-1", 8, "Finanzen", &[], &[]),
            tagged("fern-2", 7, "Reisen", &[], &[]),
        ];

        let matches = related_matches(&item, &collection, 2);
        assert_eq!(
            matches.iter().map(|m| m.item.slug.as_str()).collect::<Vec<_>>(),
            vec!["fern-1", "fern-2"]
        );
        assert!(matches.iter().all(|m| m.reason == RelationReason::Explicit));
    }

    #[test]
    fn explicit_order_is_preserved_and_truncated() {
        let mut item = tagged("item", 10, "", &[], &[]);
        item.explicit_related = vec!["c".into(), "a".into(), "b".into()];
        let collection = vec![
            tagged("a", 3, "", &[], &[]),
            tagged("b", 2, "", &[], &[]),
            tagged("c", 1, "", &[], &[]),
        ];
        assert_eq!(slugs(&related_to(&item, &collection, 2)), vec!["c", "a"]);
    }

    #[test]
    fn unresolvable_and_self_links_are_skipped_then_filled() {
        let mut item = tagged("item", 10, "Angst", &[], &[]);
        item.explicit_related = vec!["item".into(), "gibt-es-nicht".into(), "explizit".into()];
        let collection = vec![
            item.clone(),
            tagged("explizit", 9, "Reisen", &[], &[]),
            tagged("gleiche-kategorie", 8, "Angst", &[], &[]),
            tagged("auch-angst", 7, "Angst", &[], &[]),
        ];

        let matches = related_matches(&item, &collection, 3);
        assert_eq!(
            matches.iter().map(|m| m.item.slug.as_str()).collect::<Vec<_>>(),
            vec!["explizit", "gleiche-kategorie", "auch-angst"]
        );
        assert_eq!(matches[0].reason, RelationReason::Explicit);
        assert_eq!(matches[1].reason, RelationReason::Scored(10));
    }

    #[test]
    fn explicit_item_is_not_suggested_twice() {
        let mut item = tagged("item", 10, "Angst", &[], &[]);
        item.explicit_related = vec!["doppelt".into()];
        let collection = vec![tagged("doppelt", 9, "Angst", &[], &[])];

        assert_eq!(slugs(&related_to(&item, &collection, 3)), vec!["doppelt"]);
    }

    #[test]
    fn ties_keep_collection_order() {
        let item = tagged("item", 10, "Angst", &[], &[]);
        let collection = vec![
            tagged("neuer", 9, "Angst", &[], &[]),
            tagged("aelter", 8, "Angst", &[], &[]),
            tagged("am-aeltesten", 7, "Angst", &[], &[]),
        ];
        assert_eq!(
            slugs(&related_to(&item, &collection, DEFAULT_RELATED_LIMIT)),
            vec!["neuer", "aelter", "am-aeltesten"]
        );
    }

    #[test]
    fn empty_category_does_not_count_as_match() {
        let item = tagged("item", 10, "", &[], &[]);
        let other = tagged("other", 9, "", &[], &[]);
        assert_eq!(relatedness_score(&item, &other), 0);
    }

    #[test]
    fn zero_limit_returns_nothing() {
        let mut item = tagged("item", 10, "Angst", &[], &[]);
        item.explicit_related = vec!["a".into()];
        let collection = vec![tagged("a", 1, "Angst", &[], &[])];
        assert!(related_to(&item, &collection, 0).is_empty());
    }
}
