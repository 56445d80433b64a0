//! Content service: sources → normalizer → merge, plus relatedness lookups.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use contentkit_shared::{ContentItem, RawRecord};

use crate::merge::ContentCollection;
use crate::normalize::normalize_batch;
use crate::related::{DEFAULT_RELATED_LIMIT, related_to};
use crate::sources::{PersistedAdapter, PersistedSource, SourceOutcome, StaticRegistry};

/// State of the persisted source for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SourceStatus {
    /// The store answered with this many records (before normalization).
    Live { records: usize },
    /// The store failed or timed out; only static content is served.
    Degraded { reason: String },
}

/// The merged collection for one request plus how it was obtained.
#[derive(Debug, Clone)]
pub struct ContentSnapshot {
    pub collection: ContentCollection,
    pub persisted: SourceStatus,
}

/// Aggregates static and persisted articles.
///
/// Static records are normalized once, at construction; persisted records
/// are fetched on every call.
#[derive(Debug)]
pub struct ContentService<S> {
    registry: Arc<StaticRegistry>,
    static_items: Arc<[ContentItem]>,
    persisted: PersistedAdapter<S>,
    default_limit: usize,
}

impl<S: PersistedSource> ContentService<S> {
    pub fn new(registry: Arc<StaticRegistry>, persisted: PersistedAdapter<S>) -> Self {
        let static_items: Arc<[ContentItem]> = normalize_batch(
            registry
                .list_all()
                .iter()
                .cloned()
                .map(RawRecord::Static),
        )
        .into();
        info!(
            registry = registry.len(),
            normalized = static_items.len(),
            "static content ready"
        );
        Self {
            registry,
            static_items,
            persisted,
            default_limit: DEFAULT_RELATED_LIMIT,
        }
    }

    /// Override the related-items limit used when callers pass `None`.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn registry(&self) -> &StaticRegistry {
        &self.registry
    }

    /// Normalized static items, in registry order.
    pub fn static_items(&self) -> &[ContentItem] {
        &self.static_items
    }

    /// Fetch persisted content and merge it with the static set.
    #[instrument(skip_all)]
    pub async fn snapshot(&self) -> ContentSnapshot {
        let outcome = self.persisted.list_all().await;
        let persisted = match &outcome {
            SourceOutcome::Ok(records) => SourceStatus::Live {
                records: records.len(),
            },
            SourceOutcome::Degraded { reason } => SourceStatus::Degraded {
                reason: reason.clone(),
            },
        };

        let persisted_items =
            normalize_batch(outcome.into_records().into_iter().map(RawRecord::Persisted));
        let collection =
            ContentCollection::from_sources(self.static_items.to_vec(), persisted_items);

        ContentSnapshot {
            collection,
            persisted,
        }
    }

    /// All content, newest first. Never fails.
    pub async fn get_all_content(&self) -> ContentCollection {
        self.snapshot().await.collection
    }

    pub async fn get_by_slug(&self, slug: &str) -> Option<ContentItem> {
        self.get_all_content().await.by_slug(slug).cloned()
    }

    /// Items related to the article at `slug`. Empty if the slug is unknown.
    pub async fn get_related(&self, slug: &str, limit: Option<usize>) -> Vec<ContentItem> {
        let collection = self.get_all_content().await;
        let Some(item) = collection.by_slug(slug) else {
            return Vec::new();
        };
        related_to(item, collection.items(), limit.unwrap_or(self.default_limit))
            .into_iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use contentkit_shared::{PersistedRecord, Provenance};

    use super::*;
    use crate::merge::merge;
    use crate::sources::test_sources::{FailingSource, FixedSource, HangingSource};

    fn registry() -> Arc<StaticRegistry> {
        Arc::new(
            StaticRegistry::load(Path::new("../../../fixtures/json/articles.fixture.json"))
                .expect("load fixture"),
        )
    }

    fn persisted(slug: &str, day: u32, category: &str, tags: &[&str]) -> PersistedRecord {
        PersistedRecord {
            id: format!("id-{slug}"),
            slug: slug.into(),
            title: format!("Titel {slug}"),
            excerpt: None,
            content: String::new(),
            author_id: None,
            author_display_name: None,
            author_image: None,
            author_title: None,
            published_at: Some(Utc.with_ymd_and_hms(2024, 4, day, 12, 0, 0).unwrap()),
            created_at: Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap(),
            updated_at: None,
            keywords: vec![],
            tags: tags.iter().map(|t| t.to_string()).collect(),
            category: Some(category.into()),
            featured_image_url: None,
            featured_image_alt: None,
            summary_points: vec![],
            faq: None,
            related_slugs: vec![],
        }
    }

    #[tokio::test]
    async fn failing_store_yields_exactly_the_static_set() {
        let service = ContentService::new(
            registry(),
            PersistedAdapter::new(FailingSource, Duration::from_secs(1)),
        );

        let snapshot = service.snapshot().await;
        assert!(matches!(snapshot.persisted, SourceStatus::Degraded { .. }));

        let expected = merge(service.static_items().to_vec(), vec![]);
        assert_eq!(snapshot.collection.items(), expected.as_slice());
        assert_eq!(snapshot.collection.len(), 4);
        assert!(
            snapshot
                .collection
                .iter()
                .all(|i| i.provenance == Provenance::Static)
        );
    }

    #[tokio::test]
    async fn hanging_store_degrades_within_timeout() {
        let service = ContentService::new(
            registry(),
            PersistedAdapter::new(HangingSource, Duration::from_millis(20)),
        );
        let all = service.get_all_content().await;
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn persisted_items_are_merged_by_recency() {
        let service = ContentService::new(
            registry(),
            PersistedAdapter::new(
                FixedSource(vec![persisted("schlaf-und-angst", 20, "Angst", &["Panik"])]),
                Duration::from_secs(1),
            ),
        );

        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.persisted, SourceStatus::Live { records: 1 });
        let slugs: Vec<_> = snapshot.collection.iter().map(|i| i.slug.as_str()).collect();
        assert_eq!(
            slugs,
            vec![
                "schlaf-und-angst",
                "panikattacken-verstehen",
                "burnout-erkennen",
                "atemuebungen-bei-angst",
                "depression-im-alltag",
            ]
        );
    }

    #[tokio::test]
    async fn persisted_record_shadows_static_slug() {
        let service = ContentService::new(
            registry(),
            PersistedAdapter::new(
                FixedSource(vec![persisted("burnout-erkennen", 2, "Stress", &[])]),
                Duration::from_secs(1),
            ),
        );
        let item = service.get_by_slug("burnout-erkennen").await.expect("present");
        assert_eq!(item.provenance, Provenance::Persisted);
        assert_eq!(service.get_all_content().await.len(), 4);
    }

    #[tokio::test]
    async fn related_prefers_explicit_then_scores() {
        let service = ContentService::new(
            registry(),
            PersistedAdapter::new(None::<FixedSource>, Duration::from_secs(1)),
        );

        // Explicit link to atemuebungen-bei-angst, then the highest scorer.
        let related = service.get_related("panikattacken-verstehen", None).await;
        let slugs: Vec<_> = related.iter().map(|i| i.slug.as_str()).collect();
        assert_eq!(slugs, vec!["atemuebungen-bei-angst"]);

        assert!(service.get_related("unbekannt", Some(3)).await.is_empty());
    }

    #[tokio::test]
    async fn malformed_persisted_records_are_dropped() {
        let mut broken = persisted("kaputt", 5, "Angst", &[]);
        broken.title = String::new();
        let service = ContentService::new(
            registry(),
            PersistedAdapter::new(
                FixedSource(vec![broken, persisted("heil", 6, "Angst", &[])]),
                Duration::from_secs(1),
            ),
        )
        .with_default_limit(2);

        let all = service.get_all_content().await;
        assert!(all.by_slug("kaputt").is_none());
        assert!(all.by_slug("heil").is_some());
        assert_eq!(service.get_related("heil", None).await.len(), 2);
    }
}
