//! Content aggregation and relevance for contentkit.
//!
//! This crate ties the static registry and the persisted store together
//! into one recency-ordered collection, suggests related articles, and
//! filters UI fragments by capability flags.

pub mod capability;
pub mod merge;
pub mod normalize;
pub mod related;
pub mod service;
pub mod sources;

pub use capability::{
    Benefit, ContentFragment, FragmentSet, GatedClause, NavItem, TextBlock, benefit_visible,
    faq_visible, filter_benefits, filter_faq, filter_fragments, filter_navigation, nav_visible,
    rewrite_text, route_capability,
};
pub use merge::{ContentCollection, merge};
pub use normalize::{normalize, normalize_batch};
pub use related::{
    DEFAULT_RELATED_LIMIT, RelatedMatch, RelationReason, related_matches, related_to,
    relatedness_score,
};
pub use service::{ContentService, ContentSnapshot, SourceStatus};
pub use sources::{PersistedAdapter, PersistedSource, SourceOutcome, StaticRegistry};
