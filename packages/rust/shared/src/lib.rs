//! Shared types, error model, and configuration for ContentKit.
//!
//! This crate is the foundation depended on by all other ContentKit crates.
//! It provides:
//! - [`ContentKitError`], the unified error type
//! - Domain types ([`ContentItem`], [`StaticRecord`], [`PersistedRecord`], [`RawRecord`])
//! - Capability flags ([`Capability`], [`FeatureFlagSet`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod flags;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ContentConfig, RelatedConfig, StoreConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_config,
};
pub use error::{ContentKitError, Result};
pub use flags::{Capability, FeatureFlagSet, lenient_capability, parse_flag_value};
pub use types::{
    AuthorRef, ContentItem, EDITORIAL_AUTHOR_ID, FaqEntry, FeaturedImage, PersistedRecord,
    Provenance, RawRecord, Section, SectionImage, StaticRecord,
};
