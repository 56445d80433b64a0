//! Source adapters: the static article registry and the persisted store.
//!
//! [`StaticRegistry`] is loaded once at start-up and never changes. The
//! persisted side is any [`PersistedSource`]; [`PersistedAdapter`] wraps it
//! with a timeout and turns every failure into [`SourceOutcome::Degraded`]
//! so callers keep serving static content.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use contentkit_shared::{ContentKitError, PersistedRecord, Result, StaticRecord};
use contentkit_storage::Storage;

// ---------------------------------------------------------------------------
// Static registry
// ---------------------------------------------------------------------------

/// The compiled, immutable set of static articles.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    records: Vec<StaticRecord>,
}

impl StaticRegistry {
    /// Load the registry from a JSON array of static records.
    ///
    /// The file must be an array; entries that do not deserialize as a
    /// record are logged and skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ContentKitError::io(path, e))?;
        let entries: Vec<serde_json::Value> = serde_json::from_str(&content).map_err(|e| {
            ContentKitError::parse(format!("failed to parse {}: {e}", path.display()))
        })?;

        let total = entries.len();
        let records: Vec<StaticRecord> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let slug = entry
                    .get("slug")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                match serde_json::from_value(entry) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!(
                            ?path,
                            index,
                            slug = %slug,
                            error = %e,
                            "skipping malformed static record"
                        );
                        None
                    }
                }
            })
            .collect();

        debug!(
            ?path,
            count = records.len(),
            skipped = total - records.len(),
            "loaded static registry"
        );
        Ok(Self { records })
    }

    pub fn from_records(records: Vec<StaticRecord>) -> Self {
        Self { records }
    }

    /// Every static record. Never fails.
    pub fn list_all(&self) -> &[StaticRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Persisted source
// ---------------------------------------------------------------------------

/// Anything that can list published, non-deleted article records.
pub trait PersistedSource {
    fn list_published(&self) -> impl Future<Output = Result<Vec<PersistedRecord>>>;
}

impl PersistedSource for Storage {
    fn list_published(&self) -> impl Future<Output = Result<Vec<PersistedRecord>>> {
        Storage::list_published(self)
    }
}

/// `None` stands for "no store configured" and always reports an error.
impl<S: PersistedSource> PersistedSource for Option<S> {
    fn list_published(&self) -> impl Future<Output = Result<Vec<PersistedRecord>>> {
        async move {
            match self {
                Some(source) => source.list_published().await,
                None => Err(ContentKitError::Storage(
                    "persisted store not configured".into(),
                )),
            }
        }
    }
}

/// Result of reading a source that is allowed to fail.
#[derive(Debug, Clone)]
pub enum SourceOutcome {
    Ok(Vec<PersistedRecord>),
    Degraded { reason: String },
}

impl SourceOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// The records, or nothing when degraded.
    pub fn into_records(self) -> Vec<PersistedRecord> {
        match self {
            Self::Ok(records) => records,
            Self::Degraded { .. } => Vec::new(),
        }
    }
}

/// Fail-open, time-bounded wrapper around a [`PersistedSource`].
#[derive(Debug)]
pub struct PersistedAdapter<S> {
    source: S,
    timeout: Duration,
}

impl<S: PersistedSource> PersistedAdapter<S> {
    pub fn new(source: S, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// List published records. Never returns an error: store failures and
    /// timeouts are logged and reported as [`SourceOutcome::Degraded`].
    #[instrument(skip_all, fields(timeout_ms = self.timeout.as_millis() as u64))]
    pub async fn list_all(&self) -> SourceOutcome {
        let error = match tokio::time::timeout(self.timeout, self.source.list_published()).await {
            Ok(Ok(records)) => {
                debug!(count = records.len(), "persisted records fetched");
                return SourceOutcome::Ok(records);
            }
            Ok(Err(e)) => e,
            Err(_) => ContentKitError::Timeout {
                operation: "list_published".into(),
                millis: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            },
        };

        warn!(error = %error, "persisted store unavailable, serving static content only");
        SourceOutcome::Degraded {
            reason: error.to_string(),
        }
    }
}
