//! libSQL storage layer for persisted editorial articles.
//!
//! The [`Storage`] struct wraps a libSQL database holding authors, articles,
//! and author-declared article relations.
//!
//! **Access rules:**
//! - Content import / editorial tooling: read-write via [`Storage::open`]
//! - Site rendering: read-only via [`Storage::open_readonly`]

mod migrations;

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use contentkit_shared::{ContentKitError, FaqEntry, PersistedRecord, Result};
use libsql::{Connection, Database, params};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Write-side types
// ---------------------------------------------------------------------------

/// Publication state of an article row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Draft,
    Published,
}

impl ArticleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }
}

/// An author profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// An article to insert or update (keyed by slug).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleInput {
    /// Row id for new articles. Generated (UUID v7) when absent.
    #[serde(default)]
    pub id: Option<String>,
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
    pub status: ArticleStatus,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
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

/// A JSON import file: authors first, then the articles referencing them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportBundle {
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub articles: Vec<ArticleInput>,
}

/// Counts reported by [`Storage::import_bundle`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub authors: usize,
    pub articles: usize,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("readonly", &self.readonly)
            .finish_non_exhaustive()
    }
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ContentKitError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(ContentKitError::storage)?;

        let conn = db.connect().map_err(ContentKitError::storage)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` for reads only.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ContentKitError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(ContentKitError::storage)?;

        let conn = db.connect().map_err(ContentKitError::storage)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ContentKitError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ContentKitError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Author operations
    // -----------------------------------------------------------------------

    /// Insert or update an author profile.
    pub async fn upsert_author(&self, author: &Author) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO authors (id, display_name, image, title)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                   display_name = excluded.display_name,
                   image = excluded.image,
                   title = excluded.title",
                params![
                    author.id.as_str(),
                    author.display_name.as_str(),
                    author.image.as_deref(),
                    author.title.as_deref(),
                ],
            )
            .await
            .map_err(ContentKitError::storage)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Article operations
    // -----------------------------------------------------------------------

    /// Insert or update an article by slug, replacing its related slugs.
    /// Returns the row id. Updating clears a previous soft delete.
    pub async fn upsert_article(&self, article: &ArticleInput) -> Result<String> {
        self.check_writable()?;
        let new_id = article
            .id
            .clone()
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                "INSERT INTO articles (id, slug, title, excerpt, content, author_id, status,
                   published_at, created_at, updated_at, keywords_json, tags_json, category,
                   featured_image_url, featured_image_alt, summary_points_json, faq_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                 ON CONFLICT(slug) DO UPDATE SET
                   title = excluded.title,
                   excerpt = excluded.excerpt,
                   content = excluded.content,
                   author_id = excluded.author_id,
                   status = excluded.status,
                   published_at = excluded.published_at,
                   updated_at = COALESCE(excluded.updated_at, ?9),
                   deleted_at = NULL,
                   keywords_json = excluded.keywords_json,
                   tags_json = excluded.tags_json,
                   category = excluded.category,
                   featured_image_url = excluded.featured_image_url,
                   featured_image_alt = excluded.featured_image_alt,
                   summary_points_json = excluded.summary_points_json,
                   faq_json = excluded.faq_json",
                params![
                    new_id.as_str(),
                    article.slug.as_str(),
                    article.title.as_str(),
                    article.excerpt.as_deref(),
                    article.content.as_str(),
                    article.author_id.as_deref(),
                    article.status.as_str(),
                    article.published_at.map(|t| t.to_rfc3339()),
                    now.as_str(),
                    article.updated_at.map(|t| t.to_rfc3339()),
                    to_json(&article.keywords)?,
                    to_json(&article.tags)?,
                    article.category.as_deref(),
                    article.featured_image_url.as_deref(),
                    article.featured_image_alt.as_deref(),
                    to_json(&article.summary_points)?,
                    article.faq.as_ref().map(to_json).transpose()?,
                ],
            )
            .await
            .map_err(ContentKitError::storage)?;

        let id = self
            .article_id_by_slug(&article.slug)
            .await?
            .ok_or_else(|| {
                ContentKitError::Storage(format!("article '{}' vanished after upsert", article.slug))
            })?;
        self.set_related_slugs(&id, &article.related_slugs).await?;
        Ok(id)
    }

    /// Look up an article's row id by slug (including drafts and deleted rows).
    pub async fn article_id_by_slug(&self, slug: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT id FROM articles WHERE slug = ?1", params![slug])
            .await
            .map_err(ContentKitError::storage)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row.get::<String>(0).map_err(ContentKitError::storage)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(ContentKitError::storage(e)),
        }
    }

    /// Replace an article's related slugs, keeping the given order.
    pub async fn set_related_slugs(&self, article_id: &str, slugs: &[String]) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "DELETE FROM article_relations WHERE article_id = ?1",
                params![article_id],
            )
            .await
            .map_err(ContentKitError::storage)?;

        let mut position: i64 = 0;
        for slug in slugs {
            // First occurrence wins; the primary key rejects repeats.
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO article_relations (article_id, related_slug, position)
                     VALUES (?1, ?2, ?3)",
                    params![article_id, slug.as_str(), position],
                )
                .await
                .map_err(ContentKitError::storage)?;
            position += 1;
        }
        Ok(())
    }

    /// Soft-delete an article by slug. Returns whether a row was affected.
    pub async fn soft_delete_article(&self, slug: &str) -> Result<bool> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn
            .execute(
                "UPDATE articles SET deleted_at = ?1 WHERE slug = ?2 AND deleted_at IS NULL",
                params![now.as_str(), slug],
            )
            .await
            .map_err(ContentKitError::storage)?;
        Ok(affected > 0)
    }

    /// Import a bundle of authors and articles.
    pub async fn import_bundle(&self, bundle: &ImportBundle) -> Result<ImportStats> {
        self.check_writable()?;
        let mut stats = ImportStats::default();
        for author in &bundle.authors {
            self.upsert_author(author).await?;
            stats.authors += 1;
        }
        for article in &bundle.articles {
            self.upsert_article(article).await?;
            stats.articles += 1;
        }
        tracing::info!(authors = stats.authors, articles = stats.articles, "import finished");
        Ok(stats)
    }

    // -----------------------------------------------------------------------
    // Read operations
    // -----------------------------------------------------------------------

    /// List every published, non-deleted article with its author projection
    /// and explicit related slugs.
    pub async fn list_published(&self) -> Result<Vec<PersistedRecord>> {
        let mut related = self.published_relations().await?;

        let mut rows = self
            .conn
            .query(
                "SELECT a.id, a.slug, a.title, a.excerpt, a.content, a.author_id,
                        au.display_name, au.image, au.title,
                        a.published_at, a.created_at, a.updated_at,
                        a.keywords_json, a.tags_json, a.category,
                        a.featured_image_url, a.featured_image_alt,
                        a.summary_points_json, a.faq_json
                 FROM articles a
                 LEFT JOIN authors au ON au.id = a.author_id
                 WHERE a.status = 'published' AND a.deleted_at IS NULL
                 ORDER BY a.published_at DESC, a.slug",
                params![],
            )
            .await
            .map_err(ContentKitError::storage)?;

        let mut results = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => {
                    let mut record = row_to_persisted_record(&row)?;
                    record.related_slugs = related.remove(&record.id).unwrap_or_default();
                    results.push(record);
                }
                Ok(None) => break,
                Err(e) => return Err(ContentKitError::storage(e)),
            }
        }
        tracing::debug!(count = results.len(), "listed published articles");
        Ok(results)
    }

    /// Number of published, non-deleted articles.
    pub async fn count_published(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM articles WHERE status = 'published' AND deleted_at IS NULL",
                params![],
            )
            .await
            .map_err(ContentKitError::storage)?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row.get(0).map_err(ContentKitError::storage)?;
                Ok(u64::try_from(count).unwrap_or(0))
            }
            Ok(None) => Ok(0),
            Err(e) => Err(ContentKitError::storage(e)),
        }
    }

    /// Related slugs of all visible articles, grouped by article id.
    async fn published_relations(&self) -> Result<HashMap<String, Vec<String>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT r.article_id, r.related_slug
                 FROM article_relations r
                 JOIN articles a ON a.id = r.article_id
                 WHERE a.status = 'published' AND a.deleted_at IS NULL
                 ORDER BY r.article_id, r.position",
                params![],
            )
            .await
            .map_err(ContentKitError::storage)?;

        let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => {
                    let article_id: String = row.get(0).map_err(ContentKitError::storage)?;
                    let slug: String = row.get(1).map_err(ContentKitError::storage)?;
                    grouped.entry(article_id).or_default().push(slug);
                }
                Ok(None) => break,
                Err(e) => return Err(ContentKitError::storage(e)),
            }
        }
        Ok(grouped)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| ContentKitError::Storage(format!("encode json: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(column: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| ContentKitError::Storage(format!("invalid json in {column}: {e}")))
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ContentKitError::Storage(format!("invalid date in {column}: {e}")))
}

fn optional_timestamp(row: &libsql::Row, idx: i32, column: &str) -> Result<Option<DateTime<Utc>>> {
    row.get::<String>(idx)
        .ok()
        .map(|s| parse_timestamp(column, &s))
        .transpose()
}

/// Convert a joined article row to a [`PersistedRecord`] (without relations).
fn row_to_persisted_record(row: &libsql::Row) -> Result<PersistedRecord> {
    let created_raw: String = row.get(10).map_err(ContentKitError::storage)?;
    let keywords_raw: String = row.get(12).map_err(ContentKitError::storage)?;
    let tags_raw: String = row.get(13).map_err(ContentKitError::storage)?;
    let summary_raw: String = row.get(17).map_err(ContentKitError::storage)?;

    Ok(PersistedRecord {
        id: row.get::<String>(0).map_err(ContentKitError::storage)?,
        slug: row.get::<String>(1).map_err(ContentKitError::storage)?,
        title: row.get::<String>(2).map_err(ContentKitError::storage)?,
        excerpt: row.get::<String>(3).ok(),
        content: row.get::<String>(4).unwrap_or_default(),
        author_id: row.get::<String>(5).ok(),
        author_display_name: row.get::<String>(6).ok(),
        author_image: row.get::<String>(7).ok(),
        author_title: row.get::<String>(8).ok(),
        published_at: optional_timestamp(row, 9, "published_at")?,
        created_at: parse_timestamp("created_at", &created_raw)?,
        updated_at: optional_timestamp(row, 11, "updated_at")?,
        keywords: from_json("keywords_json", &keywords_raw)?,
        tags: from_json("tags_json", &tags_raw)?,
        category: row.get::<String>(14).ok(),
        featured_image_url: row.get::<String>(15).ok(),
        featured_image_alt: row.get::<String>(16).ok(),
        summary_points: from_json("summary_points_json", &summary_raw)?,
        faq: row
            .get::<String>(18)
            .ok()
            .map(|raw| from_json("faq_json", &raw))
            .transpose()?,
        related_slugs: Vec::new(),
    })
}
