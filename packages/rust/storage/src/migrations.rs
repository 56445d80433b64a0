//! SQL migration definitions for the ContentKit article database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: authors, articles, article_relations",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Author profiles
CREATE TABLE IF NOT EXISTS authors (
    id           TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    image        TEXT,
    title        TEXT
);

-- Editorial articles
CREATE TABLE IF NOT EXISTS articles (
    id                  TEXT PRIMARY KEY,
    slug                TEXT NOT NULL UNIQUE,
    title               TEXT NOT NULL,
    excerpt             TEXT,
    content             TEXT NOT NULL DEFAULT '',
    author_id           TEXT REFERENCES authors(id) ON DELETE SET NULL,
    status              TEXT NOT NULL DEFAULT 'draft',
    published_at        TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT,
    deleted_at          TEXT,
    keywords_json       TEXT NOT NULL DEFAULT '[]',
    tags_json           TEXT NOT NULL DEFAULT '[]',
    category            TEXT,
    featured_image_url  TEXT,
    featured_image_alt  TEXT,
    summary_points_json TEXT NOT NULL DEFAULT '[]',
    faq_json            TEXT
);

CREATE INDEX IF NOT EXISTS idx_articles_visible ON articles(status, deleted_at);

-- Author-declared related articles, by slug, in declared order
CREATE TABLE IF NOT EXISTS article_relations (
    article_id   TEXT NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
    related_slug TEXT NOT NULL,
    position     INTEGER NOT NULL,
    PRIMARY KEY (article_id, related_slug)
);

CREATE INDEX IF NOT EXISTS idx_relations_article ON article_relations(article_id, position);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
    ]
}
