//! Record normalizer: static and persisted records → [`ContentItem`].
//!
//! This is the only code that matches on [`RawRecord`]. It is pure: no I/O,
//! no shared state. A record missing a required field is rejected with a
//! validation error; [`normalize_batch`] logs and drops such records.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use tracing::{debug, warn};

use contentkit_shared::{
    AuthorRef, ContentItem, ContentKitError, EDITORIAL_AUTHOR_ID, FeaturedImage, PersistedRecord,
    Provenance, RawRecord, Result, Section, SectionImage, StaticRecord,
};

static SLUG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug regex"));

static IMAGE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!\[([^\]]*)\]\(([^)\s]+)\)$").expect("valid image regex"));

/// Normalize one record from either source.
pub fn normalize(record: RawRecord) -> Result<ContentItem> {
    match record {
        RawRecord::Static(r) => normalize_static(r),
        RawRecord::Persisted(r) => normalize_persisted(r),
    }
}

/// Normalize a batch, dropping malformed records with a warning.
pub fn normalize_batch(records: impl IntoIterator<Item = RawRecord>) -> Vec<ContentItem> {
    let mut items = Vec::new();
    let mut dropped = 0usize;
    for record in records {
        let provenance = record.provenance();
        let slug = record.slug_hint().to_string();
        match normalize(record) {
            Ok(item) => items.push(item),
            Err(e) => {
                dropped += 1;
                warn!(%provenance, slug = %slug, error = %e, "dropping malformed content record");
            }
        }
    }
    debug!(kept = items.len(), dropped, "normalized batch");
    items
}

fn normalize_static(record: StaticRecord) -> Result<ContentItem> {
    let slug = required_slug(record.slug.as_deref())?;
    let title = required_title(&slug, record.title.as_deref())?;

    let published_at = [
        ("published_at", record.published_at.as_deref()),
        ("created_at", record.created_at.as_deref()),
    ]
    .into_iter()
    .filter_map(|(field, raw)| raw.map(|raw| (field, raw)))
    .find_map(|(field, raw)| match parse_timestamp(raw) {
        Ok(ts) => Some(ts),
        Err(e) => {
            debug!(slug = %slug, field, error = %e, "ignoring unparseable timestamp");
            None
        }
    })
    .ok_or_else(|| {
        ContentKitError::validation(format!(
            "static record '{slug}' has no usable published_at or created_at"
        ))
    })?;
    let updated_at = record
        .updated_at
        .as_deref()
        .and_then(|raw| match parse_timestamp(raw) {
            Ok(ts) => Some(ts),
            Err(e) => {
                debug!(slug = %slug, error = %e, "ignoring unparseable updated_at");
                None
            }
        })
        .unwrap_or(published_at);

    let author = match record.author {
        Some(name) if !name.trim().is_empty() => AuthorRef {
            id: name.clone(),
            name: Some(name),
            image: None,
            title: None,
        },
        _ => editorial_author(None),
    };

    Ok(ContentItem {
        // Static records have no identity of their own.
        id: slug.clone(),
        slug,
        title,
        excerpt: record.excerpt.unwrap_or_default(),
        body: record.sections,
        category: record.category.unwrap_or_default(),
        tags: dedup_preserving(record.tags),
        keywords: dedup_preserving(record.keywords),
        published_at,
        updated_at,
        author,
        explicit_related: dedup_preserving(record.related),
        featured_image: record.featured_image,
        summary_points: record.summary_points,
        faq: record.faq,
        provenance: Provenance::Static,
    })
}

fn normalize_persisted(record: PersistedRecord) -> Result<ContentItem> {
    let slug = required_slug(Some(&record.slug))?;
    let title = required_title(&slug, Some(&record.title))?;

    let published_at = record.published_at.unwrap_or(record.created_at);
    let updated_at = record.updated_at.unwrap_or(published_at);

    let author = match record.author_id {
        Some(id) => AuthorRef {
            id,
            name: record.author_display_name,
            image: record.author_image,
            title: record.author_title,
        },
        None => editorial_author(record.author_display_name),
    };

    let featured_image = record.featured_image_url.map(|url| FeaturedImage {
        url,
        alt: record.featured_image_alt.unwrap_or_default(),
    });

    Ok(ContentItem {
        id: record.id,
        slug,
        title,
        excerpt: record.excerpt.unwrap_or_default(),
        body: sections_from_markdown(&record.content),
        category: record.category.unwrap_or_default(),
        tags: dedup_preserving(record.tags),
        keywords: dedup_preserving(record.keywords),
        published_at,
        updated_at,
        author,
        explicit_related: dedup_preserving(record.related_slugs),
        featured_image,
        summary_points: record.summary_points,
        faq: record.faq.unwrap_or_default(),
        provenance: Provenance::Persisted,
    })
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn required_slug(raw: Option<&str>) -> Result<String> {
    let slug = raw.map(str::trim).unwrap_or_default();
    if slug.is_empty() {
        return Err(ContentKitError::validation("record has no slug"));
    }
    if !SLUG_PATTERN.is_match(slug) {
        return Err(ContentKitError::validation(format!(
            "slug '{slug}' is not URL-safe"
        )));
    }
    Ok(slug.to_string())
}

fn required_title(slug: &str, raw: Option<&str>) -> Result<String> {
    match raw.map(str::trim) {
        Some(title) if !title.is_empty() => Ok(title.to_string()),
        _ => Err(ContentKitError::validation(format!(
            "record '{slug}' has no title"
        ))),
    }
}

fn editorial_author(name: Option<String>) -> AuthorRef {
    AuthorRef {
        id: EDITORIAL_AUTHOR_ID.to_string(),
        name,
        image: None,
        title: None,
    }
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ContentKitError::validation(format!("invalid timestamp '{raw}'")))
}

/// Drop empty strings and repeats, keeping first occurrences. Case-sensitive.
fn dedup_preserving(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| !v.is_empty() && seen.insert(v.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Markdown body → sections
// ---------------------------------------------------------------------------

/// Split a Markdown body into sections.
///
/// `#`–`###` lines open a section, blank lines end paragraphs, `- `/`* `
/// lines build the section list and a lone `![alt](src)` line becomes the
/// section image. A fenced code block is kept verbatim as one paragraph. Text before the first heading forms a lead section with an
/// empty heading.
pub fn sections_from_markdown(markdown: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section::default();
    let mut paragraph: Vec<&str> = Vec::new();
    // Lines of an open ``` / ~~~ block, fences included.
    let mut code: Option<Vec<&str>> = None;

    for raw in markdown.lines() {
        let line = raw.trim();

        if let Some(block) = code.as_mut() {
            block.push(raw);
            if is_fence(line) {
                current.paragraphs.push(block.join("\n"));
                code = None;
            }
            continue;
        }

        if is_fence(line) {
            flush_paragraph(&mut current, &mut paragraph);
            code = Some(vec![raw]);
            continue;
        }

        if let Some(heading) = heading_text(line) {
            flush_paragraph(&mut current, &mut paragraph);
            if !section_is_empty(&current) {
                sections.push(std::mem::take(&mut current));
            }
            current.heading = heading.to_string();
            continue;
        }

        if line.is_empty() {
            flush_paragraph(&mut current, &mut paragraph);
            continue;
        }

        if let Some(item) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            flush_paragraph(&mut current, &mut paragraph);
            current
                .list
                .get_or_insert_with(Vec::new)
                .push(item.trim().to_string());
            continue;
        }

        if let Some(caps) = IMAGE_LINE.captures(line) {
            flush_paragraph(&mut current, &mut paragraph);
            current.image = Some(SectionImage {
                src: caps[2].to_string(),
                alt: caps[1].to_string(),
                caption: None,
            });
            continue;
        }

        paragraph.push(line);
    }

    flush_paragraph(&mut current, &mut paragraph);
    if let Some(block) = code {
        // Unterminated fence: keep what was there.
        current.paragraphs.push(block.join("\n"));
    }
    if !section_is_empty(&current) {
        sections.push(current);
    }
    sections
}

fn is_fence(line: &str) -> bool {
    line.starts_with("```") || line.starts_with("~~~")
}

fn heading_text(line: &str) -> Option<&str> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if !(1..=3).contains(&hashes) {
        return None;
    }
    line[hashes..]
        .strip_prefix(' ')
        .map(str::trim)
        .filter(|h| !h.is_empty())
}

fn flush_paragraph(section: &mut Section, lines: &mut Vec<&str>) {
    if !lines.is_empty() {
        section.paragraphs.push(lines.join(" "));
        lines.clear();
    }
}

fn section_is_empty(section: &Section) -> bool {
    section.heading.is_empty()
        && section.paragraphs.is_empty()
        && section.list.is_none()
        && section.image.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn persisted(slug: &str) -> PersistedRecord {
        PersistedRecord {
            id: "0190a1b2-0000-7000-8000-000000000001".into(),
            slug: slug.into(),
            title: "Schlaf und Angst".into(),
            excerpt: None,
            content: String::new(),
            author_id: None,
            author_display_name: None,
            author_image: None,
            author_title: None,
            published_at: None,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            updated_at: None,
            keywords: vec![],
            tags: vec![],
            category: None,
            featured_image_url: None,
            featured_image_alt: None,
            summary_points: vec![],
            faq: None,
            related_slugs: vec![],
        }
    }

    #[test]
    fn static_record_uses_slug_as_id() {
        let item = normalize(RawRecord::Static(StaticRecord {
            slug: Some("panik".into()),
            title: Some("Panik".into()),
            published_at: Some("2024-03-10".into()),
            author: Some("Dr. Lena Hoffmann".into()),
            ..Default::default()
        }))
        .expect("normalize");

        assert_eq!(item.id, "panik");
        assert_eq!(item.provenance, Provenance::Static);
        assert_eq!(
            item.published_at,
            Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()
        );
        assert_eq!(item.updated_at, item.published_at);
        assert_eq!(item.author.name.as_deref(), Some("Dr. Lena Hoffmann"));
        assert!(item.tags.is_empty());
        assert!(item.explicit_related.is_empty());
    }

    #[test]
    fn static_record_falls_back_to_created_at() {
        let item = normalize(RawRecord::Static(StaticRecord {
            slug: Some("ohne-datum".into()),
            title: Some("Ohne Datum".into()),
            created_at: Some("2023-12-01T08:30:00+01:00".into()),
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(
            item.published_at,
            Utc.with_ymd_and_hms(2023, 12, 1, 7, 30, 0).unwrap()
        );
        assert_eq!(item.author.id, EDITORIAL_AUTHOR_ID);
    }

    #[test]
    fn unparseable_published_at_falls_back_to_created_at() {
        let record = StaticRecord {
            slug: Some("falsches-datum".into()),
            title: Some("Falsches Datum".into()),
            published_at: Some("10.03.2024".into()),
            created_at: Some("2024-03-09".into()),
            ..Default::default()
        };
        let item = normalize(RawRecord::Static(record.clone())).expect("normalize");
        assert_eq!(
            item.published_at,
            Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap()
        );

        let neither = StaticRecord {
            created_at: Some("gestern".into()),
            ..record
        };
        assert!(normalize(RawRecord::Static(neither)).is_err());
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let no_slug = RawRecord::Static(StaticRecord {
            title: Some("Titel".into()),
            published_at: Some("2024-01-01".into()),
            ..Default::default()
        });
        assert!(normalize(no_slug).is_err());

        let no_title = RawRecord::Persisted(PersistedRecord {
            title: "   ".into(),
            ..persisted("leer")
        });
        assert!(normalize(no_title).is_err());

        let bad_slug = RawRecord::Persisted(persisted("Nicht URL sicher"));
        let err = normalize(bad_slug).unwrap_err();
        assert!(err.to_string().contains("not URL-safe"));
    }

    #[test]
    fn persisted_record_keeps_identity_and_profile() {
        let record = PersistedRecord {
            author_id: Some("author-7".into()),
            author_display_name: Some("Jonas Weber".into()),
            author_title: Some("Coach".into()),
            updated_at: Some(Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()),
            featured_image_url: Some("/img/schlaf.webp".into()),
            tags: vec!["Schlaf".into(), "Schlaf".into(), "schlaf".into()],
            related_slugs: vec!["a".into(), "".into(), "b".into(), "a".into()],
            ..persisted("schlaf-und-angst")
        };
        let item = normalize(RawRecord::Persisted(record)).unwrap();

        assert_eq!(item.id, "0190a1b2-0000-7000-8000-000000000001");
        assert_eq!(item.provenance, Provenance::Persisted);
        // published_at absent: falls back to created_at
        assert_eq!(
            item.published_at,
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(
            item.updated_at,
            Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(item.author.id, "author-7");
        assert_eq!(item.author.title.as_deref(), Some("Coach"));
        assert_eq!(item.featured_image.unwrap().alt, "");
        assert_eq!(item.tags, vec!["Schlaf", "schlaf"]);
        assert_eq!(item.explicit_related, vec!["a", "b"]);
        assert!(item.faq.is_empty());
    }

    #[test]
    fn batch_drops_only_malformed_records() {
        let records = vec![
            RawRecord::Persisted(persisted("gut")),
            RawRecord::Persisted(PersistedRecord {
                slug: String::new(),
                ..persisted("x")
            }),
            RawRecord::Static(StaticRecord {
                slug: Some("auch-gut".into()),
                title: Some("Auch gut".into()),
                published_at: Some("2024-02-02".into()),
                ..Default::default()
            }),
        ];
        let items = normalize_batch(records);
        let slugs: Vec<_> = items.iter().map(|i| i.slug.as_str()).collect();
        assert_eq!(slugs, vec!["gut", "auch-gut"]);
    }

    #[test]
    fn markdown_becomes_sections() {
        let md = "Einleitender Satz\nüber zwei Zeilen.\n\n\
                  ## Symptome\n\nHerz und Atem.\n\n- Herzrasen\n- Atemnot\n\n\
                  ## Hilfe\n![Ruhige Atmung](/img/atem.webp)\nLangsam ausatmen.\n";
        let sections = sections_from_markdown(md);

        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].heading, "");
        assert_eq!(sections[0].paragraphs, vec!["Einleitender Satz über zwei Zeilen."]);
        assert_eq!(sections[1].heading, "Symptome");
        assert_eq!(
            sections[1].list.as_deref(),
            Some(&["Herzrasen".to_string(), "Atemnot".to_string()][..])
        );
        let image = sections[2].image.as_ref().expect("image");
        assert_eq!(image.src, "/img/atem.webp");
        assert_eq!(image.alt, "Ruhige Atmung");
        assert_eq!(sections[2].paragraphs, vec!["Langsam ausatmen."]);
    }

    #[test]
    fn markdown_ignores_deep_headings_and_empty_input() {
        assert!(sections_from_markdown("").is_empty());
        let sections = sections_from_markdown("#### Kein Abschnitt");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].heading, "");
        assert_eq!(sections[0].paragraphs, vec!["#### Kein Abschnitt"]);
    }

    #[test]
    fn fenced_code_is_not_split_into_sections() {
        let md = "## Echt\n\nVorher.\n\n```bash\n# kommentar\n- keine liste\n\necho ok\n```\nNachher.";
        let sections = sections_from_markdown(md);

        let headings: Vec<_> = sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["Echt"]);
        assert!(sections[0].list.is_none());
        assert_eq!(
            sections[0].paragraphs,
            vec![
                "Vorher.",
                "```bash\n# kommentar\n- keine liste\n\necho ok\n```",
                "Nachher.",
            ]
        );
    }

    #[test]
    fn timestamps_accept_dates_and_rfc3339() {
        assert!(parse_timestamp("2024-02-18T08:00:00Z").is_ok());
        assert!(parse_timestamp("2024-02-18").is_ok());
        assert!(parse_timestamp("18.02.2024").is_err());
    }
}
