// Transcripts repository for argraph
// Handles conversation session rows and slug lookup

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, params};

use crate::slug;
use super::models::{Transcript, TranscriptSummary};
use super::DatabaseManager;

/// Attempts before giving up on finding an unused slug
const SLUG_ATTEMPTS: usize = 32;

impl DatabaseManager {
    /// Create a new empty session with a fresh unique two-word slug
    pub fn create_transcript(&self, title: &str, source_url: Option<&str>) -> Result<Transcript> {
        self.with_connection(|conn| {
            create_transcript_impl(conn, title, source_url)
        })
    }

    /// Get a transcript by ID
    pub fn get_transcript(&self, id: i64) -> Result<Option<Transcript>> {
        self.with_connection(|conn| {
            get_transcript_impl(conn, id)
        })
    }

    /// Get a transcript by its slug
    pub fn get_transcript_by_slug(&self, slug: &str) -> Result<Option<Transcript>> {
        self.with_connection(|conn| {
            get_transcript_by_slug_impl(conn, slug)
        })
    }

    /// List all transcripts, most recent first
    pub fn list_transcripts(&self) -> Result<Vec<TranscriptSummary>> {
        self.with_connection(list_transcripts_impl)
    }

    /// Update a transcript's title
    pub fn update_title(&self, id: i64, title: &str) -> Result<()> {
        self.with_connection(|conn| {
            update_title_impl(conn, id, title)
        })
    }

    /// Set a transcript's source URL
    pub fn set_source_url(&self, id: i64, url: &str) -> Result<()> {
        self.with_connection(|conn| {
            set_source_url_impl(conn, id, url)
        })
    }
}

fn create_transcript_impl(conn: &Connection, title: &str, source_url: Option<&str>) -> Result<Transcript> {
    let created_at = chrono::Utc::now().to_rfc3339();

    // The slug column is UNIQUE; retry on collision
    for _ in 0..SLUG_ATTEMPTS {
        let candidate = slug::generate();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO transcripts (slug, title, created_at, source_url) VALUES (?1, ?2, ?3, ?4)",
            params![candidate, title, created_at, source_url],
        ).context("Failed to insert transcript")?;

        if inserted == 1 {
            let id = conn.last_insert_rowid();
            log::info!("Created transcript {} ({})", id, candidate);
            return Ok(Transcript {
                id,
                slug: candidate,
                title: title.to_string(),
                created_at,
                source_url: source_url.map(|s| s.to_string()),
            });
        }
    }

    Err(anyhow!("Failed to find an unused slug after {} attempts", SLUG_ATTEMPTS))
}

fn get_transcript_impl(conn: &Connection, id: i64) -> Result<Option<Transcript>> {
    let mut stmt = conn.prepare(
        "SELECT id, slug, title, created_at, source_url FROM transcripts WHERE id = ?"
    ).context("Failed to prepare get_transcript query")?;

    let result = stmt.query_row(params![id], row_to_transcript);

    match result {
        Ok(transcript) => Ok(Some(transcript)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context("Failed to get transcript"),
    }
}

fn get_transcript_by_slug_impl(conn: &Connection, slug: &str) -> Result<Option<Transcript>> {
    let mut stmt = conn.prepare(
        "SELECT id, slug, title, created_at, source_url FROM transcripts WHERE slug = ?"
    ).context("Failed to prepare get_transcript_by_slug query")?;

    let result = stmt.query_row(params![slug], row_to_transcript);

    match result {
        Ok(transcript) => Ok(Some(transcript)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context("Failed to get transcript by slug"),
    }
}

fn row_to_transcript(row: &rusqlite::Row) -> rusqlite::Result<Transcript> {
    Ok(Transcript {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        created_at: row.get(3)?,
        source_url: row.get(4)?,
    })
}

fn list_transcripts_impl(conn: &Connection) -> Result<Vec<TranscriptSummary>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT t.id, t.slug, t.title, t.created_at,
               (SELECT COUNT(*) FROM occurrences o WHERE o.transcript_id = t.id)
        FROM transcripts t
        ORDER BY t.created_at DESC, t.id DESC
        "#
    ).context("Failed to prepare list_transcripts query")?;

    let transcripts = stmt.query_map([], |row| {
        Ok(TranscriptSummary {
            id: row.get(0)?,
            slug: row.get(1)?,
            title: row.get(2)?,
            created_at: row.get(3)?,
            claim_count: row.get(4)?,
        })
    }).context("Failed to query transcripts")?;

    transcripts.collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect transcripts")
}

fn update_title_impl(conn: &Connection, id: i64, title: &str) -> Result<()> {
    conn.execute(
        "UPDATE transcripts SET title = ? WHERE id = ?",
        params![title, id],
    ).context("Failed to update transcript title")?;

    Ok(())
}

fn set_source_url_impl(conn: &Connection, id: i64, url: &str) -> Result<()> {
    conn.execute(
        "UPDATE transcripts SET source_url = ? WHERE id = ?",
        params![url, id],
    ).context("Failed to set transcript source URL")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> DatabaseManager {
        DatabaseManager::new_in_memory().unwrap()
    }

    #[test]
    fn test_create_and_get_transcript() {
        let db = create_test_db();

        let t = db.create_transcript("Test Debate", None).unwrap();
        assert!(t.slug.contains('-'), "slug should be two words with dash, got: {}", t.slug);

        let by_id = db.get_transcript(t.id).unwrap().unwrap();
        assert_eq!(by_id.slug, t.slug);
        assert_eq!(by_id.title, "Test Debate");

        let by_slug = db.get_transcript_by_slug(&t.slug).unwrap().unwrap();
        assert_eq!(by_slug.id, t.id);
    }

    #[test]
    fn test_missing_transcript() {
        let db = create_test_db();
        assert!(db.get_transcript(999).unwrap().is_none());
        assert!(db.get_transcript_by_slug("does-not-exist").unwrap().is_none());
    }

    #[test]
    fn test_unique_slugs() {
        let db = create_test_db();

        let mut seen = std::collections::HashSet::new();
        for i in 0..20 {
            let t = db.create_transcript("", None).unwrap();
            assert!(seen.insert(t.slug.clone()), "duplicate slug after {} creates: {}", i, t.slug);
        }
    }

    #[test]
    fn test_update_title_and_source_url() {
        let db = create_test_db();

        let t = db.create_transcript("", None).unwrap();
        db.update_title(t.id, "Remote Work Debate").unwrap();
        db.set_source_url(t.id, "https://example.com/v/abc").unwrap();

        let got = db.get_transcript(t.id).unwrap().unwrap();
        assert_eq!(got.title, "Remote Work Debate");
        assert_eq!(got.source_url.as_deref(), Some("https://example.com/v/abc"));
    }

    #[test]
    fn test_list_transcripts_includes_empty_sessions() {
        let db = create_test_db();

        db.create_transcript("", None).unwrap();
        db.create_transcript("", None).unwrap();

        let list = db.list_transcripts().unwrap();
        assert_eq!(list.len(), 2);
        for item in &list {
            assert!(!item.slug.is_empty());
            assert_eq!(item.claim_count, 0);
        }
    }
}
