// Database migrations for argraph
// Creates and updates the database schema

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Current schema version
const SCHEMA_VERSION: i32 = 2;

/// Run all necessary migrations to bring the database up to date
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version from the database
fn get_schema_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let table_exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    ).unwrap_or(false);

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get(0),
    ).unwrap_or(0);

    Ok(version)
}

/// Initial schema creation (version 1)
fn migrate_v1(conn: &Connection) -> Result<()> {
    log::info!("Running database migration v1");

    conn.execute_batch(r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Transcripts table: One row per conversation session
        CREATE TABLE IF NOT EXISTS transcripts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            slug TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Global speaker identities, one row per distinct display name
        CREATE TABLE IF NOT EXISTS speakers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            auto_generated INTEGER NOT NULL DEFAULT 0
        );

        -- Per-transcript local speaker ids ("speaker_1") mapped to identities
        CREATE TABLE IF NOT EXISTS transcript_speakers (
            transcript_id INTEGER NOT NULL,
            local_id TEXT NOT NULL,
            speaker_id INTEGER NOT NULL,
            auto_generated INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (transcript_id, local_id),
            FOREIGN KEY (transcript_id) REFERENCES transcripts(id) ON DELETE CASCADE,
            FOREIGN KEY (speaker_id) REFERENCES speakers(id) ON DELETE CASCADE
        );

        -- Diarized conversational turns with optional timing
        CREATE TABLE IF NOT EXISTS utterances (
            transcript_id INTEGER NOT NULL,
            local_id TEXT NOT NULL,
            text TEXT NOT NULL,
            position INTEGER NOT NULL,
            start_ms INTEGER,
            end_ms INTEGER,
            PRIMARY KEY (transcript_id, position),
            FOREIGN KEY (transcript_id) REFERENCES transcripts(id) ON DELETE CASCADE
        );

        -- Canonical claims; a fresh row per occurrence, no text dedup
        CREATE TABLE IF NOT EXISTS claims (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text TEXT NOT NULL,
            type TEXT NOT NULL
        );

        -- Per-transcript appearances of a claim
        CREATE TABLE IF NOT EXISTS occurrences (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            claim_id INTEGER NOT NULL,
            transcript_id INTEGER NOT NULL,
            speaker TEXT NOT NULL,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            line_index INTEGER,
            FOREIGN KEY (claim_id) REFERENCES claims(id) ON DELETE CASCADE,
            FOREIGN KEY (transcript_id) REFERENCES transcripts(id) ON DELETE CASCADE
        );

        -- Directed relations between claims, scoped to one transcript
        CREATE TABLE IF NOT EXISTS edges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_claim_id INTEGER NOT NULL,
            child_claim_id INTEGER NOT NULL,
            relation TEXT NOT NULL,
            transcript_id INTEGER NOT NULL,
            FOREIGN KEY (parent_claim_id) REFERENCES claims(id) ON DELETE CASCADE,
            FOREIGN KEY (child_claim_id) REFERENCES claims(id) ON DELETE CASCADE,
            FOREIGN KEY (transcript_id) REFERENCES transcripts(id) ON DELETE CASCADE
        );

        -- Indexes for tree reconstruction and speaker lookups
        CREATE INDEX IF NOT EXISTS idx_occurrences_transcript
        ON occurrences(transcript_id, position);

        CREATE INDEX IF NOT EXISTS idx_occurrences_claim
        ON occurrences(claim_id);

        CREATE INDEX IF NOT EXISTS idx_edges_transcript
        ON edges(transcript_id);

        CREATE INDEX IF NOT EXISTS idx_edges_parent
        ON edges(parent_claim_id);

        CREATE INDEX IF NOT EXISTS idx_edges_child
        ON edges(child_claim_id);

        CREATE INDEX IF NOT EXISTS idx_utterances_transcript
        ON utterances(transcript_id, position);

        -- Record migration
        INSERT INTO schema_version (version) VALUES (1);
    "#).context("Failed to run migration v1")?;

    log::info!("Migration v1 completed successfully");
    Ok(())
}

/// Source URL tracking for imported conversations (version 2)
fn migrate_v2(conn: &Connection) -> Result<()> {
    log::info!("Running database migration v2 - Source URL tracking");

    conn.execute_batch(r#"
        -- Add source_url column to transcripts
        ALTER TABLE transcripts ADD COLUMN source_url TEXT;

        -- Record migration
        INSERT INTO schema_version (version) VALUES (2);
    "#).context("Failed to run migration v2")?;

    log::info!("Migration v2 completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_migrations() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let conn = Connection::open(&db_path).unwrap();

        // Run migrations
        run_migrations(&conn).unwrap();

        // Verify schema version
        let version: i32 = conn.query_row(
            "SELECT MAX(version) FROM schema_version",
            [],
            |row| row.get(0),
        ).unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        // Running again is a no-op
        run_migrations(&conn).unwrap();
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM schema_version",
            [],
            |row| row.get(0),
        ).unwrap();
        assert_eq!(count, SCHEMA_VERSION);
    }
}
