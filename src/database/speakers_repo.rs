// Speaker registry for argraph
// Global speaker identities, rename cascade, and the occurrence
// local-id backfill

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};

use super::models::{Speaker, SpeakerConversation, SpeakerSummary};
use super::DatabaseManager;

impl DatabaseManager {
    /// Look up a speaker by exact display name. Errors if absent.
    pub fn get_speaker_by_name(&self, name: &str) -> Result<Speaker> {
        self.with_connection(|conn| {
            get_speaker_by_name_impl(conn, name)
        })
    }

    /// List all speakers with their conversation and claim counts
    pub fn list_speakers(&self) -> Result<Vec<SpeakerSummary>> {
        self.with_connection(list_speakers_impl)
    }

    /// Get the conversations in which a speaker (by current name) has at
    /// least one claim occurrence
    pub fn get_speaker_conversations(&self, name: &str) -> Result<Vec<SpeakerConversation>> {
        self.with_connection(|conn| {
            get_speaker_conversations_impl(conn, name)
        })
    }

    /// Rename a speaker's canonical display name.
    ///
    /// Occurrence and utterance rows hold only local-id references, so the
    /// rename touches one speakers row and every read reports the new name
    /// with zero stale copies. Renaming onto an existing name merges the
    /// two identities. Atomic.
    pub fn rename_speaker(&self, speaker_id: i64, new_name: &str) -> Result<()> {
        self.with_connection(|conn| {
            rename_speaker_impl(conn, speaker_id, new_name)
        })
    }

    /// One-time backfill: historical occurrence rows stored the bare
    /// display name instead of the transcript-local id. Substitutes the
    /// local id per transcript. Idempotent: after the first pass no row
    /// still holds a bare name, so a second pass matches nothing.
    /// Returns the number of rows updated.
    pub fn backfill_occurrence_speaker_ids(&self) -> Result<usize> {
        self.with_connection(backfill_occurrence_speaker_ids_impl)
    }
}

fn get_speaker_by_name_impl(conn: &Connection, name: &str) -> Result<Speaker> {
    let speaker = conn.query_row(
        "SELECT id, name, auto_generated FROM speakers WHERE name = ?",
        params![name],
        |row| {
            Ok(Speaker {
                id: row.get(0)?,
                name: row.get(1)?,
                auto_generated: row.get::<_, i32>(2)? != 0,
            })
        },
    ).optional().context("Failed to query speaker by name")?;

    speaker.ok_or_else(|| anyhow!("Speaker not found: {}", name))
}

fn list_speakers_impl(conn: &Connection) -> Result<Vec<SpeakerSummary>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT s.id, s.name, s.auto_generated,
            (SELECT COUNT(DISTINCT o.transcript_id)
             FROM occurrences o
             LEFT JOIN transcript_speakers ts
                 ON ts.transcript_id = o.transcript_id AND ts.local_id = o.speaker
             WHERE ts.speaker_id = s.id OR o.speaker = s.name),
            (SELECT COUNT(*)
             FROM occurrences o
             LEFT JOIN transcript_speakers ts
                 ON ts.transcript_id = o.transcript_id AND ts.local_id = o.speaker
             WHERE ts.speaker_id = s.id OR o.speaker = s.name)
        FROM speakers s
        ORDER BY s.name ASC
        "#
    ).context("Failed to prepare list_speakers query")?;

    let speakers = stmt.query_map([], |row| {
        Ok(SpeakerSummary {
            id: row.get(0)?,
            name: row.get(1)?,
            auto_generated: row.get::<_, i32>(2)? != 0,
            conversation_count: row.get(3)?,
            claim_count: row.get(4)?,
        })
    }).context("Failed to query speakers")?;

    speakers.collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect speakers")
}

fn get_speaker_conversations_impl(conn: &Connection, name: &str) -> Result<Vec<SpeakerConversation>> {
    let speaker = get_speaker_by_name_impl(conn, name)?;

    let mut stmt = conn.prepare(
        r#"
        SELECT t.slug, t.title, t.created_at, COUNT(o.id)
        FROM transcripts t
        JOIN occurrences o ON o.transcript_id = t.id
        LEFT JOIN transcript_speakers ts
            ON ts.transcript_id = o.transcript_id AND ts.local_id = o.speaker
        WHERE ts.speaker_id = ?1 OR o.speaker = ?2
        GROUP BY t.id
        ORDER BY t.created_at DESC, t.id DESC
        "#
    ).context("Failed to prepare speaker conversations query")?;

    let conversations = stmt.query_map(params![speaker.id, speaker.name], |row| {
        Ok(SpeakerConversation {
            slug: row.get(0)?,
            title: row.get(1)?,
            created_at: row.get(2)?,
            claim_count: row.get(3)?,
        })
    }).context("Failed to query speaker conversations")?;

    conversations.collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect speaker conversations")
}

fn rename_speaker_impl(conn: &Connection, speaker_id: i64, new_name: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()
        .context("Failed to start transaction for rename_speaker")?;

    let existing: Option<i64> = tx.query_row(
        "SELECT id FROM speakers WHERE name = ?",
        params![new_name],
        |row| row.get(0),
    ).optional().context("Failed to check rename target")?;

    match existing {
        Some(target_id) if target_id != speaker_id => {
            // Target name already taken: merge the two identities
            tx.execute(
                "UPDATE transcript_speakers SET speaker_id = ? WHERE speaker_id = ?",
                params![target_id, speaker_id],
            ).context("Failed to repoint transcript speakers")?;
            tx.execute(
                "DELETE FROM speakers WHERE id = ?",
                params![speaker_id],
            ).context("Failed to delete merged speaker")?;
            log::info!("Merged speaker {} into '{}' ({})", speaker_id, new_name, target_id);
        }
        _ => {
            let updated = tx.execute(
                "UPDATE speakers SET name = ? WHERE id = ?",
                params![new_name, speaker_id],
            ).context("Failed to rename speaker")?;
            if updated == 0 {
                return Err(anyhow!("Speaker not found: {}", speaker_id));
            }
            log::info!("Renamed speaker {} to '{}'", speaker_id, new_name);
        }
    }

    tx.commit().context("Failed to commit rename_speaker")?;
    Ok(())
}

fn backfill_occurrence_speaker_ids_impl(conn: &Connection) -> Result<usize> {
    let tx = conn.unchecked_transaction()
        .context("Failed to start transaction for speaker backfill")?;

    // (transcript, display name) -> local id pairs
    let pairs: Vec<(i64, String, String)> = {
        let mut stmt = tx.prepare(
            r#"
            SELECT ts.transcript_id, sp.name, ts.local_id
            FROM transcript_speakers ts
            JOIN speakers sp ON ts.speaker_id = sp.id
            "#
        ).context("Failed to prepare backfill mapping query")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        }).context("Failed to query backfill mappings")?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to collect backfill mappings")?
    };

    let mut total = 0usize;
    for (transcript_id, name, local_id) in pairs {
        let updated = tx.execute(
            "UPDATE occurrences SET speaker = ?1 WHERE transcript_id = ?2 AND speaker = ?3",
            params![local_id, transcript_id, name],
        ).context("Failed to backfill occurrence speaker")?;
        if updated > 0 {
            log::info!(
                "Backfilled {} occurrences in transcript {}: {} -> {}",
                updated, transcript_id, name, local_id,
            );
            total += updated;
        }
    }

    tx.commit().context("Failed to commit speaker backfill")?;
    Ok(total)
}
