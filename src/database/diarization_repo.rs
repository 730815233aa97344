// Diarization repository for argraph
// Handles the per-transcript speaker map and utterance rows

use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use super::models::{TranscriptSpeaker, Utterance};
use super::DatabaseManager;

impl DatabaseManager {
    /// Save a transcript's diarization: speaker map plus utterances.
    /// Replaces any previously stored utterances; positions are re-assigned
    /// contiguously in the order given. Atomic.
    pub fn save_diarization(
        &self,
        transcript_id: i64,
        speakers: &HashMap<String, String>,
        utterances: &[Utterance],
    ) -> Result<()> {
        self.with_connection(|conn| {
            save_diarization_impl(conn, transcript_id, speakers, utterances)
        })
    }

    /// Get a transcript's diarization: (local id -> current display name,
    /// utterances ordered by position)
    pub fn get_diarization(&self, transcript_id: i64) -> Result<(HashMap<String, String>, Vec<Utterance>)> {
        self.with_connection(|conn| {
            get_diarization_impl(conn, transcript_id)
        })
    }

    /// Upsert TranscriptSpeaker rows with explicit auto-generated flags,
    /// creating global Speaker rows keyed by exact name match
    pub fn save_speakers_with_flags(
        &self,
        transcript_id: i64,
        names: &HashMap<String, String>,
        auto_flags: &HashMap<String, bool>,
    ) -> Result<()> {
        self.with_connection(|conn| {
            let tx = conn.unchecked_transaction()
                .context("Failed to start transaction for save_speakers_with_flags")?;
            for (local_id, name) in names {
                let auto = auto_flags.get(local_id).copied().unwrap_or(false);
                upsert_speaker_impl(&tx, transcript_id, local_id, name, auto)?;
            }
            tx.commit().context("Failed to commit save_speakers_with_flags")?;
            Ok(())
        })
    }

    /// Get the TranscriptSpeaker mappings for a transcript, keyed by local id
    pub fn get_transcript_speakers(&self, transcript_id: i64) -> Result<HashMap<String, TranscriptSpeaker>> {
        self.with_connection(|conn| {
            get_transcript_speakers_impl(conn, transcript_id)
        })
    }
}

fn save_diarization_impl(
    conn: &Connection,
    transcript_id: i64,
    speakers: &HashMap<String, String>,
    utterances: &[Utterance],
) -> Result<()> {
    let tx = conn.unchecked_transaction()
        .context("Failed to start transaction for save_diarization")?;

    for (local_id, name) in speakers {
        // No explicit flag here: empty names fall back to a generated
        // display name and are flagged auto-generated
        let auto = name.trim().is_empty();
        upsert_speaker_impl(&tx, transcript_id, local_id, name, auto)?;
    }

    tx.execute(
        "DELETE FROM utterances WHERE transcript_id = ?",
        params![transcript_id],
    ).context("Failed to delete old utterances")?;

    for (i, utterance) in utterances.iter().enumerate() {
        tx.execute(
            r#"
            INSERT INTO utterances (transcript_id, local_id, text, position, start_ms, end_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                transcript_id,
                utterance.speaker,
                utterance.text,
                (i + 1) as i64,
                utterance.start_ms,
                utterance.end_ms,
            ],
        ).context("Failed to insert utterance")?;
    }

    tx.commit().context("Failed to commit save_diarization")?;
    Ok(())
}

/// Upsert one (transcript, local id) -> global speaker mapping.
/// Speaker rows are keyed by exact, case-sensitive name match.
pub(crate) fn upsert_speaker_impl(
    conn: &Connection,
    transcript_id: i64,
    local_id: &str,
    name: &str,
    auto_generated: bool,
) -> Result<()> {
    let display_name = if name.trim().is_empty() {
        prettify_local_id(local_id)
    } else {
        name.to_string()
    };

    conn.execute(
        "INSERT OR IGNORE INTO speakers (name, auto_generated) VALUES (?1, ?2)",
        params![display_name, auto_generated as i32],
    ).context("Failed to upsert speaker")?;

    let speaker_id: i64 = conn.query_row(
        "SELECT id FROM speakers WHERE name = ?",
        params![display_name],
        |row| row.get(0),
    ).context("Failed to look up speaker id")?;

    conn.execute(
        r#"
        INSERT INTO transcript_speakers (transcript_id, local_id, speaker_id, auto_generated)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(transcript_id, local_id) DO UPDATE SET
            speaker_id = excluded.speaker_id,
            auto_generated = excluded.auto_generated
        "#,
        params![transcript_id, local_id, speaker_id, auto_generated as i32],
    ).context("Failed to upsert transcript speaker")?;

    Ok(())
}

/// "speaker_1" -> "Speaker 1"
fn prettify_local_id(local_id: &str) -> String {
    let mut out = String::with_capacity(local_id.len());
    let mut capitalize = true;
    for ch in local_id.chars() {
        if ch == '_' || ch == '-' {
            out.push(' ');
            capitalize = true;
        } else if capitalize {
            out.extend(ch.to_uppercase());
            capitalize = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn get_diarization_impl(conn: &Connection, transcript_id: i64) -> Result<(HashMap<String, String>, Vec<Utterance>)> {
    let mut speakers = HashMap::new();
    {
        let mut stmt = conn.prepare(
            r#"
            SELECT ts.local_id, sp.name
            FROM transcript_speakers ts
            JOIN speakers sp ON ts.speaker_id = sp.id
            WHERE ts.transcript_id = ?
            "#
        ).context("Failed to prepare speaker map query")?;

        let rows = stmt.query_map(params![transcript_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        }).context("Failed to query speaker map")?;

        for row in rows {
            let (local_id, name) = row.context("Failed to read speaker map row")?;
            speakers.insert(local_id, name);
        }
    }

    let mut stmt = conn.prepare(
        r#"
        SELECT local_id, text, position, start_ms, end_ms
        FROM utterances
        WHERE transcript_id = ?
        ORDER BY position ASC
        "#
    ).context("Failed to prepare utterances query")?;

    let rows = stmt.query_map(params![transcript_id], |row| {
        Ok(Utterance {
            speaker: row.get(0)?,
            text: row.get(1)?,
            position: row.get(2)?,
            start_ms: row.get(3)?,
            end_ms: row.get(4)?,
        })
    }).context("Failed to query utterances")?;

    let mut utterances = rows.collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect utterances")?;

    // An unset end inherits the next utterance's start; the last
    // utterance's end stays unset unless it was stored explicitly
    for i in 0..utterances.len() {
        if utterances[i].end_ms.is_none() && i + 1 < utterances.len() {
            utterances[i].end_ms = utterances[i + 1].start_ms;
        }
    }

    Ok((speakers, utterances))
}

fn get_transcript_speakers_impl(conn: &Connection, transcript_id: i64) -> Result<HashMap<String, TranscriptSpeaker>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT transcript_id, local_id, speaker_id, auto_generated
        FROM transcript_speakers
        WHERE transcript_id = ?
        "#
    ).context("Failed to prepare get_transcript_speakers query")?;

    let rows = stmt.query_map(params![transcript_id], |row| {
        Ok(TranscriptSpeaker {
            transcript_id: row.get(0)?,
            local_id: row.get(1)?,
            speaker_id: row.get(2)?,
            auto_generated: row.get::<_, i32>(3)? != 0,
        })
    }).context("Failed to query transcript speakers")?;

    let mut map = HashMap::new();
    for row in rows {
        let ts = row.context("Failed to read transcript speaker row")?;
        map.insert(ts.local_id.clone(), ts);
    }
    Ok(map)
}
