// Claims repository for argraph
// Handles claim, occurrence, and edge rows plus the graph read views

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, params};

use crate::analysis::types::Statement;
use super::models::{Claim, ClaimGraph, Edge, FullGraph, GraphNode, Occurrence, StatementType};
use super::DatabaseManager;

impl DatabaseManager {
    /// Insert a fresh claim row. Duplicate text is allowed; claims are
    /// occurrence-scoped and never deduplicated.
    pub fn save_claim(&self, text: &str, claim_type: StatementType) -> Result<i64> {
        self.with_connection(|conn| {
            save_claim_impl(conn, text, claim_type)
        })
    }

    /// Record one appearance of a claim in a transcript. The caller supplies
    /// a strictly increasing position per transcript.
    pub fn save_occurrence(
        &self,
        claim_id: i64,
        transcript_id: i64,
        speaker: &str,
        position: i64,
        text: &str,
        line_index: Option<i64>,
    ) -> Result<()> {
        self.with_connection(|conn| {
            save_occurrence_impl(conn, claim_id, transcript_id, speaker, position, text, line_index)
        })
    }

    /// Insert a directed relation between two claims, scoped to a
    /// transcript. Additive; duplicate triples are not rejected.
    pub fn save_edge(
        &self,
        parent_claim_id: i64,
        child_claim_id: i64,
        relation: StatementType,
        transcript_id: i64,
    ) -> Result<()> {
        self.with_connection(|conn| {
            save_edge_impl(conn, parent_claim_id, child_claim_id, relation, transcript_id)
        })
    }

    /// Persist a full nested statement tree for a transcript: a depth-first
    /// walk writing Claim -> Occurrence -> Edge rows in one transaction.
    pub fn save_statement_tree(&self, transcript_id: i64, statements: &[Statement]) -> Result<()> {
        self.with_connection(|conn| {
            let tx = conn.unchecked_transaction()
                .context("Failed to start transaction for save_statement_tree")?;
            let mut position = next_position_impl(&tx, transcript_id)?;
            save_statement_walk_impl(&tx, transcript_id, statements, None, &mut position)?;
            tx.commit().context("Failed to commit save_statement_tree")?;
            Ok(())
        })
    }

    /// Get a transcript's occurrence rows ordered by position
    pub fn get_occurrences(&self, transcript_id: i64) -> Result<Vec<Occurrence>> {
        self.with_connection(|conn| {
            get_occurrences_impl(conn, transcript_id)
        })
    }

    /// Get one claim's global lineage: the claim plus its inbound and
    /// outbound edges across all transcripts. Errors if the id is absent.
    pub fn get_claim_graph(&self, claim_id: i64) -> Result<ClaimGraph> {
        self.with_connection(|conn| {
            get_claim_graph_impl(conn, claim_id)
        })
    }

    /// Get every claim and every edge across all transcripts
    pub fn get_full_graph(&self) -> Result<FullGraph> {
        self.with_connection(get_full_graph_impl)
    }
}

pub(crate) fn save_claim_impl(conn: &Connection, text: &str, claim_type: StatementType) -> Result<i64> {
    conn.execute(
        "INSERT INTO claims (text, type) VALUES (?1, ?2)",
        params![text, claim_type.as_str()],
    ).context("Failed to save claim")?;

    Ok(conn.last_insert_rowid())
}

pub(crate) fn save_occurrence_impl(
    conn: &Connection,
    claim_id: i64,
    transcript_id: i64,
    speaker: &str,
    position: i64,
    text: &str,
    line_index: Option<i64>,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO occurrences (claim_id, transcript_id, speaker, position, text, line_index)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![claim_id, transcript_id, speaker, position, text, line_index],
    ).context("Failed to save occurrence")?;

    Ok(())
}

pub(crate) fn save_edge_impl(
    conn: &Connection,
    parent_claim_id: i64,
    child_claim_id: i64,
    relation: StatementType,
    transcript_id: i64,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO edges (parent_claim_id, child_claim_id, relation, transcript_id)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![parent_claim_id, child_claim_id, relation.as_str(), transcript_id],
    ).context("Failed to save edge")?;

    Ok(())
}

/// Next occurrence position for a transcript: max stored position + 1,
/// starting at 0 for an empty transcript
pub(crate) fn next_position_impl(conn: &Connection, transcript_id: i64) -> Result<i64> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM occurrences WHERE transcript_id = ?",
        params![transcript_id],
        |row| row.get(0),
    ).context("Failed to get next occurrence position")?;

    Ok(next)
}

/// Depth-first insert walk shared by the full persist and the reconciler.
/// Unknown statement types are kept but normalized to `claim`.
pub(crate) fn save_statement_walk_impl(
    conn: &Connection,
    transcript_id: i64,
    statements: &[Statement],
    parent_claim_id: Option<i64>,
    position: &mut i64,
) -> Result<()> {
    for statement in statements {
        let claim_type = statement.normalized_type();
        let claim_id = save_claim_impl(conn, &statement.text, claim_type)?;
        save_occurrence_impl(
            conn,
            claim_id,
            transcript_id,
            statement.speaker_ref(),
            *position,
            &statement.text,
            statement.line_index,
        )?;
        *position += 1;

        if let Some(parent) = parent_claim_id {
            save_edge_impl(conn, parent, claim_id, claim_type, transcript_id)?;
        }

        if !statement.children.is_empty() {
            save_statement_walk_impl(conn, transcript_id, &statement.children, Some(claim_id), position)?;
        }
    }
    Ok(())
}

fn get_occurrences_impl(conn: &Connection, transcript_id: i64) -> Result<Vec<Occurrence>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, claim_id, transcript_id, speaker, position, text, line_index
        FROM occurrences
        WHERE transcript_id = ?
        ORDER BY position ASC
        "#
    ).context("Failed to prepare get_occurrences query")?;

    let occurrences = stmt.query_map(params![transcript_id], |row| {
        Ok(Occurrence {
            id: row.get(0)?,
            claim_id: row.get(1)?,
            transcript_id: row.get(2)?,
            speaker: row.get(3)?,
            position: row.get(4)?,
            text: row.get(5)?,
            line_index: row.get(6)?,
        })
    }).context("Failed to query occurrences")?;

    occurrences.collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect occurrences")
}

pub(crate) fn get_claim_impl(conn: &Connection, claim_id: i64) -> Result<Option<Claim>> {
    let result = conn.query_row(
        "SELECT id, text, type FROM claims WHERE id = ?",
        params![claim_id],
        |row| {
            Ok(Claim {
                id: row.get(0)?,
                text: row.get(1)?,
                claim_type: row.get(2)?,
            })
        },
    );

    match result {
        Ok(claim) => Ok(Some(claim)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context("Failed to get claim"),
    }
}

fn get_claim_graph_impl(conn: &Connection, claim_id: i64) -> Result<ClaimGraph> {
    let claim = get_claim_impl(conn, claim_id)?
        .ok_or_else(|| anyhow!("Claim not found: {}", claim_id))?;

    let inbound = query_edges_impl(conn, "child_claim_id", claim_id)?;
    let outbound = query_edges_impl(conn, "parent_claim_id", claim_id)?;

    Ok(ClaimGraph { claim, inbound, outbound })
}

fn query_edges_impl(conn: &Connection, column: &str, claim_id: i64) -> Result<Vec<Edge>> {
    let query = format!(
        "SELECT id, parent_claim_id, child_claim_id, relation, transcript_id FROM edges WHERE {} = ?",
        column,
    );
    let mut stmt = conn.prepare(&query)
        .context("Failed to prepare edges query")?;

    let edges = stmt.query_map(params![claim_id], row_to_edge)
        .context("Failed to query edges")?;

    edges.collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect edges")
}

fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<Edge> {
    Ok(Edge {
        id: row.get(0)?,
        parent_claim_id: row.get(1)?,
        child_claim_id: row.get(2)?,
        relation: row.get(3)?,
        transcript_id: row.get(4)?,
    })
}

fn get_full_graph_impl(conn: &Connection) -> Result<FullGraph> {
    // Transcript ids per claim, from the occurrence ledger
    let mut transcripts_by_claim: HashMap<i64, Vec<i64>> = HashMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT claim_id, transcript_id FROM occurrences ORDER BY claim_id, transcript_id"
        ).context("Failed to prepare occurrence transcript query")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        }).context("Failed to query occurrence transcripts")?;

        for row in rows {
            let (claim_id, transcript_id) = row.context("Failed to read occurrence transcript row")?;
            transcripts_by_claim.entry(claim_id).or_default().push(transcript_id);
        }
    }

    let mut stmt = conn.prepare("SELECT id, text, type FROM claims ORDER BY id")
        .context("Failed to prepare claims query")?;
    let claims = stmt.query_map([], |row| {
        Ok(Claim {
            id: row.get(0)?,
            text: row.get(1)?,
            claim_type: row.get(2)?,
        })
    }).context("Failed to query claims")?;

    let mut nodes = Vec::new();
    for claim in claims {
        let claim = claim.context("Failed to read claim row")?;
        let transcript_ids = transcripts_by_claim.remove(&claim.id).unwrap_or_default();
        nodes.push(GraphNode { claim, transcript_ids });
    }

    let mut stmt = conn.prepare(
        "SELECT id, parent_claim_id, child_claim_id, relation, transcript_id FROM edges ORDER BY id"
    ).context("Failed to prepare all-edges query")?;
    let edges = stmt.query_map([], row_to_edge)
        .context("Failed to query all edges")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect all edges")?;

    Ok(FullGraph { nodes, edges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::Statement;

    fn create_test_db() -> DatabaseManager {
        DatabaseManager::new_in_memory().unwrap()
    }

    fn statement(speaker: &str, text: &str, kind: &str) -> Statement {
        Statement {
            speaker: speaker.to_string(),
            speaker_id: None,
            text: text.to_string(),
            statement_type: kind.to_string(),
            line_index: None,
            children: Vec::new(),
            parent_text: None,
            fact_check: None,
            fallacy: None,
        }
    }

    #[test]
    fn test_save_claim_allows_duplicate_text() {
        let db = create_test_db();

        let a = db.save_claim("AI will replace jobs", StatementType::Claim).unwrap();
        let b = db.save_claim("AI will replace jobs", StatementType::Claim).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_claim_graph() {
        let db = create_test_db();
        let t = db.create_transcript("", None).unwrap();

        let parent = db.save_claim("AI will replace jobs", StatementType::Claim).unwrap();
        let child = db.save_claim("Not all jobs", StatementType::Rebuttal).unwrap();
        db.save_occurrence(parent, t.id, "speaker_1", 0, "AI will replace jobs", Some(1)).unwrap();
        db.save_occurrence(child, t.id, "speaker_2", 1, "Not all jobs", Some(2)).unwrap();
        db.save_edge(parent, child, StatementType::Rebuttal, t.id).unwrap();

        let graph = db.get_claim_graph(parent).unwrap();
        assert_eq!(graph.claim.text, "AI will replace jobs");
        assert!(graph.inbound.is_empty());
        assert_eq!(graph.outbound.len(), 1);
        assert_eq!(graph.outbound[0].child_claim_id, child);

        let child_graph = db.get_claim_graph(child).unwrap();
        assert_eq!(child_graph.inbound.len(), 1);
        assert_eq!(child_graph.inbound[0].relation, "rebuttal");
    }

    #[test]
    fn test_claim_graph_not_found() {
        let db = create_test_db();
        let err = db.get_claim_graph(42).unwrap_err();
        assert!(err.to_string().contains("not found"), "unexpected error: {}", err);
    }

    #[test]
    fn test_save_statement_tree_assigns_positions_depth_first() {
        let db = create_test_db();
        let t = db.create_transcript("", None).unwrap();

        let mut root = statement("Alex", "AI will replace jobs", "claim");
        root.children.push(statement("Jordan", "Not all jobs", "rebuttal"));
        let second = statement("Alex", "Some jobs are safe", "agreement");

        db.save_statement_tree(t.id, &[root, second]).unwrap();

        let tree = db.get_claim_tree(t.id).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].text, "AI will replace jobs");
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].text, "Not all jobs");
        assert_eq!(tree[1].text, "Some jobs are safe");
    }

    #[test]
    fn test_unknown_type_normalized_to_claim() {
        let db = create_test_db();
        let t = db.create_transcript("", None).unwrap();

        db.save_statement_tree(t.id, &[statement("Alex", "hot take", "counterpoint")]).unwrap();

        let tree = db.get_claim_tree(t.id).unwrap();
        assert_eq!(tree[0].claim_type, "claim");
    }

    #[test]
    fn test_full_graph() {
        let db = create_test_db();
        let t = db.create_transcript("", None).unwrap();

        let a = db.save_claim("first", StatementType::Claim).unwrap();
        let b = db.save_claim("second", StatementType::Response).unwrap();
        db.save_occurrence(a, t.id, "speaker_1", 0, "first", None).unwrap();
        db.save_occurrence(b, t.id, "speaker_1", 1, "second", None).unwrap();
        db.save_edge(a, b, StatementType::Response, t.id).unwrap();

        let graph = db.get_full_graph().unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.nodes[0].transcript_ids, vec![t.id]);
    }

    #[test]
    fn test_occurrence_requires_existing_claim() {
        let db = create_test_db();
        let t = db.create_transcript("", None).unwrap();

        // Foreign keys reject an occurrence pointing at a missing claim
        let result = db.save_occurrence(999, t.id, "speaker_1", 0, "dangling", None);
        assert!(result.is_err());
    }
}
