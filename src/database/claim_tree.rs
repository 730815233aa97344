// Tree builder for argraph
// Reconstructs the nested statement tree for one transcript from flat
// occurrence, edge, and claim rows

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use super::models::ClaimTreeNode;
use super::DatabaseManager;

/// One occurrence row held in the arena while the nested view is built.
/// Relationships live purely in the edge pairs; nodes never point at
/// each other.
struct ArenaNode {
    claim_id: i64,
    speaker_ref: String,
    text: String,
    claim_type: String,
    line_index: Option<i64>,
    position: i64,
}

impl DatabaseManager {
    /// Get the ordered nested statement tree for a transcript.
    ///
    /// Top-level nodes are occurrences whose claim has no incoming edge in
    /// this transcript; children are ordered by occurrence position, so the
    /// output order always equals original insertion order.
    pub fn get_claim_tree(&self, transcript_id: i64) -> Result<Vec<ClaimTreeNode>> {
        self.with_connection(|conn| {
            get_claim_tree_impl(conn, transcript_id)
        })
    }
}

pub(crate) fn get_claim_tree_impl(conn: &Connection, transcript_id: i64) -> Result<Vec<ClaimTreeNode>> {
    // Arena of occurrence rows in position order, indexed by claim id.
    // Text and type come from the claim row so retroactive corrections
    // show up; the occurrence keeps the original source snippet.
    let mut order: Vec<i64> = Vec::new();
    let mut arena: HashMap<i64, ArenaNode> = HashMap::new();
    {
        let mut stmt = conn.prepare(
            r#"
            SELECT o.claim_id, o.speaker, c.text, c.type, o.line_index, o.position
            FROM occurrences o
            JOIN claims c ON o.claim_id = c.id
            WHERE o.transcript_id = ?
            ORDER BY o.position ASC
            "#
        ).context("Failed to prepare occurrences query")?;

        let rows = stmt.query_map(params![transcript_id], |row| {
            Ok(ArenaNode {
                claim_id: row.get(0)?,
                speaker_ref: row.get(1)?,
                text: row.get(2)?,
                claim_type: row.get(3)?,
                line_index: row.get(4)?,
                position: row.get(5)?,
            })
        }).context("Failed to query occurrences")?;

        for row in rows {
            let node = row.context("Failed to read occurrence row")?;
            order.push(node.claim_id);
            arena.insert(node.claim_id, node);
        }
    }

    // Edge pairs for this transcript only
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut has_parent: HashSet<i64> = HashSet::new();
    {
        let mut stmt = conn.prepare(
            "SELECT parent_claim_id, child_claim_id FROM edges WHERE transcript_id = ?"
        ).context("Failed to prepare edges query")?;

        let rows = stmt.query_map(params![transcript_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        }).context("Failed to query edges")?;

        for row in rows {
            let (parent, child) = row.context("Failed to read edge row")?;
            // Edges can reference claims whose occurrence lives in another
            // transcript; only rows present in this arena become children
            if arena.contains_key(&child) {
                children.entry(parent).or_default().push(child);
                has_parent.insert(child);
            }
        }
    }

    for child_ids in children.values_mut() {
        child_ids.sort_by_key(|id| arena[id].position);
    }

    // Display names resolve through the registry at read time; rows that
    // predate the local-id backfill pass their stored value through
    let local_names: HashMap<String, String> = {
        let mut stmt = conn.prepare(
            r#"
            SELECT ts.local_id, sp.name
            FROM transcript_speakers ts
            JOIN speakers sp ON ts.speaker_id = sp.id
            WHERE ts.transcript_id = ?
            "#
        ).context("Failed to prepare speaker name query")?;

        let rows = stmt.query_map(params![transcript_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        }).context("Failed to query speaker names")?;

        rows.collect::<std::result::Result<HashMap<_, _>, _>>()
            .context("Failed to collect speaker names")?
    };

    let roots: Vec<i64> = order.iter()
        .copied()
        .filter(|id| !has_parent.contains(id))
        .collect();

    Ok(roots.iter()
        .map(|id| assemble(*id, &arena, &children, &local_names))
        .collect())
}

fn assemble(
    claim_id: i64,
    arena: &HashMap<i64, ArenaNode>,
    children: &HashMap<i64, Vec<i64>>,
    local_names: &HashMap<String, String>,
) -> ClaimTreeNode {
    let node = &arena[&claim_id];
    let speaker = local_names
        .get(&node.speaker_ref)
        .cloned()
        .unwrap_or_else(|| node.speaker_ref.clone());

    let child_nodes = children
        .get(&claim_id)
        .map(|ids| {
            ids.iter()
                .map(|id| assemble(*id, arena, children, local_names))
                .collect()
        })
        .unwrap_or_default();

    ClaimTreeNode {
        claim_id,
        speaker,
        text: node.text.clone(),
        claim_type: node.claim_type.clone(),
        line_index: node.line_index,
        children: child_nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::StatementType;
    use std::collections::HashMap as Map;

    fn create_test_db() -> DatabaseManager {
        DatabaseManager::new_in_memory().unwrap()
    }

    #[test]
    fn test_tree_order_follows_positions_not_ids() {
        let db = create_test_db();
        let t = db.create_transcript("", None).unwrap();

        // Insert claims in reverse of their intended display order
        let late = db.save_claim("said second", StatementType::Claim).unwrap();
        let early = db.save_claim("said first", StatementType::Claim).unwrap();
        db.save_occurrence(early, t.id, "speaker_1", 0, "said first", None).unwrap();
        db.save_occurrence(late, t.id, "speaker_1", 1, "said second", None).unwrap();

        let tree = db.get_claim_tree(t.id).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].text, "said first");
        assert_eq!(tree[1].text, "said second");
    }

    #[test]
    fn test_children_nested_under_parents() {
        let db = create_test_db();
        let t = db.create_transcript("", None).unwrap();

        let parent = db.save_claim("AI will replace jobs", StatementType::Claim).unwrap();
        let child_b = db.save_claim("Some are safe", StatementType::Response).unwrap();
        let child_a = db.save_claim("Not all jobs", StatementType::Rebuttal).unwrap();
        db.save_occurrence(parent, t.id, "speaker_1", 0, "AI will replace jobs", Some(1)).unwrap();
        db.save_occurrence(child_a, t.id, "speaker_2", 1, "Not all jobs", Some(2)).unwrap();
        db.save_occurrence(child_b, t.id, "speaker_1", 2, "Some are safe", Some(3)).unwrap();
        db.save_edge(parent, child_a, StatementType::Rebuttal, t.id).unwrap();
        db.save_edge(parent, child_b, StatementType::Response, t.id).unwrap();

        let tree = db.get_claim_tree(t.id).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children.len(), 2);
        // Children ordered by position, not by claim id
        assert_eq!(tree[0].children[0].text, "Not all jobs");
        assert_eq!(tree[0].children[1].text, "Some are safe");
    }

    #[test]
    fn test_line_index_round_trip_including_children() {
        let db = create_test_db();
        let t = db.create_transcript("", None).unwrap();

        let parent = db.save_claim("top", StatementType::Claim).unwrap();
        let child = db.save_claim("nested", StatementType::Response).unwrap();
        db.save_occurrence(parent, t.id, "speaker_1", 0, "top", Some(1)).unwrap();
        db.save_occurrence(child, t.id, "speaker_2", 1, "nested", Some(1)).unwrap();
        db.save_edge(parent, child, StatementType::Response, t.id).unwrap();

        let tree = db.get_claim_tree(t.id).unwrap();
        assert_eq!(tree[0].line_index, Some(1));
        assert_eq!(tree[0].children[0].line_index, Some(1));
    }

    #[test]
    fn test_edges_are_transcript_scoped() {
        let db = create_test_db();
        let t1 = db.create_transcript("", None).unwrap();
        let t2 = db.create_transcript("", None).unwrap();

        let a = db.save_claim("shared parent", StatementType::Claim).unwrap();
        let b = db.save_claim("only related in t1", StatementType::Rebuttal).unwrap();
        db.save_occurrence(a, t1.id, "speaker_1", 0, "shared parent", None).unwrap();
        db.save_occurrence(b, t1.id, "speaker_2", 1, "only related in t1", None).unwrap();
        db.save_occurrence(a, t2.id, "speaker_1", 0, "shared parent", None).unwrap();
        db.save_occurrence(b, t2.id, "speaker_2", 1, "only related in t1", None).unwrap();
        db.save_edge(a, b, StatementType::Rebuttal, t1.id).unwrap();

        let tree1 = db.get_claim_tree(t1.id).unwrap();
        assert_eq!(tree1.len(), 1);
        assert_eq!(tree1[0].children.len(), 1);

        // Same claims, different transcript: no relation
        let tree2 = db.get_claim_tree(t2.id).unwrap();
        assert_eq!(tree2.len(), 2);
        assert!(tree2[0].children.is_empty());
    }

    #[test]
    fn test_speaker_names_resolved_at_read_time() {
        let db = create_test_db();
        let t = db.create_transcript("", None).unwrap();

        let speakers: Map<String, String> =
            [("speaker_1".to_string(), "Alice".to_string())].into_iter().collect();
        db.save_diarization(t.id, &speakers, &[]).unwrap();

        let c = db.save_claim("hello", StatementType::Claim).unwrap();
        db.save_occurrence(c, t.id, "speaker_1", 0, "hello", None).unwrap();

        let tree = db.get_claim_tree(t.id).unwrap();
        assert_eq!(tree[0].speaker, "Alice");

        // Historical rows holding a bare name pass through unchanged
        let c2 = db.save_claim("legacy", StatementType::Claim).unwrap();
        db.save_occurrence(c2, t.id, "Bob", 1, "legacy", None).unwrap();
        let tree = db.get_claim_tree(t.id).unwrap();
        assert_eq!(tree[1].speaker, "Bob");
    }

    #[test]
    fn test_empty_transcript_yields_empty_tree() {
        let db = create_test_db();
        let t = db.create_transcript("", None).unwrap();
        assert!(db.get_claim_tree(t.id).unwrap().is_empty());
    }
}
