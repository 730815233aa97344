// Incremental reconciler for argraph
//
// Merges a new batch of extracted statements (and optional corrective
// updates) into the existing graph state for one transcript. Every
// reconciliation call commits as a single transaction: a failed call
// leaves the graph exactly as it was.

use std::collections::HashMap;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::database::claims_repo::{
    next_position_impl, save_claim_impl, save_edge_impl, save_occurrence_impl,
};
use crate::database::models::{ClaimTreeNode, StatementType};
use crate::database::DatabaseManager;

use super::provider::ExtractionProvider;
use super::summary::{number_lines, summarize_tree};
use super::types::{AnalysisResponse, IncrementalResponse, Statement, StatementUpdate};

/// One reconciliation call against a transcript
#[derive(Debug, Clone)]
pub struct ReconcileRequest<'a> {
    pub transcript_id: i64,
    /// New text span not yet analyzed
    pub new_text: &'a str,
    /// Recent already-analyzed text, passed through for flow continuity
    pub context_text: &'a str,
    /// Line index of the last already-numbered source line
    pub line_offset: i64,
    /// Also apply corrective updates against existing statements
    pub full_review: bool,
}

/// What a reconciliation call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub statements_inserted: usize,
    pub updates_applied: usize,
    pub updates_dropped: usize,
}

/// Merges extraction batches into previously persisted graph state.
/// Holds injected references; constructs nothing global.
pub struct Reconciler<'a> {
    store: &'a DatabaseManager,
    provider: &'a dyn ExtractionProvider,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a DatabaseManager, provider: &'a dyn ExtractionProvider) -> Self {
        Self { store, provider }
    }

    /// Full-transcript analysis: number the source text, submit it to the
    /// collaborator, and persist the returned statement tree. Sets the
    /// transcript title when the collaborator supplies one. Returns the
    /// number of statements persisted.
    pub fn analyze(&self, transcript_id: i64, transcript_text: &str) -> Result<usize> {
        let (numbered, _) = number_lines(transcript_text, 0);

        let raw = self.provider
            .extract(&numbered)
            .map_err(anyhow::Error::new)
            .context("Extraction collaborator call failed")?;

        let response = AnalysisResponse::decode(&raw)
            .context("Analysis response rejected")?;

        self.store.save_statement_tree(transcript_id, &response.statements)?;
        if let Some(title) = response.title.as_deref().filter(|t| !t.is_empty()) {
            self.store.update_title(transcript_id, title)?;
        }

        Ok(count_statements(&response.statements))
    }

    /// Run one reconciliation call. Nothing is written before the
    /// collaborator responds and its response decodes; all writes then
    /// commit together or not at all.
    pub fn reconcile(&self, request: &ReconcileRequest) -> Result<ReconcileOutcome> {
        let existing = self.store.get_claim_tree(request.transcript_id)?;
        let existing_summary = summarize_tree(&existing);
        let (numbered, last_line) = number_lines(request.new_text, request.line_offset);

        let raw = self.provider
            .extract_incremental(&numbered, &existing_summary, request.context_text, request.full_review)
            .map_err(anyhow::Error::new)
            .context("Extraction collaborator call failed")?;

        let mut response = IncrementalResponse::decode(&raw)
            .context("Extraction response rejected")?;

        // The line range covered by this call; indices are authoritative
        // but untrusted, so anything outside it is discarded up front
        let line_range = (request.line_offset + 1, last_line);
        sanitize_line_indices(&mut response.statements, line_range);

        if !request.full_review && !response.updates.is_empty() {
            log::warn!(
                "Dropping {} update(s): full review was not requested",
                response.updates.len(),
            );
            response.updates.clear();
        }

        let transcript_id = request.transcript_id;
        self.store.with_connection(move |conn| {
            let tx = conn.unchecked_transaction()
                .context("Failed to start reconciliation transaction")?;

            let mut claim_texts = collect_claim_texts(&existing);
            let mut position = next_position_impl(&tx, transcript_id)?;
            let mut outcome = ReconcileOutcome::default();

            insert_statements(
                &tx,
                transcript_id,
                &response.statements,
                None,
                &mut position,
                &mut claim_texts,
                &mut outcome.statements_inserted,
            )?;

            // Updates run after all inserts so a newly inserted statement
            // is a valid reparenting target
            for update in &response.updates {
                if apply_update(&tx, transcript_id, update, &mut claim_texts)? {
                    outcome.updates_applied += 1;
                } else {
                    outcome.updates_dropped += 1;
                }
            }

            tx.commit().context("Failed to commit reconciliation")?;
            log::info!(
                "Reconciled transcript {}: {} inserted, {} updates applied, {} dropped",
                transcript_id,
                outcome.statements_inserted,
                outcome.updates_applied,
                outcome.updates_dropped,
            );
            Ok(outcome)
        })
    }
}

fn count_statements(statements: &[Statement]) -> usize {
    statements.iter().map(|s| 1 + count_statements(&s.children)).sum()
}

/// Claim text -> claim id for parent_text matching. Plain text equality;
/// the earliest occurrence wins on duplicate text.
fn collect_claim_texts(nodes: &[ClaimTreeNode]) -> HashMap<String, i64> {
    let mut map = HashMap::new();
    fn walk(nodes: &[ClaimTreeNode], map: &mut HashMap<String, i64>) {
        for node in nodes {
            map.entry(node.text.clone()).or_insert(node.claim_id);
            walk(&node.children, map);
        }
    }
    walk(nodes, &mut map);
    map
}

fn sanitize_line_indices(statements: &mut [Statement], (lo, hi): (i64, i64)) {
    for statement in statements {
        if let Some(index) = statement.line_index {
            if index < lo || index > hi {
                log::warn!(
                    "Line index {} outside numbered range [{}, {}], clearing",
                    index, lo, hi,
                );
                statement.line_index = None;
            }
        }
        sanitize_line_indices(&mut statement.children, (lo, hi));
    }
}

fn insert_statements(
    conn: &Connection,
    transcript_id: i64,
    statements: &[Statement],
    parent_claim_id: Option<i64>,
    position: &mut i64,
    claim_texts: &mut HashMap<String, i64>,
    inserted: &mut usize,
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
        *inserted += 1;

        let effective_parent = match parent_claim_id {
            Some(parent) => Some(parent),
            None => match statement.parent_text.as_deref() {
                Some(text) if !text.is_empty() => {
                    let found = claim_texts.get(text).copied();
                    if found.is_none() {
                        log::warn!(
                            "parent_text {:?} matches no existing claim, inserting top-level",
                            text,
                        );
                    }
                    found
                }
                _ => None,
            },
        };
        if let Some(parent) = effective_parent {
            save_edge_impl(conn, parent, claim_id, claim_type, transcript_id)?;
        }

        claim_texts.entry(statement.text.clone()).or_insert(claim_id);

        if !statement.children.is_empty() {
            insert_statements(
                conn,
                transcript_id,
                &statement.children,
                Some(claim_id),
                position,
                claim_texts,
                inserted,
            )?;
        }
    }
    Ok(())
}

/// Where an update wants to move a claim
enum ParentChange {
    Keep,
    Promote,
    Reparent(i64),
}

/// Apply one corrective update. Returns false (dropped, logged) for any
/// malformed instruction; the rest of the batch continues.
fn apply_update(
    conn: &Connection,
    transcript_id: i64,
    update: &StatementUpdate,
    claim_texts: &mut HashMap<String, i64>,
) -> Result<bool> {
    let claim_id: Option<i64> = conn.query_row(
        r#"
        SELECT claim_id FROM occurrences
        WHERE transcript_id = ?1 AND line_index = ?2
        ORDER BY position ASC
        LIMIT 1
        "#,
        params![transcript_id, update.line_index],
        |row| row.get(0),
    ).optional().context("Failed to resolve update target")?;

    let claim_id = match claim_id {
        Some(id) => id,
        None => {
            log::warn!(
                "Update target line {} resolves to no occurrence, dropping",
                update.line_index,
            );
            return Ok(false);
        }
    };

    // Validate everything before writing anything: each update applies
    // fully or not at all
    let new_type = match update.statement_type.as_deref() {
        Some(raw) => match StatementType::parse(raw) {
            Some(t) => Some(t),
            None => {
                log::warn!(
                    "Update for line {} carries unrecognized type '{}', dropping",
                    update.line_index, raw,
                );
                return Ok(false);
            }
        },
        None => None,
    };

    let parent_change = match update.parent_text.as_deref() {
        None => ParentChange::Keep,
        Some("") => ParentChange::Promote,
        Some(text) => match claim_texts.get(text).copied() {
            Some(parent) if parent != claim_id => ParentChange::Reparent(parent),
            Some(_) => {
                log::warn!(
                    "Update for line {} would parent a claim under itself, dropping",
                    update.line_index,
                );
                return Ok(false);
            }
            None => {
                log::warn!(
                    "Update for line {} names unknown parent_text {:?}, dropping",
                    update.line_index, text,
                );
                return Ok(false);
            }
        },
    };

    if let Some(text) = &update.text {
        conn.execute(
            "UPDATE claims SET text = ? WHERE id = ?",
            params![text, claim_id],
        ).context("Failed to update claim text")?;
        claim_texts.entry(text.clone()).or_insert(claim_id);
    }

    if let Some(new_type) = new_type {
        conn.execute(
            "UPDATE claims SET type = ? WHERE id = ?",
            params![new_type.as_str(), claim_id],
        ).context("Failed to update claim type")?;
    }

    match parent_change {
        ParentChange::Keep => {}
        ParentChange::Promote => {
            conn.execute(
                "DELETE FROM edges WHERE transcript_id = ? AND child_claim_id = ?",
                params![transcript_id, claim_id],
            ).context("Failed to detach claim")?;
        }
        ParentChange::Reparent(parent) => {
            // A claim has at most one incoming edge per transcript;
            // retargeting replaces it
            conn.execute(
                "DELETE FROM edges WHERE transcript_id = ? AND child_claim_id = ?",
                params![transcript_id, claim_id],
            ).context("Failed to detach claim")?;

            let relation: String = conn.query_row(
                "SELECT type FROM claims WHERE id = ?",
                params![claim_id],
                |row| row.get(0),
            ).context("Failed to read claim type for reparent")?;
            let relation = StatementType::parse(&relation).unwrap_or(StatementType::Claim);
            save_edge_impl(conn, parent, claim_id, relation, transcript_id)?;
        }
    }

    Ok(true)
}
