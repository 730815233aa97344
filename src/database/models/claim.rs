// Database models - Claims, occurrences, edges, and graph views
use serde::{Deserialize, Serialize};

/// The enumerated statement/relation types. Collaborator output is
/// untrusted, so anything outside this set is normalized before storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementType {
    Claim,
    Response,
    Question,
    Agreement,
    Rebuttal,
    Tangent,
    Clarification,
    Evidence,
}

impl StatementType {
    /// Parse a raw type string (case-insensitive). Returns None for
    /// anything outside the enumerated set.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "claim" => Some(StatementType::Claim),
            "response" => Some(StatementType::Response),
            "question" => Some(StatementType::Question),
            "agreement" => Some(StatementType::Agreement),
            "rebuttal" => Some(StatementType::Rebuttal),
            "tangent" => Some(StatementType::Tangent),
            "clarification" => Some(StatementType::Clarification),
            "evidence" => Some(StatementType::Evidence),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementType::Claim => "claim",
            StatementType::Response => "response",
            StatementType::Question => "question",
            StatementType::Agreement => "agreement",
            StatementType::Rebuttal => "rebuttal",
            StatementType::Tangent => "tangent",
            StatementType::Clarification => "clarification",
            StatementType::Evidence => "evidence",
        }
    }
}

/// A canonical claim row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub claim_type: String,
}

/// One appearance of a claim within a specific transcript.
///
/// `speaker` holds the transcript-local speaker id for rows written after
/// the local-id backfill; historical rows may still hold a display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Occurrence {
    pub id: i64,
    pub claim_id: i64,
    pub transcript_id: i64,
    pub speaker: String,
    pub position: i64,
    pub text: String,
    #[serde(default)]
    pub line_index: Option<i64>,
}

/// A directed relation between two claims, scoped to one transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: i64,
    pub parent_claim_id: i64,
    pub child_claim_id: i64,
    pub relation: String,
    pub transcript_id: i64,
}

/// A node of the reconstructed statement tree for one transcript.
/// `line_index` is carried through unchanged from the occurrence row; it
/// is the join key for source-line correlation on the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimTreeNode {
    pub claim_id: i64,
    pub speaker: String,
    pub text: String,
    #[serde(rename = "type")]
    pub claim_type: String,
    #[serde(default)]
    pub line_index: Option<i64>,
    #[serde(default)]
    pub children: Vec<ClaimTreeNode>,
}

/// The global lineage of one claim: the claim plus its relations in
/// every transcript it appears in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimGraph {
    pub claim: Claim,
    pub inbound: Vec<Edge>,
    pub outbound: Vec<Edge>,
}

/// One claim in the full-graph view, with the transcripts it occurs in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub claim: Claim,
    pub transcript_ids: Vec<i64>,
}

/// Every claim and every edge across all transcripts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Edge>,
}
