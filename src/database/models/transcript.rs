// Database models - Transcript
use serde::{Deserialize, Serialize};

/// A conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub created_at: String,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// A transcript as shown in list views, with its claim count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSummary {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub created_at: String,
    pub claim_count: i64,
}
