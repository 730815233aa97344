// Database models - Speakers
use serde::{Deserialize, Serialize};

/// A global speaker identity, one row per distinct display name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speaker {
    pub id: i64,
    pub name: String,
    pub auto_generated: bool,
}

/// A per-transcript local speaker id ("speaker_1") mapped to an identity.
/// Occurrences and utterances reference the local id, so a rename touches
/// only the speakers row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSpeaker {
    pub transcript_id: i64,
    pub local_id: String,
    pub speaker_id: i64,
    pub auto_generated: bool,
}

/// A speaker as shown in the global listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerSummary {
    pub id: i64,
    pub name: String,
    pub auto_generated: bool,
    pub conversation_count: i64,
    pub claim_count: i64,
}

/// One conversation a speaker participated in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerConversation {
    pub slug: String,
    pub title: String,
    pub created_at: String,
    pub claim_count: i64,
}
