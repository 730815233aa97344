// Database models - Utterance
use serde::{Deserialize, Serialize};

/// A diarized conversational turn.
///
/// `speaker` holds the transcript-local id ("speaker_1"); the display name
/// is resolved through the speaker registry at read time. Positions are
/// 1-based and contiguous per transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    pub text: String,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub start_ms: Option<i64>,
    #[serde(default)]
    pub end_ms: Option<i64>,
}
