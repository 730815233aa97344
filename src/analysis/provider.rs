//! Collaborator interfaces
//!
//! The transcription and extraction services live outside this crate; the
//! core consumes them through these traits and treats every response as
//! untrusted input.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error types for collaborator calls. A failed call guarantees that
/// nothing was persisted for the enclosing operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProviderError {
    /// Collaborator not reachable or not configured
    Unavailable(String),
    /// Request failed (network, timeout, upstream status)
    RequestFailed(String),
    /// Collaborator returned no content
    EmptyResponse,
    /// Response text did not match any recognized shape
    MalformedResponse(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Unavailable(msg) => write!(f, "Collaborator unavailable: {}", msg),
            ProviderError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            ProviderError::EmptyResponse => write!(f, "Empty response from collaborator"),
            ProviderError::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Audio transcription collaborator: audio bytes in, plain text out
pub trait TranscriptionProvider: Send + Sync {
    fn transcribe(&self, audio: &[u8]) -> Result<String, ProviderError>;
}

/// Argument-structure extraction collaborator.
///
/// Both methods take line-numbered transcript text and return the raw
/// response text; decoding and validation stay on this side of the seam
/// (see `types::IncrementalResponse::decode`).
pub trait ExtractionProvider: Send + Sync {
    /// Full-transcript analysis
    fn extract(&self, numbered_transcript: &str) -> Result<String, ProviderError>;

    /// Incremental analysis of a new text span. `existing_summary` is the
    /// serialized statement tree so the collaborator sees prior structure
    /// without the raw source; `context_text` carries recent already-analyzed
    /// turns for flow continuity; `full_review` requests corrective updates.
    fn extract_incremental(
        &self,
        numbered_new_text: &str,
        existing_summary: &str,
        context_text: &str,
        full_review: bool,
    ) -> Result<String, ProviderError>;
}
