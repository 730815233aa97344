// Database models - Re-exports all domain-specific models
//
// This module is split into focused files by domain:
// - transcript.rs: Conversation sessions
// - speaker.rs: Global speaker identities and per-transcript mappings
// - utterance.rs: Diarized conversational turns
// - claim.rs: Claims, occurrences, edges, and graph views

mod transcript;
mod speaker;
mod utterance;
mod claim;

pub use transcript::{Transcript, TranscriptSummary};
pub use speaker::{Speaker, TranscriptSpeaker, SpeakerSummary, SpeakerConversation};
pub use utterance::Utterance;
pub use claim::{
    StatementType, Claim, Occurrence, Edge, ClaimTreeNode, ClaimGraph,
    FullGraph, GraphNode,
};
