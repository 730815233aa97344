// Database module for argraph
// Provides SQLite persistence for transcripts, speakers, utterances,
// claims, occurrences, and edges

pub mod manager;
pub mod migrations;
pub mod models;
pub mod transcripts_repo;
pub mod diarization_repo;
pub mod claims_repo;
pub mod claim_tree;
pub mod speakers_repo;

pub use manager::DatabaseManager;
pub use models::*;
