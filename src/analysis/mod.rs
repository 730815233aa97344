// Analysis module for argraph
// Bridges the external extraction collaborator and the graph store:
// response decoding, incremental reconciliation, and timing heuristics

pub mod provider;
pub mod types;
pub mod summary;
pub mod reconciler;
pub mod timestamps;

pub use provider::{ExtractionProvider, TranscriptionProvider, ProviderError};
pub use reconciler::{ReconcileOutcome, ReconcileRequest, Reconciler};
pub use timestamps::{TimedSegment, assign_timestamps};
