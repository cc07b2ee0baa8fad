//! Retrieval-augmented generation over ingested documents

mod orchestrator;

pub use orchestrator::{IngestedDocument, RagOptions, RagOrchestrator, RagServices};
