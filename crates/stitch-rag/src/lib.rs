//! stitch-rag: conversational retrieval-augmented generation behind a small HTTP surface
//!
//! Documents are fetched or uploaded, split into overlapping chunks, embedded
//! and indexed. Questions go through a self-querying retriever and a chat
//! model with token-bounded conversation memory. Speech, OCR, summaries and
//! object storage are exposed alongside as thin adapters over external APIs.

pub mod config;
pub mod conversation;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod rag;
pub mod retrieval;
pub mod retry;
pub mod server;
pub mod storage;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use rag::{RagOptions, RagOrchestrator, RagServices};
pub use types::{Chunk, Document, DocumentId, FileType, ScoredEntry};
