//! Provider abstractions for embeddings, chat, vector search, storage, speech and OCR
//!
//! Each concern is a trait so backends can be swapped by configuration:
//! OpenAI-compatible HTTP APIs, Milvus or an in-process index, SQLite, the
//! local filesystem, and Google Cloud behind the `gcp` feature.

pub mod document_store;
pub mod embedding;
pub mod llm;
pub mod local;
pub mod milvus;
pub mod object_store;
pub mod ocr;
pub mod openai;
pub mod rapidapi;
pub mod speech;
pub mod vector_store;

#[cfg(feature = "gcp")]
pub mod gcp;

pub use document_store::DocumentStore;
pub use embedding::EmbeddingProvider;
pub use llm::{ChatMessage, LanguageModel, Role};
pub use local::LocalObjectStore;
pub use milvus::{filter_expression, MilvusVectorStore};
pub use object_store::ObjectStore;
pub use ocr::OcrProvider;
pub use openai::{OpenAiChat, OpenAiClient, OpenAiEmbedder};
pub use rapidapi::RapidApiOcr;
pub use speech::{SpeechRecognizer, SpeechSynthesizer};
pub use vector_store::VectorStoreProvider;
