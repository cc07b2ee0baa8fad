//! Core types shared across the service

pub mod api;
pub mod document;

pub use api::{
    AudioInput, AudioResponse, CompletionResponse, DocUploadResponse, DocumentAddedResponse,
    HistoryResponse, OcrResponse, TextInput, TranscriptResponse, UrlInput,
};
pub use document::{
    hash_content, Chunk, Document, DocumentId, DocumentInfo, EmbeddedChunk, FileType, Metadata,
    ScoredEntry, VectorEntry, META_CHUNK_INDEX, META_DOCUMENT_ID, META_FILETYPE, META_SOURCE,
};
