//! Document store trait for raw source documents

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Document, DocumentId, DocumentInfo};

/// Trait for persisting ingested documents and their raw bytes
///
/// Implementations:
/// - `SqliteDocumentStore`: single-file SQLite database
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a document, returning its id
    async fn save(&self, document: Document) -> Result<DocumentId>;

    /// Fetch a document with its content
    async fn get(&self, id: &DocumentId) -> Result<Option<Document>>;

    /// Delete a document, returning whether it existed
    async fn delete(&self, id: &DocumentId) -> Result<bool>;

    /// Metadata of all stored documents, newest first
    async fn list(&self) -> Result<Vec<DocumentInfo>>;

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
