//! Vector store provider trait for storing and searching embeddings

use async_trait::async_trait;

use crate::error::Result;
use crate::retrieval::MetadataFilter;
use crate::types::{ScoredEntry, VectorEntry};

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `InMemoryVectorStore`: exact cosine scan in process memory
/// - `MilvusVectorStore`: Milvus REST v2
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Store or replace the entry with the same id
    async fn upsert(&self, entry: VectorEntry) -> Result<()>;

    /// Store or replace several entries
    async fn upsert_batch(&self, entries: Vec<VectorEntry>) -> Result<()> {
        for entry in entries {
            self.upsert(entry).await?;
        }
        Ok(())
    }

    /// Up to `k` entries by descending cosine similarity, earlier insertions
    /// winning ties. Entries failing `filter` are never returned.
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredEntry>>;

    /// Remove entries by id, returning how many existed
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    /// Get total number of vectors stored
    async fn len(&self) -> Result<usize>;

    /// Check if store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
