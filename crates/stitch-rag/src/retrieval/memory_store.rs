//! In-process vector store using exact cosine similarity

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::providers::VectorStoreProvider;
use crate::types::{ScoredEntry, VectorEntry};

use super::MetadataFilter;

struct StoredEntry {
    entry: VectorEntry,
    /// Insertion order, kept when the id is replaced
    seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, StoredEntry>,
    next_seq: u64,
    /// Fixed at construction or by the first stored vector
    dimensions: Option<usize>,
}

/// Vector store held in memory and scanned linearly on every query.
///
/// Suitable for development, tests and small corpora. Writes take a
/// `parking_lot::RwLock` briefly, so upserts of different ids never observe
/// each other half-applied.
pub struct InMemoryVectorStore {
    inner: RwLock<Inner>,
}

impl InMemoryVectorStore {
    /// Create an empty store whose dimension is taken from the first vector stored
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Create an empty store that rejects vectors of another dimension
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                dimensions: Some(dimensions),
                ..Inner::default()
            }),
        }
    }

    fn check_dimensions(expected: Option<usize>, vector: &[f32]) -> Result<()> {
        match expected {
            Some(d) if vector.len() != d => Err(Error::storage(format!(
                "Vector has {} dimensions, store expects {}",
                vector.len(),
                d
            ))),
            _ => Ok(()),
        }
    }

    fn insert_locked(inner: &mut Inner, entry: VectorEntry) {
        match inner.entries.get_mut(&entry.id) {
            Some(existing) => existing.entry = entry,
            None => {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                inner.entries.insert(entry.id.clone(), StoredEntry { entry, seq });
            }
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine similarity; 0.0 when either vector has zero magnitude or the
/// lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStoreProvider for InMemoryVectorStore {
    async fn upsert(&self, entry: VectorEntry) -> Result<()> {
        self.upsert_batch(vec![entry]).await
    }

    async fn upsert_batch(&self, entries: Vec<VectorEntry>) -> Result<()> {
        let mut inner = self.inner.write();
        let expected = inner
            .dimensions
            .or_else(|| entries.first().map(|e| e.vector.len()));
        for entry in &entries {
            Self::check_dimensions(expected, &entry.vector)?;
        }

        inner.dimensions = expected;
        for entry in entries {
            Self::insert_locked(&mut inner, entry);
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredEntry>> {
        let inner = self.inner.read();
        Self::check_dimensions(inner.dimensions, vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, u64, &VectorEntry)> = inner
            .entries
            .values()
            .filter(|stored| filter.map_or(true, |f| f.matches(&stored.entry.metadata)))
            .map(|stored| (cosine_similarity(&stored.entry.vector, vector), stored.seq, &stored.entry))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, _, entry)| ScoredEntry {
                id: entry.id.clone(),
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
                score,
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        let mut inner = self.inner.write();
        Ok(ids.iter().filter(|id| inner.entries.remove(id.as_str()).is_some()).count())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.read().entries.len())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;
    use serde_json::json;
    use std::sync::Arc;

    fn entry(id: &str, vector: Vec<f32>, filetype: &str) -> VectorEntry {
        let mut metadata = Metadata::new();
        metadata.insert("filetype".into(), json!(filetype));
        VectorEntry {
            id: id.into(),
            vector,
            text: format!("text of {}", id),
            metadata,
        }
    }

    #[tokio::test]
    async fn test_exact_vector_scores_one() {
        let store = InMemoryVectorStore::new();
        store.upsert(entry("a", vec![0.3, 0.4, 0.5], "txt")).await.unwrap();
        store.upsert(entry("b", vec![-1.0, 0.0, 0.0], "txt")).await.unwrap();

        let hits = store.query(&[0.3, 0.4, 0.5], 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_results_are_ordered_and_truncated() {
        let store = InMemoryVectorStore::new();
        store.upsert(entry("far", vec![0.0, 1.0], "txt")).await.unwrap();
        store.upsert(entry("near", vec![1.0, 0.1], "txt")).await.unwrap();
        store.upsert(entry("mid", vec![1.0, 1.0], "txt")).await.unwrap();

        let hits = store.query(&[1.0, 0.0], 2, None).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order_across_replace() {
        let store = InMemoryVectorStore::new();
        store.upsert(entry("first", vec![1.0, 0.0], "txt")).await.unwrap();
        store.upsert(entry("second", vec![1.0, 0.0], "txt")).await.unwrap();
        // Replacing keeps "first" ahead of "second"
        store.upsert(entry("first", vec![2.0, 0.0], "pdf")).await.unwrap();

        let hits = store.query(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits[0].id, "first");
        assert_eq!(hits[1].id, "second");
        assert_eq!(hits[0].metadata["filetype"], "pdf");
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_filter_excludes_non_matching() {
        let store = InMemoryVectorStore::new();
        store.upsert(entry("a", vec![1.0, 0.0], "pdf")).await.unwrap();
        store.upsert(entry("b", vec![1.0, 0.0], "html")).await.unwrap();

        let filter = MetadataFilter::eq("filetype", "html");
        let hits = store.query(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryVectorStore::new();
        store.upsert(entry("a", vec![1.0], "txt")).await.unwrap();
        let removed = store.delete(&["a".to_string(), "missing".to_string()]).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let store = InMemoryVectorStore::with_dimensions(3);
        let err = store.upsert(entry("a", vec![1.0], "txt")).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_first_vector_fixes_dimension() {
        let store = InMemoryVectorStore::new();
        store.upsert(entry("a", vec![1.0, 0.0], "txt")).await.unwrap();

        let err = store.upsert(entry("b", vec![1.0, 0.0, 5.0], "txt")).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        let err = store.query(&[1.0, 0.0, 5.0], 1, None).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mixed_dimension_batch_is_rejected_whole() {
        let store = InMemoryVectorStore::new();
        let err = store
            .upsert_batch(vec![entry("a", vec![1.0, 0.0], "txt"), entry("b", vec![1.0], "txt")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(store.is_empty().await.unwrap());
    }

    #[test]
    fn test_cosine_of_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_do_not_interfere() {
        let store = Arc::new(InMemoryVectorStore::new());
        let mut handles = Vec::new();
        for i in 0..64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .upsert(entry(&format!("id-{}", i), vec![i as f32, 1.0], "txt"))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.len().await.unwrap(), 64);
        let hits = store.query(&[63.0, 1.0], 1, None).await.unwrap();
        assert_eq!(hits[0].text, "text of id-63");
    }
}
