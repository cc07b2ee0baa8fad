//! Milvus vector store over the REST v2 API
//!
//! Each chunk is one row: `id` (primary key), `vector`, `text`, `metadata`
//! (JSON) and `seq`, an insertion stamp used to break score ties.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::providers::vector_store::VectorStoreProvider;
use crate::retrieval::MetadataFilter;
use crate::types::{Metadata, ScoredEntry, VectorEntry};

const TEXT_MAX_LENGTH: usize = 65_535;
const ID_MAX_LENGTH: usize = 128;

#[derive(Deserialize)]
struct MilvusResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct SearchHit {
    id: String,
    #[serde(default)]
    distance: f32,
    #[serde(default)]
    text: String,
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    seq: i64,
}

#[derive(Deserialize)]
struct SeqRow {
    id: String,
    seq: i64,
}

/// Vector store backed by a Milvus collection
pub struct MilvusVectorStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    token: Option<String>,
    dimensions: usize,
    collection_ready: OnceCell<()>,
    /// Last insertion stamp handed out by this store
    last_seq: AtomicI64,
}

impl MilvusVectorStore {
    pub fn new(config: &VectorDbConfig, dimensions: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.milvus_url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            token: config.token.clone(),
            dimensions,
            collection_ready: OnceCell::new(),
            last_seq: AtomicI64::new(0),
        })
    }

    async fn call(&self, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}/v2/vectordb/{}", self.base_url, path);
        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::storage(format!("Milvus request to {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::storage(format!("Milvus {} returned {}: {}", path, status, body)));
        }

        let parsed: MilvusResponse = response
            .json()
            .await
            .map_err(|e| Error::storage(format!("Invalid Milvus response from {}: {}", path, e)))?;

        if parsed.code != 0 {
            return Err(Error::storage(format!(
                "Milvus {} failed with code {}: {}",
                path,
                parsed.code,
                parsed.message.unwrap_or_default()
            )));
        }
        Ok(parsed.data)
    }

    /// Create the collection on first use if it does not exist
    async fn ensure_collection(&self) -> Result<()> {
        self.collection_ready
            .get_or_try_init(|| async {
                let has = self
                    .call("collections/has", json!({ "collectionName": self.collection }))
                    .await?;
                if has.get("has").and_then(Value::as_bool).unwrap_or(false) {
                    return Ok(());
                }

                tracing::info!(
                    "Creating Milvus collection {} ({} dimensions)",
                    self.collection,
                    self.dimensions
                );
                self.call("collections/create", self.create_collection_body()).await?;
                Ok::<(), Error>(())
            })
            .await
            .map(|_| ())
    }

    fn create_collection_body(&self) -> Value {
        json!({
            "collectionName": self.collection,
            "schema": {
                "autoId": false,
                "enableDynamicField": false,
                "fields": [
                    {
                        "fieldName": "id",
                        "dataType": "VarChar",
                        "isPrimary": true,
                        "elementTypeParams": { "max_length": ID_MAX_LENGTH }
                    },
                    {
                        "fieldName": "vector",
                        "dataType": "FloatVector",
                        "elementTypeParams": { "dim": self.dimensions }
                    },
                    {
                        "fieldName": "text",
                        "dataType": "VarChar",
                        "elementTypeParams": { "max_length": TEXT_MAX_LENGTH }
                    },
                    { "fieldName": "metadata", "dataType": "JSON" },
                    { "fieldName": "seq", "dataType": "Int64" }
                ]
            },
            "indexParams": [
                { "fieldName": "vector", "metricType": "COSINE", "indexType": "AUTOINDEX" }
            ]
        })
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::storage(format!(
                "Vector has {} dimensions, collection {} expects {}",
                vector.len(),
                self.collection,
                self.dimensions
            )));
        }
        Ok(())
    }

    fn id_list_expression(ids: &[String]) -> String {
        let quoted: Vec<String> = ids.iter().map(|id| Value::from(id.as_str()).to_string()).collect();
        format!("id in [{}]", quoted.join(", "))
    }
}

/// Compile a metadata filter to a Milvus boolean expression over the JSON field
pub fn filter_expression(filter: &MetadataFilter) -> String {
    fn field(attribute: &str) -> String {
        format!("metadata[{}]", Value::from(attribute))
    }

    fn join(filters: &[MetadataFilter], op: &str, empty: &str) -> String {
        if filters.is_empty() {
            return empty.to_string();
        }
        let parts: Vec<String> = filters
            .iter()
            .map(|f| format!("({})", filter_expression(f)))
            .collect();
        parts.join(&format!(" {} ", op))
    }

    match filter {
        MetadataFilter::Eq { attribute, value } => format!("{} == {}", field(attribute), value),
        MetadataFilter::Ne { attribute, value } => format!("{} != {}", field(attribute), value),
        MetadataFilter::Gt { attribute, value } => format!("{} > {}", field(attribute), value),
        MetadataFilter::Gte { attribute, value } => format!("{} >= {}", field(attribute), value),
        MetadataFilter::Lt { attribute, value } => format!("{} < {}", field(attribute), value),
        MetadataFilter::Lte { attribute, value } => format!("{} <= {}", field(attribute), value),
        MetadataFilter::In { attribute, values } => {
            format!("{} in {}", field(attribute), Value::Array(values.clone()))
        }
        MetadataFilter::And { filters } => join(filters, "and", r#"id != """#),
        MetadataFilter::Or { filters } => join(filters, "or", r#"id == """#),
        MetadataFilter::Not { filter } => format!("not ({})", filter_expression(filter)),
    }
}

impl MilvusVectorStore {
    /// Reserve `count` consecutive insertion stamps and return the first.
    ///
    /// Stamps never go below the clock in microseconds, so they keep rising
    /// across restarts, and never repeat within this store.
    fn reserve_seq(&self, count: usize) -> i64 {
        let now = chrono::Utc::now().timestamp_micros();
        let count = count as i64;
        let first_after = |last: i64| last.saturating_add(1).max(now);

        let previous = match self.last_seq.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(first_after(last).saturating_add(count - 1))
        }) {
            Ok(last) | Err(last) => last,
        };
        first_after(previous)
    }

    /// Insertion stamps already stored for any of `ids`
    async fn existing_seqs(&self, ids: &[String]) -> Result<HashMap<String, i64>> {
        let data = self
            .call(
                "entities/query",
                json!({
                    "collectionName": self.collection,
                    "filter": Self::id_list_expression(ids),
                    "outputFields": ["id", "seq"],
                }),
            )
            .await?;
        if data.is_null() {
            return Ok(HashMap::new());
        }

        let rows: Vec<SeqRow> = serde_json::from_value(data)
            .map_err(|e| Error::storage(format!("Unexpected Milvus query result: {}", e)))?;
        Ok(rows.into_iter().map(|row| (row.id, row.seq)).collect())
    }
}

#[async_trait]
impl VectorStoreProvider for MilvusVectorStore {
    async fn upsert(&self, entry: VectorEntry) -> Result<()> {
        self.upsert_batch(vec![entry]).await
    }

    async fn upsert_batch(&self, entries: Vec<VectorEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        for entry in &entries {
            self.check_dimensions(&entry.vector)?;
        }
        self.ensure_collection().await?;

        // Replaced ids keep their stamp; new ids get fresh ones in batch order
        let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        let mut seqs = self.existing_seqs(&ids).await?;
        let replaced = seqs.len();
        let fresh = entries.iter().filter(|e| !seqs.contains_key(&e.id)).count();
        let mut next = if fresh > 0 { self.reserve_seq(fresh) } else { 0 };

        let rows: Vec<Value> = entries
            .into_iter()
            .map(|entry| {
                let seq = *seqs.entry(entry.id.clone()).or_insert_with(|| {
                    next += 1;
                    next - 1
                });
                json!({
                    "id": entry.id,
                    "vector": entry.vector,
                    "text": entry.text,
                    "metadata": entry.metadata,
                    "seq": seq,
                })
            })
            .collect();

        let count = rows.len();
        if replaced > 0 {
            tracing::debug!("{} of {} vectors replace existing ids", replaced, count);
        }
        self.call(
            "entities/upsert",
            json!({ "collectionName": self.collection, "data": rows }),
        )
        .await?;
        tracing::debug!("Upserted {} vectors into {}", count, self.collection);
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredEntry>> {
        self.check_dimensions(vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        self.ensure_collection().await?;

        let mut body = json!({
            "collectionName": self.collection,
            "data": [vector],
            "annsField": "vector",
            "limit": k,
            "outputFields": ["text", "metadata", "seq"],
        });
        if let Some(filter) = filter {
            body["filter"] = Value::String(filter_expression(filter));
        }

        let data = self.call("entities/search", body).await?;
        let mut hits: Vec<SearchHit> = serde_json::from_value(data)
            .map_err(|e| Error::storage(format!("Unexpected Milvus search result: {}", e)))?;

        hits.sort_by(|a, b| {
            b.distance
                .partial_cmp(&a.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.seq.cmp(&b.seq))
        });
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .map(|hit| ScoredEntry {
                id: hit.id,
                text: hit.text,
                metadata: hit.metadata.unwrap_or_default(),
                score: hit.distance,
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.ensure_collection().await?;
        let expr = Self::id_list_expression(ids);

        let existing = self
            .call(
                "entities/query",
                json!({
                    "collectionName": self.collection,
                    "filter": expr,
                    "outputFields": ["id"],
                }),
            )
            .await?;
        let found = existing.as_array().map(Vec::len).unwrap_or(0);

        self.call(
            "entities/delete",
            json!({ "collectionName": self.collection, "filter": expr }),
        )
        .await?;
        Ok(found)
    }

    async fn len(&self) -> Result<usize> {
        self.ensure_collection().await?;
        let data = self
            .call(
                "entities/query",
                json!({
                    "collectionName": self.collection,
                    "filter": "",
                    "outputFields": ["count(*)"],
                }),
            )
            .await?;

        Ok(data
            .get(0)
            .and_then(|row| row.get("count(*)"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize)
    }

    async fn health_check(&self) -> Result<bool> {
        match self
            .call("collections/has", json!({ "collectionName": self.collection }))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Milvus health check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn name(&self) -> &str {
        "milvus"
    }
}
