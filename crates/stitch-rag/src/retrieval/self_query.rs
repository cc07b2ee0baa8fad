//! Self-querying retrieval: the LLM turns a question into a search string and filter

use serde::Deserialize;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::{EmbeddingProvider, LanguageModel, VectorStoreProvider};
use crate::retry::RetryPolicy;
use crate::types::ScoredEntry;

use super::filter::{AttributeInfo, MetadataFilter};

/// Search string plus optional metadata constraint
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredQuery {
    pub query: String,
    pub filter: Option<MetadataFilter>,
}

impl StructuredQuery {
    /// Unfiltered search for the raw question
    pub fn plain(question: &str) -> Self {
        Self {
            query: question.to_string(),
            filter: None,
        }
    }
}

#[derive(Deserialize)]
struct RawStructuredQuery {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    filter: Option<serde_json::Value>,
}

/// Parse the LLM's structured-query output.
///
/// Unparseable output falls back to the raw question with no filter; a filter
/// that does not parse or names attributes outside `attributes` is dropped
/// while the query string is kept.
pub fn parse_structured_query(raw: &str, question: &str, attributes: &[AttributeInfo]) -> StructuredQuery {
    let Some(json) = extract_json_object(raw) else {
        tracing::warn!("Self-query output had no JSON object, searching raw question");
        return StructuredQuery::plain(question);
    };

    let parsed: RawStructuredQuery = match serde_json::from_str(json) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Self-query output was not valid JSON ({}), searching raw question", e);
            return StructuredQuery::plain(question);
        }
    };

    let query = parsed
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| question.to_string());

    let filter = match parsed.filter {
        None | Some(serde_json::Value::Null) => None,
        Some(value) => match serde_json::from_value::<MetadataFilter>(value) {
            Ok(filter) => match filter.validate(attributes) {
                Ok(()) => Some(filter),
                Err(e) => {
                    tracing::warn!("Dropping self-query filter: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Dropping malformed self-query filter: {}", e);
                None
            }
        },
    };

    StructuredQuery { query, filter }
}

/// Slice from the first `{` to the last `}`, skipping code fences and prose
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Retriever that asks the language model for a structured query before searching
pub struct SelfQueryRetriever {
    llm: Arc<dyn LanguageModel>,
    embedder: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStoreProvider>,
    content_description: String,
    attributes: Vec<AttributeInfo>,
    k: usize,
    embed_retry: RetryPolicy,
}

impl SelfQueryRetriever {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
        content_description: impl Into<String>,
        attributes: Vec<AttributeInfo>,
        k: usize,
    ) -> Self {
        Self {
            llm,
            embedder,
            vector_store,
            content_description: content_description.into(),
            attributes,
            k,
            embed_retry: RetryPolicy::default(),
        }
    }

    /// Retry policy used around the query embedding
    pub fn with_embed_retry(mut self, policy: RetryPolicy) -> Self {
        self.embed_retry = policy;
        self
    }

    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    /// Ask the LLM for a structured query; LLM failures are [`Error::Generation`]
    pub async fn construct_query(&self, question: &str) -> Result<StructuredQuery> {
        let prompt = PromptBuilder::build_self_query_prompt(
            question,
            &self.content_description,
            &self.attributes,
        );
        let raw = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|e| Error::generation(format!("Query construction failed: {}", e)))?;

        let structured = parse_structured_query(&raw, question, &self.attributes);
        tracing::debug!(
            "Self-query: {:?} -> query {:?}, filter {:?}",
            question,
            structured.query,
            structured.filter
        );
        Ok(structured)
    }

    /// Up to `k` chunks relevant to `question`, best first
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredEntry>> {
        let structured = self.construct_query(question).await?;

        let embedder = Arc::clone(&self.embedder);
        let query = structured.query.clone();
        let vector = self
            .embed_retry
            .run("query embedding", || {
                let embedder = Arc::clone(&embedder);
                let query = query.clone();
                async move { embedder.embed(&query).await }
            })
            .await?;

        self.vector_store
            .query(&vector, self.k, structured.filter.as_ref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> Vec<AttributeInfo> {
        AttributeInfo::defaults()
    }

    #[test]
    fn test_parses_query_and_filter() {
        let raw = r#"```json
{"query": "budgets", "filter": {"op": "eq", "attribute": "filetype", "value": "pdf"}}
```"#;
        let sq = parse_structured_query(raw, "What do PDFs say about budgets?", &attrs());
        assert_eq!(sq.query, "budgets");
        assert_eq!(sq.filter, Some(MetadataFilter::eq("filetype", "pdf")));
    }

    #[test]
    fn test_null_filter() {
        let sq = parse_structured_query(r#"{"query": "cats", "filter": null}"#, "cats?", &attrs());
        assert_eq!(sq, StructuredQuery { query: "cats".into(), filter: None });
    }

    #[test]
    fn test_unknown_attribute_drops_filter_only() {
        let raw = r#"{"query": "cats", "filter": {"op": "eq", "attribute": "author", "value": "me"}}"#;
        let sq = parse_structured_query(raw, "cats by me?", &attrs());
        assert_eq!(sq.query, "cats");
        assert!(sq.filter.is_none());
    }

    #[test]
    fn test_garbage_falls_back_to_question() {
        let sq = parse_structured_query("I cannot help with that.", "what is rust?", &attrs());
        assert_eq!(sq, StructuredQuery::plain("what is rust?"));

        let sq = parse_structured_query("{not json}", "what is rust?", &attrs());
        assert_eq!(sq, StructuredQuery::plain("what is rust?"));
    }

    #[test]
    fn test_empty_query_uses_question() {
        let sq = parse_structured_query(r#"{"query": "  "}"#, "original", &attrs());
        assert_eq!(sq.query, "original");
    }
}
