//! Ingestion and question answering over the injected services

use futures::stream::{self, StreamExt, TryStreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::conversation::{ConversationMemory, Turn};
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::ingestion::{load_text, DocumentFetcher, TextChunker};
use crate::providers::{DocumentStore, EmbeddingProvider, LanguageModel, VectorStoreProvider};
use crate::retrieval::{AttributeInfo, SelfQueryRetriever};
use crate::retry::RetryPolicy;
use crate::types::{
    Chunk, Document, DocumentId, EmbeddedChunk, FileType, Metadata, META_FILETYPE, META_SOURCE,
};

/// Service handles the orchestrator drives
#[derive(Clone)]
pub struct RagServices {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub vector_store: Arc<dyn VectorStoreProvider>,
    pub llm: Arc<dyn LanguageModel>,
    pub document_store: Arc<dyn DocumentStore>,
    pub fetcher: Arc<dyn DocumentFetcher>,
}

/// Tunables for ingestion and answering
#[derive(Debug, Clone)]
pub struct RagOptions {
    pub chunker: TextChunker,
    pub n_retrievals: usize,
    pub chat_max_tokens: usize,
    pub refine_answers: bool,
    pub parallel_embeddings: usize,
    pub embed_retry: RetryPolicy,
    pub content_description: String,
    pub attributes: Vec<AttributeInfo>,
}

impl RagOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            chunker: TextChunker::from_config(&config.chunking)?,
            n_retrievals: config.rag.n_retrievals,
            chat_max_tokens: config.rag.chat_max_tokens,
            refine_answers: config.rag.refine_answers,
            parallel_embeddings: config.processing.parallel_embeddings.max(1),
            embed_retry: config.embeddings.retry.clone(),
            content_description: config.rag.document_content_description.clone(),
            attributes: config.rag.attributes.clone(),
        })
    }
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            chunker: TextChunker::default(),
            n_retrievals: 4,
            chat_max_tokens: 3097,
            refine_answers: true,
            parallel_embeddings: 4,
            embed_retry: RetryPolicy::default(),
            content_description: "Personal and web documents".to_string(),
            attributes: AttributeInfo::defaults(),
        }
    }
}

/// Outcome of ingesting one document
#[derive(Debug, Clone, Serialize)]
pub struct IngestedDocument {
    pub document_id: DocumentId,
    pub file_type: FileType,
    pub chunks: usize,
    /// Text extracted by the loader
    #[serde(skip)]
    pub text: String,
}

/// Retrieval-augmented question answering with token-bounded conversation memory
pub struct RagOrchestrator {
    services: RagServices,
    options: RagOptions,
    retriever: SelfQueryRetriever,
    memory: Mutex<ConversationMemory>,
}

impl RagOrchestrator {
    pub fn new(services: RagServices, options: RagOptions) -> Self {
        let retriever = SelfQueryRetriever::new(
            Arc::clone(&services.llm),
            Arc::clone(&services.embedder),
            Arc::clone(&services.vector_store),
            options.content_description.clone(),
            options.attributes.clone(),
            options.n_retrievals,
        )
        .with_embed_retry(options.embed_retry.clone());

        let memory = Mutex::new(ConversationMemory::new(options.chat_max_tokens));

        Self {
            services,
            options,
            retriever,
            memory,
        }
    }

    pub fn services(&self) -> &RagServices {
        &self.services
    }

    pub fn options(&self) -> &RagOptions {
        &self.options
    }

    /// Fetch a document by URL and index it.
    ///
    /// The file type comes from the response's `Content-Type`.
    pub async fn add_document(&self, source_url: &str) -> Result<DocumentId> {
        let fetched = self.services.fetcher.fetch(source_url).await?;
        let file_type = FileType::from_content_type(fetched.content_type.as_deref().unwrap_or(""));

        tracing::info!(
            "Fetched {} ({} bytes, {})",
            source_url,
            fetched.bytes.len(),
            file_type
        );

        let ingested = self
            .ingest(source_url, file_type, fetched.content_type, fetched.bytes)
            .await?;
        Ok(ingested.document_id)
    }

    /// Index an uploaded file; the type comes from the content type, then the extension
    pub async fn add_upload(
        &self,
        filename: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<IngestedDocument> {
        let file_type = FileType::from_upload(content_type, filename);
        self.ingest(filename, file_type, content_type.map(str::to_string), bytes)
            .await
    }

    /// Load, chunk, embed and store one document.
    ///
    /// Every chunk is embedded before anything is written. If the vector write
    /// or the document write fails, vectors already written are deleted again.
    async fn ingest(
        &self,
        source: &str,
        file_type: FileType,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<IngestedDocument> {
        let document_id = uuid::Uuid::new_v4();
        let text = load_text(file_type, bytes.clone()).await?;

        let mut metadata = Metadata::new();
        metadata.insert(META_SOURCE.into(), source.into());
        metadata.insert(META_FILETYPE.into(), file_type.as_str().into());

        let chunks = self.options.chunker.chunk(document_id, &text, &metadata);
        if chunks.is_empty() {
            tracing::warn!("{} produced no text to index", source);
        }
        let chunk_count = chunks.len();

        let embedded = self.embed_chunks(chunks).await?;
        let entries: Vec<_> = embedded.into_iter().map(EmbeddedChunk::into_entry).collect();
        let entry_ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();

        if !entries.is_empty() {
            if let Err(e) = self.services.vector_store.upsert_batch(entries).await {
                self.rollback(&entry_ids).await;
                return Err(e);
            }
        }

        let document = Document::new(document_id, source, file_type, content_type, bytes);
        if let Err(e) = self.services.document_store.save(document).await {
            self.rollback(&entry_ids).await;
            return Err(e);
        }

        tracing::info!(
            "Indexed {} as {} ({} chunks)",
            source,
            document_id,
            chunk_count
        );

        Ok(IngestedDocument {
            document_id,
            file_type,
            chunks: chunk_count,
            text,
        })
    }

    /// Embed chunks with bounded concurrency, preserving order
    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>> {
        let embedder = &self.services.embedder;
        let retry = &self.options.embed_retry;

        stream::iter(chunks)
            .map(|chunk| async move {
                let embedding = retry
                    .run("chunk embedding", || embedder.embed(&chunk.text))
                    .await?;
                tracing::debug!("Embedded chunk {} of {}", chunk.ordinal, chunk.document_id);
                Ok::<_, Error>(EmbeddedChunk { chunk, embedding })
            })
            .buffered(self.options.parallel_embeddings)
            .try_collect()
            .await
    }

    async fn rollback(&self, entry_ids: &[String]) {
        if entry_ids.is_empty() {
            return;
        }
        match self.services.vector_store.delete(entry_ids).await {
            Ok(removed) => tracing::warn!("Rolled back {} vector entries", removed),
            Err(e) => tracing::error!(
                "Failed to roll back {} vector entries: {}",
                entry_ids.len(),
                e
            ),
        }
    }

    /// Answer a question from the indexed documents and the conversation so far
    pub async fn ask(&self, question: &str) -> Result<String> {
        let results = self.retriever.retrieve(question).await?;
        let context = PromptBuilder::build_context(&results);
        tracing::debug!("Retrieved {} chunk(s) for question", results.len());

        let history = self.memory.lock().history();
        let messages = PromptBuilder::build_chat_messages(&context, &history, question);

        let answer = self
            .services
            .llm
            .chat(&messages)
            .await
            .map_err(|e| Error::generation(format!("Answer generation failed: {}", e)))?;

        self.memory.lock().append(Turn::new(question, answer.clone()));

        if !self.options.refine_answers {
            return Ok(answer);
        }

        let prompt = PromptBuilder::build_refine_prompt(&context, question, &answer);
        self.services
            .llm
            .complete(&prompt)
            .await
            .map_err(|e| Error::generation(format!("Answer refinement failed: {}", e)))
    }

    /// Retained conversation turns, oldest first
    pub fn history(&self) -> Vec<Turn> {
        self.memory.lock().history()
    }

    /// `(total_tokens, max_tokens)` of the conversation memory
    pub fn history_usage(&self) -> (usize, usize) {
        let memory = self.memory.lock();
        (memory.total_tokens(), memory.max_tokens())
    }

    pub fn clear_history(&self) {
        self.memory.lock().clear();
        tracing::info!("Conversation history cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::FetchedDocument;
    use crate::providers::ChatMessage;
    use crate::retrieval::InMemoryVectorStore;
    use crate::storage::SqliteDocumentStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Bag-of-letters embedding: similar words land close together
    struct LetterEmbedder {
        fail: bool,
        calls: AtomicUsize,
    }

    impl LetterEmbedder {
        fn new() -> Self {
            Self { fail: false, calls: AtomicUsize::new(0) }
        }

        fn failing() -> Self {
            Self { fail: true, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for LetterEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::provider("letters", "model unavailable"));
            }
            let mut v = vec![0.0; 26];
            for c in text.to_ascii_lowercase().bytes().filter(u8::is_ascii_lowercase) {
                v[(c - b'a') as usize] += 1.0;
            }
            Ok(v)
        }

        fn dimensions(&self) -> usize {
            26
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "letters"
        }
    }

    /// Replays scripted replies and records every request
    #[derive(Default)]
    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String>>>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn with(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedLlm {
        async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
            self.requests.lock().push(messages.to_vec());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok("{\"query\": \"\", \"filter\": null}".to_string()))
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }

    struct StaticFetcher {
        status_error: bool,
        content_type: &'static str,
        body: &'static str,
    }

    #[async_trait]
    impl DocumentFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
            if self.status_error {
                return Err(Error::fetch(url, "HTTP 404 Not Found"));
            }
            Ok(FetchedDocument {
                url: url.to_string(),
                content_type: Some(self.content_type.to_string()),
                bytes: self.body.as_bytes().to_vec(),
            })
        }
    }

    /// Document store whose writes always fail
    struct BrokenDocumentStore;

    #[async_trait]
    impl DocumentStore for BrokenDocumentStore {
        async fn save(&self, _document: Document) -> Result<DocumentId> {
            Err(Error::storage("disk full"))
        }
        async fn get(&self, _id: &DocumentId) -> Result<Option<Document>> {
            Ok(None)
        }
        async fn delete(&self, _id: &DocumentId) -> Result<bool> {
            Ok(false)
        }
        async fn list(&self) -> Result<Vec<crate::types::DocumentInfo>> {
            Ok(Vec::new())
        }
        async fn health_check(&self) -> Result<bool> {
            Ok(false)
        }
        fn name(&self) -> &str {
            "broken"
        }
    }

    struct Harness {
        vectors: Arc<InMemoryVectorStore>,
        documents: Arc<SqliteDocumentStore>,
        llm: Arc<ScriptedLlm>,
        rag: RagOrchestrator,
    }

    fn fast_options() -> RagOptions {
        RagOptions {
            chunker: TextChunker::new(50, 10).unwrap(),
            embed_retry: RetryPolicy::none(),
            ..RagOptions::default()
        }
    }

    fn harness(
        embedder: LetterEmbedder,
        llm: ScriptedLlm,
        fetcher: StaticFetcher,
        options: RagOptions,
    ) -> Harness {
        let vectors = Arc::new(InMemoryVectorStore::new());
        let documents = Arc::new(SqliteDocumentStore::in_memory().unwrap());
        let llm = Arc::new(llm);
        let rag = RagOrchestrator::new(
            RagServices {
                embedder: Arc::new(embedder),
                vector_store: vectors.clone(),
                llm: llm.clone(),
                document_store: documents.clone(),
                fetcher: Arc::new(fetcher),
            },
            options,
        );
        Harness { vectors, documents, llm, rag }
    }

    fn html_fetcher() -> StaticFetcher {
        StaticFetcher {
            status_error: false,
            content_type: "text/html; charset=utf-8",
            body: "<html><body><p>Rust ownership rules keep memory safe.</p>\
                   <p>Borrowing lets code read data without taking it.</p></body></html>",
        }
    }

    #[tokio::test]
    async fn test_add_document_indexes_chunks_with_metadata() {
        let h = harness(LetterEmbedder::new(), ScriptedLlm::default(), html_fetcher(), fast_options());

        let id = h.rag.add_document("https://example.com/rust.html").await.unwrap();

        assert!(h.vectors.len().await.unwrap() >= 2);
        let hits = h.vectors.query(&[1.0; 26], 10, None).await.unwrap();
        for hit in &hits {
            assert_eq!(hit.metadata[META_SOURCE], "https://example.com/rust.html");
            assert_eq!(hit.metadata[META_FILETYPE], "html");
            assert!(hit.id.starts_with(&id.to_string()));
        }

        let stored = h.documents.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.source, "https://example.com/rust.html");
        assert_eq!(stored.file_type, FileType::Html);
    }

    #[tokio::test]
    async fn test_fetch_failure_writes_nothing() {
        let fetcher = StaticFetcher {
            status_error: true,
            content_type: "",
            body: "",
        };
        let h = harness(LetterEmbedder::new(), ScriptedLlm::default(), fetcher, fast_options());

        let err = h.rag.add_document("https://example.com/missing").await.unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
        assert!(h.vectors.is_empty().await.unwrap());
        assert_eq!(h.documents.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_leaves_no_partial_writes() {
        let h = harness(LetterEmbedder::failing(), ScriptedLlm::default(), html_fetcher(), fast_options());

        let err = h.rag.add_document("https://example.com/rust.html").await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
        assert!(h.vectors.is_empty().await.unwrap());
        assert_eq!(h.documents.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_document_store_failure_rolls_back_vectors() {
        let vectors = Arc::new(InMemoryVectorStore::new());
        let rag = RagOrchestrator::new(
            RagServices {
                embedder: Arc::new(LetterEmbedder::new()),
                vector_store: vectors.clone(),
                llm: Arc::new(ScriptedLlm::default()),
                document_store: Arc::new(BrokenDocumentStore),
                fetcher: Arc::new(html_fetcher()),
            },
            fast_options(),
        );

        let err = rag.add_document("https://example.com/rust.html").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(vectors.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_add_upload_uses_extension_fallback() {
        let h = harness(LetterEmbedder::new(), ScriptedLlm::default(), html_fetcher(), fast_options());

        let ingested = h
            .rag
            .add_upload("notes.txt", None, b"plain notes about tokio tasks".to_vec())
            .await
            .unwrap();
        assert_eq!(ingested.file_type, FileType::Txt);
        assert_eq!(ingested.chunks, 1);
        assert_eq!(ingested.text, "plain notes about tokio tasks");
    }

    #[tokio::test]
    async fn test_ask_on_empty_store_still_answers() {
        let llm = ScriptedLlm::with(vec![
            Ok(r#"{"query": "rust", "filter": null}"#.into()),
            Ok("I have no documents on that.".into()),
        ]);
        let options = RagOptions {
            refine_answers: false,
            ..fast_options()
        };
        let h = harness(LetterEmbedder::new(), llm, html_fetcher(), options);

        let answer = h.rag.ask("What is rust?").await.unwrap();
        assert_eq!(answer, "I have no documents on that.");

        let requests = h.llm.requests.lock();
        let answer_request = &requests[1];
        assert!(answer_request[0].content.ends_with("context document(s):\n\n"));
    }

    #[tokio::test]
    async fn test_ask_records_turn_and_refines() {
        let llm = ScriptedLlm::with(vec![
            Ok(r#"{"query": "ownership", "filter": {"op": "eq", "attribute": "filetype", "value": "html"}}"#.into()),
            Ok("initial answer".into()),
            Ok("refined answer".into()),
        ]);
        let h = harness(LetterEmbedder::new(), llm, html_fetcher(), fast_options());
        h.rag.add_document("https://example.com/rust.html").await.unwrap();

        let answer = h.rag.ask("Explain ownership").await.unwrap();
        assert_eq!(answer, "refined answer");

        // Memory keeps the unrefined answer
        let history = h.rag.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].question, "Explain ownership");
        assert_eq!(history[0].answer, "initial answer");

        let requests = h.llm.requests.lock();
        assert!(requests[1][0].content.contains("ownership"));
        assert!(requests[2][0].content.contains("Initial answer: initial answer"));
    }

    #[tokio::test]
    async fn test_history_is_sent_with_next_question() {
        let llm = ScriptedLlm::with(vec![
            Ok(r#"{"query": "a"}"#.into()),
            Ok("first".into()),
            Ok(r#"{"query": "b"}"#.into()),
            Ok("second".into()),
        ]);
        let options = RagOptions {
            refine_answers: false,
            ..fast_options()
        };
        let h = harness(LetterEmbedder::new(), llm, html_fetcher(), options);

        h.rag.ask("q one").await.unwrap();
        h.rag.ask("q two").await.unwrap();

        let requests = h.llm.requests.lock();
        let contents: Vec<&str> = requests[3].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(&contents[1..], &["q one", "first", "q two"]);

        drop(requests);
        h.rag.clear_history();
        assert!(h.rag.history().is_empty());
        assert_eq!(h.rag.history_usage().0, 0);
    }

    #[tokio::test]
    async fn test_llm_failure_is_generation_error() {
        let llm = ScriptedLlm::with(vec![
            Ok(r#"{"query": "x"}"#.into()),
            Err(Error::provider("scripted", "boom")),
        ]);
        let h = harness(LetterEmbedder::new(), llm, html_fetcher(), fast_options());

        let err = h.rag.ask("x?").await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert!(h.rag.history().is_empty());
    }
}
