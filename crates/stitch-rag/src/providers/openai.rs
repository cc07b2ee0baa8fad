//! OpenAI-compatible providers for embeddings and chat completion
//!
//! Both share one HTTP client. Any server speaking the `/embeddings` and
//! `/chat/completions` wire format works by pointing `base_url` at it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

use super::embedding::EmbeddingProvider;
use super::llm::{ChatMessage, LanguageModel};

const PROVIDER: &str = "openai";

/// Thin JSON client for an OpenAI-compatible API
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// POST `body` to `{base_url}{path}` and decode the JSON reply.
    ///
    /// 429 and 5xx responses and transport failures come back retryable.
    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::from_transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(Error::from_status(PROVIDER, status, &detail));
        }

        response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))
    }

    async fn get_ok(&self, path: &str) -> bool {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Embedding provider for the `/embeddings` endpoint
pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = OpenAiClient::new(&config.base_url, config.api_key.clone(), config.timeout_secs)?;
        Ok(Self::from_client(Arc::new(client), config.model.clone(), config.dimensions))
    }

    pub fn from_client(client: Arc<OpenAiClient>, model: String, dimensions: usize) -> Self {
        Self {
            client,
            model,
            dimensions,
        }
    }

    fn check_dimensions(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(Error::provider(
                PROVIDER,
                format!(
                    "Model {} returned {} dimensions, expected {}",
                    self.model,
                    embedding.len(),
                    self.dimensions
                ),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider(PROVIDER, "Embedding response was empty"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts.iter().map(String::as_str).collect(),
        };
        let mut response: EmbeddingResponse = self.client.post_json("/embeddings", &request).await?;

        if response.data.len() != texts.len() {
            return Err(Error::provider(
                PROVIDER,
                format!("Asked for {} embeddings, got {}", texts.len(), response.data.len()),
            ));
        }

        response.data.sort_by_key(|d| d.index);
        let embeddings: Vec<Vec<f32>> = response.data.into_iter().map(|d| d.embedding).collect();
        for embedding in &embeddings {
            self.check_dimensions(embedding)?;
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.client.get_ok("/models").await)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

/// Chat model for the `/chat/completions` endpoint, retrying transient failures
pub struct OpenAiChat {
    client: Arc<OpenAiClient>,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = OpenAiClient::new(&config.base_url, config.api_key.clone(), config.timeout_secs)?;
        Ok(Self::from_client(Arc::new(client), config))
    }

    pub fn from_client(client: Arc<OpenAiClient>, config: &LlmConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            retry: config.retry.clone(),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        tracing::debug!("Chat completion with {} message(s) on {}", messages.len(), self.model);

        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response: ChatResponse = self
            .retry
            .run("chat completion", || self.client.post_json("/chat/completions", &request))
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::provider(PROVIDER, "Chat response had no content"))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.client.get_ok("/models").await)
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn llm_config(base_url: &str) -> LlmConfig {
        LlmConfig {
            base_url: base_url.to_string(),
            api_key: Some("sk-test".into()),
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
                multiplier: 1.0,
            },
            ..LlmConfig::default()
        }
    }

    fn embed_config(base_url: &str, dimensions: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            base_url: base_url.to_string(),
            api_key: Some("sk-test".into()),
            dimensions,
            ..EmbeddingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_chat_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-3.5-turbo"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Paris"}}]
            })))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(&llm_config(&server.uri())).unwrap();
        let answer = chat.complete("Capital of France?").await.unwrap();
        assert_eq!(answer, "Paris");
    }

    #[tokio::test]
    async fn test_chat_retries_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"message": "Rate limit reached"}
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(&llm_config(&server.uri())).unwrap();
        assert_eq!(chat.complete("hi").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_chat_auth_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(&llm_config(&server.uri())).unwrap();
        let err = chat.complete("hi").await.unwrap_err();
        assert!(err.to_string().contains("Incorrect API key"));
        assert!(chat.complete_lenient("hi").await.is_none());
    }

    #[tokio::test]
    async fn test_embed_batch_orders_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(&embed_config(&server.uri(), 2)).unwrap();
        let vectors = embedder
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embed_dimension_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"index": 0, "embedding": [1.0, 0.0, 0.0]}]
            })))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(&embed_config(&server.uri(), 2)).unwrap();
        let err = embedder.embed("a").await.unwrap_err();
        assert!(matches!(err, Error::Provider { retryable: false, .. }));
    }

    #[tokio::test]
    async fn test_embed_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let embedder = OpenAiEmbedder::new(&embed_config(&server.uri(), 2)).unwrap();
        let err = embedder.embed("a").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
