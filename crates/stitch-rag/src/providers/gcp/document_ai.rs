//! Google Document AI as an OCR backend

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::GcpAuth;
use crate::error::{Error, Result};
use crate::providers::ocr::OcrProvider;
use crate::retry::RetryPolicy;

const PROVIDER: &str = "document-ai";

/// OCR through a Document AI processor
pub struct DocumentAiOcr {
    auth: Arc<GcpAuth>,
    http: reqwest::Client,
    /// `projects/{project}/locations/{location}/processors/{id}`
    processor_name: String,
    location: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest {
    raw_document: RawDocument,
    skip_human_review: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    content: String,
    mime_type: String,
}

#[derive(Deserialize)]
struct ProcessResponse {
    document: ProcessedDocument,
}

#[derive(Deserialize)]
struct ProcessedDocument {
    #[serde(default)]
    text: Option<String>,
}

impl DocumentAiOcr {
    /// `processor` is either a bare processor id or a full resource name
    pub fn new(
        auth: Arc<GcpAuth>,
        location: &str,
        processor: &str,
        retry: RetryPolicy,
    ) -> Self {
        let processor_name = if processor.starts_with("projects/") {
            processor.to_string()
        } else {
            format!(
                "projects/{}/locations/{}/processors/{}",
                auth.project_id(),
                location,
                processor
            )
        };
        Self {
            auth,
            http: reqwest::Client::new(),
            processor_name,
            location: location.to_string(),
            retry,
        }
    }

    pub fn processor_name(&self) -> &str {
        &self.processor_name
    }

    fn endpoint(&self) -> String {
        format!(
            "https://{}-documentai.googleapis.com/v1/{}:process",
            self.location, self.processor_name
        )
    }

    async fn process(&self, request: &ProcessRequest) -> Result<ProcessResponse> {
        let token = self.auth.token().await?;
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::from_transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(PROVIDER, status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl OcrProvider for DocumentAiOcr {
    async fn extract_text(&self, data: &[u8], filename: &str, mime_type: &str) -> Result<String> {
        tracing::info!("[{}] Sending to Document AI processor {}", filename, self.processor_name);

        let request = ProcessRequest {
            raw_document: RawDocument {
                content: BASE64.encode(data),
                mime_type: mime_type.to_string(),
            },
            skip_human_review: true,
        };
        let response = self.retry.run("document ai", || self.process(&request)).await?;

        let text = response.document.text.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(Error::provider(PROVIDER, "Document AI found no text"));
        }
        tracing::info!("[{}] Document AI extracted {} chars", filename, text.len());
        Ok(text)
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
