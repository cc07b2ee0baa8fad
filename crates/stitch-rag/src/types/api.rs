//! Request and response bodies for the HTTP endpoints

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::Turn;

/// `{text}` body used by `/sing`, `/chat` and `/summary`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextInput {
    pub text: String,
}

/// `{audio_url}` body used by `/listen`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInput {
    pub audio_url: String,
}

/// `{url}` body used by `POST /documents`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlInput {
    pub url: String,
}

/// Response from `/doc`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocUploadResponse {
    pub message: String,
    pub file_id: Uuid,
    /// `null` when the analysis completion failed
    pub ai_analysis: Option<String>,
}

/// Response from `POST /documents`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAddedResponse {
    pub message: String,
    pub document_id: Uuid,
}

/// Response from `/sing`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioResponse {
    pub message: String,
    pub audio_url: String,
}

/// Response from `/listen`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub text: String,
}

/// Response from `/chat` and `/summary`; `null` when the completion failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub response: Option<String>,
}

/// Response from `/upload-and-ocr`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResponse {
    pub message: String,
    pub ocr_text: String,
}

/// Response from `GET /history`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub turns: Vec<Turn>,
    pub total_tokens: usize,
    pub max_tokens: usize,
}
