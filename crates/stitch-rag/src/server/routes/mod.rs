//! HTTP routes

pub mod chat;
pub mod documents;
pub mod objects;
pub mod ocr;
pub mod speech;

use axum::{
    extract::{DefaultBodyLimit, Multipart},
    routing::{get, post},
    Json, Router,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;

/// Multipart field carrying the uploaded file
const FILE_FIELD: &str = "file";

/// All endpoints; upload routes accept bodies up to `max_upload_size`
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Uploads
        .route(
            "/doc",
            post(documents::upload_document).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/upload-and-ocr",
            post(ocr::upload_and_ocr).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        // Documents by URL
        .route("/documents", post(documents::add_document).get(documents::list_documents))
        .route("/documents/:id", get(documents::get_document))
        // Speech
        .route("/sing", post(speech::text_to_speech))
        .route("/listen", post(speech::speech_to_text))
        // Completions
        .route("/chat", post(chat::chat))
        .route("/summary", post(chat::summary))
        .route("/history", get(chat::get_history).delete(chat::clear_history))
        // Locally stored objects
        .route("/objects/*key", get(objects::get_object))
        .route("/info", get(info))
}

/// An uploaded file read from the `file` multipart field
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Read the `file` field, skipping any other fields
pub async fn read_upload(mut multipart: Multipart) -> Result<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload_{}", uuid::Uuid::new_v4()));
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::BadRequest(format!("Failed to read file {}: {}", filename, e)))?;

        if bytes.is_empty() {
            return Err(Error::BadRequest(format!("Uploaded file {} is empty", filename)));
        }

        tracing::info!("Received upload {} ({} bytes)", filename, bytes.len());
        return Ok(Upload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(Error::BadRequest("No file uploaded".to_string()))
}

/// GET /info
async fn info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "stitch-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document question answering with speech, OCR and completion endpoints",
        "endpoints": {
            "POST /doc": "Upload a document for indexing and analysis",
            "POST /documents": "Index a document by URL",
            "GET /documents": "List stored documents",
            "GET /documents/:id": "Download a stored document",
            "POST /chat": "Ask a question about indexed documents",
            "POST /summary": "Summarize text",
            "GET /history": "Conversation history",
            "DELETE /history": "Clear conversation history",
            "POST /sing": "Text to speech",
            "POST /listen": "Speech to text",
            "POST /upload-and-ocr": "Extract text from an image or PDF",
            "GET /objects/*key": "Download a locally stored object"
        }
    }))
}
