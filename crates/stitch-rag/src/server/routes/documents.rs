//! Document upload, indexing by URL, and retrieval of stored bytes

use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use super::read_upload;
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::server::state::AppState;
use crate::types::{DocUploadResponse, DocumentAddedResponse, DocumentInfo, UrlInput};

/// POST /doc - store, index and analyse an uploaded document
pub async fn upload_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<DocUploadResponse>> {
    let upload = read_upload(multipart).await?;

    let ingested = state
        .orchestrator()
        .add_upload(&upload.filename, upload.content_type.as_deref(), upload.bytes)
        .await?;

    let prompt = PromptBuilder::build_analysis_prompt(&ingested.text);
    let ai_analysis = state.llm().complete_lenient(&prompt).await;

    Ok(Json(DocUploadResponse {
        message: "Document uploaded and processed successfully".to_string(),
        file_id: ingested.document_id,
        ai_analysis,
    }))
}

/// POST /documents - fetch a document by URL and index it
pub async fn add_document(
    State(state): State<AppState>,
    Json(input): Json<UrlInput>,
) -> Result<Json<DocumentAddedResponse>> {
    let url = input.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(Error::BadRequest(format!("Not an http(s) URL: {}", url)));
    }

    let document_id = state.orchestrator().add_document(url).await?;

    Ok(Json(DocumentAddedResponse {
        message: "Document added successfully".to_string(),
        document_id,
    }))
}

/// GET /documents - metadata of every stored document
pub async fn list_documents(State(state): State<AppState>) -> Result<Json<Vec<DocumentInfo>>> {
    Ok(Json(state.document_store().list().await?))
}

/// GET /documents/:id - raw bytes with the stored content type
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let document = state
        .document_store()
        .get(&id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Document {}", id)))?;

    let content_type = document
        .content_type
        .clone()
        .unwrap_or_else(|| document.file_type.mime_type().to_string());

    Ok(([(header::CONTENT_TYPE, content_type)], document.content).into_response())
}
