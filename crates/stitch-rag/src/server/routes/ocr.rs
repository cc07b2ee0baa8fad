//! OCR of uploaded images and scanned documents

use axum::{
    extract::{Multipart, State},
    Json,
};

use super::read_upload;
use crate::error::Result;
use crate::server::state::AppState;
use crate::types::OcrResponse;

/// POST /upload-and-ocr
pub async fn upload_and_ocr(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OcrResponse>> {
    let ocr = state.ocr()?;
    let upload = read_upload(multipart).await?;

    let mime_type = upload.content_type.clone().unwrap_or_else(|| {
        mime_guess::from_path(&upload.filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    });

    let ocr_text = ocr
        .extract_text(&upload.bytes, &upload.filename, &mime_type)
        .await?;
    tracing::info!(
        "OCR of {} via {} produced {} chars",
        upload.filename,
        ocr.name(),
        ocr_text.len()
    );

    Ok(Json(OcrResponse {
        message: "File processed successfully".to_string(),
        ocr_text,
    }))
}
