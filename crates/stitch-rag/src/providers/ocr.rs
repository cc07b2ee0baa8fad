//! OCR provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Optical character recognition over an uploaded image or PDF
///
/// Implementations:
/// - `RapidApiOcr`: RapidAPI-hosted OCR endpoint
/// - `DocumentAiOcr`: Google Document AI (`gcp` feature)
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Extract text from `data`. `mime_type` is the upload's content type.
    async fn extract_text(&self, data: &[u8], filename: &str, mime_type: &str) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
