//! Google Cloud Platform provider implementations
//!
//! - Text-to-Speech and Speech-to-Text for the audio endpoints
//! - Document AI for OCR
//! - Cloud Storage for generated audio

mod auth;
mod document_ai;
mod gcs_store;
mod speech;

pub use auth::{GcpAuth, ServiceAccountKey};
pub use document_ai::DocumentAiOcr;
pub use gcs_store::GcsObjectStore;
pub use speech::{GoogleStt, GoogleTts, NO_SPEECH_DETECTED};
