//! Speech synthesis and recognition traits

use async_trait::async_trait;

use crate::error::Result;

/// Text-to-speech
///
/// Implementations:
/// - `GoogleTts`: Google Cloud Text-to-Speech (`gcp` feature)
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` as MP3 audio
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Speech-to-text
///
/// Implementations:
/// - `GoogleStt`: Google Cloud Speech-to-Text (`gcp` feature)
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe LINEAR16 audio. Audio without recognizable speech is a
    /// [`BadRequest`](crate::error::Error::BadRequest).
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
