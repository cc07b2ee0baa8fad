//! Google Cloud Text-to-Speech and Speech-to-Text over REST

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::GcpAuth;
use crate::config::SpeechConfig;
use crate::error::{Error, Result};
use crate::providers::speech::{SpeechRecognizer, SpeechSynthesizer};
use crate::retry::RetryPolicy;

const TTS_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";
const STT_URL: &str = "https://speech.googleapis.com/v1/speech:recognize";

/// Message for recognitions that come back empty
pub const NO_SPEECH_DETECTED: &str = "No speech detected in audio file.";

/// POST an authorized JSON request and decode the reply
async fn post_google<B: Serialize + Sync, R: for<'de> Deserialize<'de>>(
    auth: &GcpAuth,
    http: &reqwest::Client,
    provider: &str,
    url: &str,
    body: &B,
) -> Result<R> {
    let token = auth.token().await?;
    let response = http
        .post(url)
        .bearer_auth(token)
        .header("x-goog-user-project", auth.project_id())
        .json(body)
        .send()
        .await
        .map_err(|e| Error::from_transport(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::from_status(provider, status, &body));
    }

    response
        .json()
        .await
        .map_err(|e| Error::provider(provider, format!("Failed to parse response: {}", e)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: TtsAudioConfig,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    ssml_gender: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TtsAudioConfig {
    audio_encoding: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

/// Text-to-speech producing MP3 with a neutral voice
pub struct GoogleTts {
    auth: Arc<GcpAuth>,
    http: reqwest::Client,
    language_code: String,
    retry: RetryPolicy,
}

impl GoogleTts {
    pub fn new(auth: Arc<GcpAuth>, config: &SpeechConfig) -> Self {
        Self {
            auth,
            http: reqwest::Client::new(),
            language_code: config.language_code.clone(),
            retry: config.retry.clone(),
        }
    }
}

/// Decode the base64 `audioContent` of a synthesis reply
fn decode_audio(response: SynthesizeResponse) -> Result<Vec<u8>> {
    if response.audio_content.is_empty() {
        return Err(Error::provider("google-tts", "Synthesis returned no audio"));
    }
    BASE64
        .decode(response.audio_content.as_bytes())
        .map_err(|e| Error::provider("google-tts", format!("Audio was not valid base64: {}", e)))
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(Error::BadRequest("Text must not be empty".to_string()));
        }

        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.language_code,
                ssml_gender: "NEUTRAL",
            },
            audio_config: TtsAudioConfig {
                audio_encoding: "MP3",
            },
        };

        let response: SynthesizeResponse = self
            .retry
            .run("text-to-speech", || {
                post_google(&self.auth, &self.http, "google-tts", TTS_URL, &request)
            })
            .await?;
        let audio = decode_audio(response)?;
        tracing::info!("Synthesized {} chars into {} bytes of MP3", text.len(), audio.len());
        Ok(audio)
    }

    fn name(&self) -> &str {
        "google-tts"
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognizeRequest<'a> {
    config: RecognitionConfig<'a>,
    audio: RecognitionAudio,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig<'a> {
    encoding: &'static str,
    sample_rate_hertz: u32,
    language_code: &'a str,
}

#[derive(Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<RecognitionAlternative>,
}

#[derive(Deserialize)]
struct RecognitionAlternative {
    #[serde(default)]
    transcript: String,
}

/// Speech-to-text for 16-bit linear PCM audio
pub struct GoogleStt {
    auth: Arc<GcpAuth>,
    http: reqwest::Client,
    language_code: String,
    sample_rate_hertz: u32,
    retry: RetryPolicy,
}

impl GoogleStt {
    pub fn new(auth: Arc<GcpAuth>, config: &SpeechConfig) -> Self {
        Self {
            auth,
            http: reqwest::Client::new(),
            language_code: config.language_code.clone(),
            sample_rate_hertz: config.sample_rate_hertz,
            retry: config.retry.clone(),
        }
    }
}

/// Top alternative of the first result; no results means no speech
fn first_transcript(response: RecognizeResponse) -> Result<String> {
    response
        .results
        .into_iter()
        .next()
        .and_then(|r| r.alternatives.into_iter().next())
        .map(|a| a.transcript)
        .ok_or_else(|| Error::BadRequest(NO_SPEECH_DETECTED.to_string()))
}

#[async_trait]
impl SpeechRecognizer for GoogleStt {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        let request = RecognizeRequest {
            config: RecognitionConfig {
                encoding: "LINEAR16",
                sample_rate_hertz: self.sample_rate_hertz,
                language_code: &self.language_code,
            },
            audio: RecognitionAudio {
                content: BASE64.encode(audio),
            },
        };

        let response: RecognizeResponse = self
            .retry
            .run("speech-to-text", || {
                post_google(&self.auth, &self.http, "google-stt", STT_URL, &request)
            })
            .await?;
        first_transcript(response)
    }

    fn name(&self) -> &str {
        "google-stt"
    }
}
