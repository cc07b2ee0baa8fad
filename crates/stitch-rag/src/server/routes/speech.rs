//! Text-to-speech and speech-to-text endpoints

use axum::{extract::State, Json};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{AudioInput, AudioResponse, TextInput, TranscriptResponse};

/// POST /sing - synthesize speech and store it as MP3
pub async fn text_to_speech(
    State(state): State<AppState>,
    Json(input): Json<TextInput>,
) -> Result<Json<AudioResponse>> {
    if input.text.trim().is_empty() {
        return Err(Error::BadRequest("Text must not be empty".to_string()));
    }

    let audio = state.synthesizer()?.synthesize(&input.text).await?;

    let key = format!("{}.mp3", Uuid::new_v4());
    let audio_url = state.object_store().put(&key, audio, "audio/mpeg").await?;
    tracing::info!("Stored synthesized audio at {}", audio_url);

    Ok(Json(AudioResponse {
        message: "Audio generated successfully".to_string(),
        audio_url,
    }))
}

/// POST /listen - transcribe audio previously stored in the object store
pub async fn speech_to_text(
    State(state): State<AppState>,
    Json(input): Json<AudioInput>,
) -> Result<Json<TranscriptResponse>> {
    let recognizer = state.recognizer()?;
    let audio = state.object_store().get(&input.audio_url).await?;
    tracing::debug!("Transcribing {} ({} bytes)", input.audio_url, audio.len());

    let text = recognizer.transcribe(&audio).await?;
    Ok(Json(TranscriptResponse { text }))
}
