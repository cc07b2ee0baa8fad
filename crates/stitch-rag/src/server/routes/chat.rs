//! Question answering, summaries and conversation history

use axum::{extract::State, http::StatusCode, Json};

use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::server::state::AppState;
use crate::types::{CompletionResponse, HistoryResponse, TextInput};

fn require_text(input: &TextInput) -> Result<()> {
    if input.text.trim().is_empty() {
        return Err(Error::BadRequest("Text must not be empty".to_string()));
    }
    Ok(())
}

/// POST /chat - answer from indexed documents, then respond to the user's text.
///
/// Failures in the retrieval-augmented answer are errors; the final
/// completion is lenient and yields `null` on failure.
pub async fn chat(
    State(state): State<AppState>,
    Json(input): Json<TextInput>,
) -> Result<Json<CompletionResponse>> {
    require_text(&input)?;

    let rag_response = state.orchestrator().ask(&input.text).await?;
    let prompt = PromptBuilder::build_chat_prompt(&rag_response, &input.text);
    let response = state.llm().complete_lenient(&prompt).await;

    Ok(Json(CompletionResponse { response }))
}

/// POST /summary
pub async fn summary(
    State(state): State<AppState>,
    Json(input): Json<TextInput>,
) -> Result<Json<CompletionResponse>> {
    require_text(&input)?;

    let prompt = PromptBuilder::build_summary_prompt(&input.text);
    let response = state.llm().complete_lenient(&prompt).await;

    Ok(Json(CompletionResponse { response }))
}

/// GET /history
pub async fn get_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    let orchestrator = state.orchestrator();
    let (total_tokens, max_tokens) = orchestrator.history_usage();
    Json(HistoryResponse {
        turns: orchestrator.history(),
        total_tokens,
        max_tokens,
    })
}

/// DELETE /history
pub async fn clear_history(State(state): State<AppState>) -> StatusCode {
    state.orchestrator().clear_history();
    StatusCode::NO_CONTENT
}
