//! Serves objects held by the local object store

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::error::{Error, Result};
use crate::server::state::AppState;

/// GET /objects/*key
pub async fn get_object(State(state): State<AppState>, Path(key): Path<String>) -> Result<Response> {
    let local = state
        .services()
        .local_objects
        .as_ref()
        .ok_or_else(|| Error::NotFound("Objects are not served locally".to_string()))?;

    let (data, content_type) = local.read_key(&key).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], data).into_response())
}
