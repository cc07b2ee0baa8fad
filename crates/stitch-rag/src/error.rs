//! Error types for the service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Source URL could not be retrieved, or answered with a non-success status
    #[error("Failed to fetch '{url}': {message}")]
    Fetch { url: String, message: String },

    /// Loader could not extract text from the bytes
    #[error("Failed to parse {file_type} content: {message}")]
    Parse { file_type: String, message: String },

    /// A third-party collaborator (embeddings, LLM, speech, OCR) failed
    #[error("{provider} request failed: {message}")]
    Provider {
        provider: String,
        message: String,
        retryable: bool,
    },

    /// Vector store, document store or object store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Answer generation failed
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Invalid client input
    #[error("{0}")]
    BadRequest(String),

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Optional collaborator is not configured
    #[error("{0} is not configured")]
    NotConfigured(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a fetch error
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(file_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            file_type: file_type.into(),
            message: message.into(),
        }
    }

    /// Create a non-retryable provider error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            retryable: false,
        }
    }

    /// Create a provider error that the retry policy may try again
    pub fn provider_retryable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            retryable: true,
        }
    }

    /// Classify a non-success HTTP status from a provider.
    ///
    /// Rate limits and server-side failures are retryable, everything else is not.
    pub fn from_status(provider: impl Into<String>, status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("{} - {}", status, body);
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Self::provider_retryable(provider, message)
        } else {
            Self::provider(provider, message)
        }
    }

    /// Classify a transport error from a provider call
    pub fn from_transport(provider: impl Into<String>, err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::provider_retryable(provider, message)
        } else {
            Self::provider(provider, message)
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the retry policy should try the failed call again
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Provider { retryable, .. } => *retryable,
            Error::Http(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }

    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            Error::Fetch { .. } => (StatusCode::BAD_GATEWAY, "fetch_error"),
            Error::Parse { .. } => (StatusCode::BAD_REQUEST, "parse_error"),
            Error::Provider { retryable: true, .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "provider_error")
            }
            Error::Provider { .. } => (StatusCode::BAD_GATEWAY, "provider_error"),
            Error::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            Error::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_error"),
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::NotConfigured(_) => (StatusCode::SERVICE_UNAVAILABLE, "not_configured"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_kind();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = Json(json!({
            "detail": self.to_string(),
            "error": error_type,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let rate_limited =
            Error::from_status("openai", reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(rate_limited.is_retryable());

        let unavailable = Error::from_status("openai", reqwest::StatusCode::BAD_GATEWAY, "");
        assert!(unavailable.is_retryable());

        let unauthorized = Error::from_status("openai", reqwest::StatusCode::UNAUTHORIZED, "bad key");
        assert!(!unauthorized.is_retryable());
    }

    #[test]
    fn test_response_status_codes() {
        let cases = vec![
            (Error::fetch("http://x", "HTTP 404"), StatusCode::BAD_GATEWAY),
            (Error::parse("pdf", "broken"), StatusCode::BAD_REQUEST),
            (Error::BadRequest("no file".into()), StatusCode::BAD_REQUEST),
            (Error::NotFound("doc".into()), StatusCode::NOT_FOUND),
            (Error::NotConfigured("OCR".into()), StatusCode::SERVICE_UNAVAILABLE),
            (Error::generation("llm down"), StatusCode::BAD_GATEWAY),
            (Error::storage("disk full"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_only_provider_errors_retry() {
        assert!(!Error::generation("x").is_retryable());
        assert!(!Error::storage("x").is_retryable());
        assert!(!Error::provider("tts", "bad voice").is_retryable());
        assert!(Error::provider_retryable("tts", "busy").is_retryable());
    }
}
