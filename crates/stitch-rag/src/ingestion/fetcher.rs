//! Retrieval of source documents over HTTP

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{Error, Result};

/// Bytes and reported content type of a fetched document
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub url: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Downloads a document from its source URL
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch `url`; unreachable hosts and non-2xx responses are [`Error::Fetch`]
    async fn fetch(&self, url: &str) -> Result<FetchedDocument>;
}

/// `reqwest`-backed fetcher
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("stitch-rag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::fetch(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(url, format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::fetch(url, format!("Failed to read body: {}", e)))?
            .to_vec();

        tracing::debug!(
            "Fetched {} ({} bytes, content type {:?})",
            url,
            bytes.len(),
            content_type
        );

        Ok(FetchedDocument {
            url: url.to_string(),
            content_type,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_returns_body_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc.html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_string("<p>hi</p>"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(5).unwrap();
        let doc = fetcher.fetch(&format!("{}/doc.html", server.uri())).await.unwrap();

        assert_eq!(doc.bytes, b"<p>hi</p>");
        assert_eq!(doc.content_type.as_deref(), Some("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(5).unwrap();
        let err = fetcher.fetch(&format!("{}/missing", server.uri())).await.unwrap_err();

        match err {
            Error::Fetch { message, .. } => assert!(message.contains("404")),
            other => panic!("expected fetch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let fetcher = HttpFetcher::new(2).unwrap();
        let err = fetcher.fetch("http://127.0.0.1:1/nothing").await.unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
    }
}
