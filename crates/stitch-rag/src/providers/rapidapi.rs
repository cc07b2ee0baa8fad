//! OCR through a RapidAPI-hosted endpoint

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::time::Duration;

use crate::config::OcrConfig;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

use super::ocr::OcrProvider;

const PROVIDER: &str = "rapidapi-ocr";
const TIMEOUT_SECS: u64 = 120;

/// OCR client posting the upload as multipart field `image`
pub struct RapidApiOcr {
    client: reqwest::Client,
    url: String,
    host: String,
    key: String,
    retry: RetryPolicy,
}

impl RapidApiOcr {
    pub fn new(url: String, host: String, key: String, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url,
            host,
            key,
            retry,
        })
    }

    /// Build from config when both the URL and the key are present.
    ///
    /// The host header defaults to the URL's host.
    pub fn from_config(config: &OcrConfig) -> Result<Option<Self>> {
        let (Some(url), Some(key)) = (&config.rapidapi_url, &config.rapidapi_key) else {
            return Ok(None);
        };
        let host = match &config.rapidapi_host {
            Some(host) => host.clone(),
            None => reqwest::Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .ok_or_else(|| Error::Config(format!("Invalid RapidAPI URL: {}", url)))?,
        };
        Self::new(url.clone(), host, key.clone(), config.retry.clone()).map(Some)
    }

    async fn send(&self, data: &[u8], filename: &str, mime_type: &str) -> Result<Value> {
        let part = Part::bytes(data.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| Error::BadRequest(format!("Invalid content type {}: {}", mime_type, e)))?;
        let form = Form::new().part("image", part);

        let response = self
            .client
            .post(&self.url)
            .header("X-RapidAPI-Key", &self.key)
            .header("X-RapidAPI-Host", &self.host)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::from_transport(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(PROVIDER, status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))
    }
}

/// Pull recognized text out of the various response shapes OCR APIs use.
///
/// Accepts a top-level `text`/`ocr_text`/`result`/`ParsedText` string, or a
/// `results`/`ParsedResults`/`data` array whose items carry one of those keys,
/// joined with newlines.
pub fn extract_ocr_text(body: &Value) -> Option<String> {
    const TEXT_KEYS: [&str; 5] = ["text", "ocr_text", "ParsedText", "result", "fullText"];
    const LIST_KEYS: [&str; 4] = ["results", "ParsedResults", "data", "pages"];

    match body {
        Value::String(s) => return Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(extract_ocr_text).collect();
            return (!parts.is_empty()).then(|| parts.join("\n"));
        }
        _ => {}
    }

    for key in TEXT_KEYS {
        if let Some(Value::String(s)) = body.get(key) {
            return Some(s.clone());
        }
    }
    for key in LIST_KEYS {
        if let Some(nested) = body.get(key) {
            if let Some(text) = extract_ocr_text(nested) {
                return Some(text);
            }
        }
    }
    None
}

#[async_trait]
impl OcrProvider for RapidApiOcr {
    async fn extract_text(&self, data: &[u8], filename: &str, mime_type: &str) -> Result<String> {
        tracing::info!("OCR of {} ({} bytes) via RapidAPI", filename, data.len());
        let body = self
            .retry
            .run("rapidapi ocr", || self.send(data, filename, mime_type))
            .await?;

        extract_ocr_text(&body)
            .ok_or_else(|| Error::provider(PROVIDER, "Response contained no recognized text"))
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_extract_ocr_text_shapes() {
        assert_eq!(extract_ocr_text(&json!({"text": "hello"})).as_deref(), Some("hello"));
        assert_eq!(
            extract_ocr_text(&json!({"ParsedResults": [{"ParsedText": "a"}, {"ParsedText": "b"}]}))
                .as_deref(),
            Some("a\nb")
        );
        assert_eq!(
            extract_ocr_text(&json!({"data": {"result": "nested"}})).as_deref(),
            Some("nested")
        );
        assert_eq!(extract_ocr_text(&json!({"status": "ok"})), None);
    }

    #[test]
    fn test_from_config_requires_url_and_key() {
        let mut config = OcrConfig::default();
        assert!(RapidApiOcr::from_config(&config).unwrap().is_none());

        config.rapidapi_url = Some("https://ocr.example.p.rapidapi.com/ocr".into());
        config.rapidapi_key = Some("key".into());
        let ocr = RapidApiOcr::from_config(&config).unwrap().unwrap();
        assert_eq!(ocr.host, "ocr.example.p.rapidapi.com");
    }

    #[tokio::test]
    async fn test_extract_text_sends_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ocr"))
            .and(header("X-RapidAPI-Key", "secret"))
            .and(header("X-RapidAPI-Host", "ocr.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "Invoice 42"})))
            .mount(&server)
            .await;

        let ocr = RapidApiOcr::new(
            format!("{}/ocr", server.uri()),
            "ocr.test".into(),
            "secret".into(),
            RetryPolicy::none(),
        )
        .unwrap();
        let text = ocr.extract_text(b"\x89PNG", "scan.png", "image/png").await.unwrap();
        assert_eq!(text, "Invoice 42");
    }

    #[tokio::test]
    async fn test_no_text_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "done"})))
            .mount(&server)
            .await;

        let ocr = RapidApiOcr::new(server.uri(), "h".into(), "k".into(), RetryPolicy::none()).unwrap();
        let err = ocr.extract_text(b"x", "a.png", "image/png").await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }
}
