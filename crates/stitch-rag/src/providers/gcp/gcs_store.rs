//! Google Cloud Storage object store

use async_trait::async_trait;
use std::borrow::Cow;

use google_cloud_storage::client::Client as GcsClient;
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};

use crate::error::{Error, Result};
use crate::providers::object_store::{validate_key, ObjectStore};

const PUBLIC_HOST: &str = "https://storage.googleapis.com";

/// Object store writing to one GCS bucket, returning public HTTPS URLs
pub struct GcsObjectStore {
    client: GcsClient,
    bucket: String,
}

impl GcsObjectStore {
    /// Connect using application default credentials
    pub async fn new(bucket: String) -> Result<Self> {
        let config = google_cloud_storage::client::ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| Error::Config(format!("Failed to create GCS client: {}", e)))?;

        Ok(Self {
            client: GcsClient::new(config),
            bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn public_url(&self, key: &str) -> String {
        public_url(&self.bucket, key)
    }
}

fn public_url(bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", PUBLIC_HOST, bucket, key)
}

/// Object key of a URL in `bucket`, accepting public HTTPS and `gs://` forms
fn key_from_url<'a>(bucket: &str, url: &'a str) -> Result<&'a str> {
    let https_prefix = format!("{}/{}/", PUBLIC_HOST, bucket);
    let gs_prefix = format!("gs://{}/", bucket);

    let key = url
        .strip_prefix(https_prefix.as_str())
        .or_else(|| url.strip_prefix(gs_prefix.as_str()))
        .ok_or_else(|| Error::BadRequest(format!("URL is not in bucket {}: {}", bucket, url)))?;
    validate_key(key)?;
    Ok(key)
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String> {
        validate_key(key)?;

        let mut media = Media::new(key.to_string());
        media.content_type = Cow::Owned(content_type.to_string());
        let size = data.len();

        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                data,
                &UploadType::Simple(media),
            )
            .await
            .map_err(|e| Error::storage(format!("Failed to upload {} to GCS: {}", key, e)))?;

        tracing::debug!("Uploaded {} ({} bytes) to gs://{}", key, size, self.bucket);
        Ok(self.public_url(key))
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let key = key_from_url(&self.bucket, url)?;

        self.client
            .download_object(
                &GetObjectRequest {
                    bucket: self.bucket.clone(),
                    object: key.to_string(),
                    ..Default::default()
                },
                &Range::default(),
            )
            .await
            .map_err(|e| Error::storage(format!("Failed to download {} from GCS: {}", key, e)))
    }

    async fn health_check(&self) -> Result<bool> {
        let request = ListObjectsRequest {
            bucket: self.bucket.clone(),
            max_results: Some(1),
            ..Default::default()
        };

        match self.client.list_objects(&request).await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("GCS health check failed for {}: {}", self.bucket, e);
                Ok(false)
            }
        }
    }

    fn name(&self) -> &str {
        "gcs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_round_trips_to_key() {
        let url = public_url("audio-bucket", "abc.mp3");
        assert_eq!(url, "https://storage.googleapis.com/audio-bucket/abc.mp3");
        assert_eq!(key_from_url("audio-bucket", &url).unwrap(), "abc.mp3");
    }

    #[test]
    fn test_gs_uri_is_accepted() {
        assert_eq!(
            key_from_url("audio-bucket", "gs://audio-bucket/in/clip.wav").unwrap(),
            "in/clip.wav"
        );
    }

    #[test]
    fn test_foreign_urls_are_rejected() {
        for url in [
            "https://storage.googleapis.com/other-bucket/abc.mp3",
            "https://example.com/audio-bucket/abc.mp3",
            "https://storage.googleapis.com/audio-bucket/../secret",
        ] {
            assert!(matches!(
                key_from_url("audio-bucket", url),
                Err(Error::BadRequest(_))
            ));
        }
    }
}
