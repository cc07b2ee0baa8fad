//! Object store trait for generated audio and other blobs

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Trait for blob storage addressed by public URL
///
/// Implementations:
/// - `LocalObjectStore`: files under a local directory
/// - `GcsObjectStore`: Google Cloud Storage bucket
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key` and return the URL it can be fetched from
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String>;

    /// Read back an object from a URL this store issued.
    ///
    /// URLs pointing anywhere else are rejected with [`Error::BadRequest`].
    async fn get(&self, url: &str) -> Result<Vec<u8>>;

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Reject keys that are empty, absolute, or climb out of the store root
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(Error::BadRequest(format!("Invalid object key: {}", key)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("abc.mp3").is_ok());
        assert!(validate_key("audio/abc.mp3").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("../secret").is_err());
        assert!(validate_key("a//b").is_err());
    }
}
