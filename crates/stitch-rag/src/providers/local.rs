//! Filesystem-backed object store

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::ObjectStoreConfig;
use crate::error::{Error, Result};

use super::object_store::{validate_key, ObjectStore};

/// Object store writing files under a local directory.
///
/// Issued URLs are `{public_base_url}/{key}`; the server's `/objects` route
/// serves them back.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    /// Create the store, creating `root` if needed
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            Error::storage(format!("Failed to create object directory {}: {}", root.display(), e))
        })?;
        Ok(Self {
            root,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ObjectStoreConfig) -> Result<Self> {
        Self::new(config.local_dir.clone(), config.public_base_url.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// URL issued for `key`
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Key encoded in a URL this store issued
    pub fn key_from_url<'a>(&self, url: &'a str) -> Result<&'a str> {
        let key = url
            .strip_prefix(self.public_base_url.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| Error::BadRequest(format!("URL is not served by this store: {}", url)))?;
        validate_key(key)?;
        Ok(key)
    }

    /// Read an object by key along with its guessed content type
    pub async fn read_key(&self, key: &str) -> Result<(Vec<u8>, String)> {
        validate_key(key)?;
        let path = self.root.join(key);
        let data = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(format!("Object {}", key)),
            _ => Error::storage(format!("Failed to read object {}: {}", key, e)),
        })?;
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok((data, content_type))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String> {
        validate_key(key)?;
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::storage(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| Error::storage(format!("Failed to write object {}: {}", key, e)))?;

        tracing::debug!("Stored object {} ({} bytes, {})", key, data.len(), content_type);
        Ok(self.url_for(key))
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let key = self.key_from_url(url)?;
        self.read_key(key).await.map(|(data, _)| data)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.root.is_dir())
    }

    fn name(&self) -> &str {
        "local-filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LocalObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost:8000/objects/").unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let (_dir, store) = store();
        let url = store.put("clip.mp3", b"ID3".to_vec(), "audio/mpeg").await.unwrap();

        assert_eq!(url, "http://localhost:8000/objects/clip.mp3");
        assert_eq!(store.get(&url).await.unwrap(), b"ID3");

        let (_, content_type) = store.read_key("clip.mp3").await.unwrap();
        assert_eq!(content_type, "audio/mpeg");
    }

    #[tokio::test]
    async fn test_foreign_url_is_rejected() {
        let (_dir, store) = store();
        let err = store.get("https://elsewhere.example.com/clip.mp3").await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let err = store.get("http://localhost:8000/objects/../x").await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let (_dir, store) = store();
        let err = store.get("http://localhost:8000/objects/none.wav").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
