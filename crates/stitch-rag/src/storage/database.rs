//! SQLite database holding ingested source documents

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::providers::DocumentStore;
use crate::types::{Document, DocumentId, DocumentInfo, FileType};

/// SQLite-based document store
#[derive(Clone)]
pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDocumentStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::storage(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        tracing::info!("Document store opened at {}", path.display());
        Ok(db)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::storage(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
        "#,
        )
        .map_err(|e| Error::storage(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                file_type TEXT NOT NULL,
                content_type TEXT,
                content_hash TEXT NOT NULL,
                size INTEGER NOT NULL,
                content BLOB NOT NULL,
                stored_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source);
            CREATE INDEX IF NOT EXISTS idx_documents_content_hash ON documents(content_hash);
        "#,
        )
        .map_err(|e| Error::storage(format!("Failed to create tables: {}", e)))?;

        Ok(())
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await
        .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
    }

    /// Number of stored documents
    pub async fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
                .map_err(|e| Error::storage(format!("Failed to count documents: {}", e)))?;
            Ok(count as usize)
        })
        .await
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn save(&self, document: Document) -> Result<DocumentId> {
        let id = document.id;
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO documents (id, source, file_type, content_type, content_hash, size, content, stored_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    document.id.to_string(),
                    document.source,
                    document.file_type.as_str(),
                    document.content_type,
                    document.content_hash,
                    document.content.len() as i64,
                    document.content,
                    document.stored_at.to_rfc3339(),
                ],
            )
            .map_err(|e| Error::storage(format!("Failed to save document: {}", e)))?;
            Ok(())
        })
        .await?;

        tracing::debug!("Saved document {}", id);
        Ok(id)
    }

    async fn get(&self, id: &DocumentId) -> Result<Option<Document>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, source, file_type, content_type, content_hash, stored_at, content \
                     FROM documents WHERE id = ?1",
                )
                .map_err(|e| Error::storage(format!("Failed to prepare query: {}", e)))?;

            stmt.query_row(params![id], |row| {
                let info = row_to_info(row)?;
                let content: Vec<u8> = row.get(6)?;
                Ok(Document {
                    id: info.id,
                    source: info.source,
                    file_type: info.file_type,
                    content_type: info.content_type,
                    content_hash: info.content_hash,
                    content,
                    stored_at: info.stored_at,
                })
            })
            .optional()
            .map_err(|e| Error::storage(format!("Failed to get document: {}", e)))
        })
        .await
    }

    async fn delete(&self, id: &DocumentId) -> Result<bool> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let affected = conn
                .execute("DELETE FROM documents WHERE id = ?1", params![id])
                .map_err(|e| Error::storage(format!("Failed to delete document: {}", e)))?;
            Ok(affected > 0)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<DocumentInfo>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, source, file_type, content_type, content_hash, stored_at, size \
                     FROM documents ORDER BY stored_at DESC",
                )
                .map_err(|e| Error::storage(format!("Failed to prepare query: {}", e)))?;

            let rows = stmt
                .query_map([], |row| {
                    let mut info = row_to_info(row)?;
                    let size: i64 = row.get(6)?;
                    info.size = size as u64;
                    Ok(info)
                })
                .map_err(|e| Error::storage(format!("Failed to list documents: {}", e)))?;

            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| Error::storage(format!("Failed to read document row: {}", e)))
        })
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT 1", [], |_| Ok(())).is_ok()))
            .await
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

/// Columns 0..=5: id, source, file_type, content_type, content_hash, stored_at
fn row_to_info(row: &rusqlite::Row) -> rusqlite::Result<DocumentInfo> {
    let id_str: String = row.get(0)?;
    let source: String = row.get(1)?;
    let file_type_str: String = row.get(2)?;
    let content_type: Option<String> = row.get(3)?;
    let content_hash: String = row.get(4)?;
    let stored_at_str: String = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(DocumentInfo {
        id,
        source,
        file_type: FileType::parse(&file_type_str).unwrap_or(FileType::Txt),
        content_type,
        content_hash,
        size: 0,
        stored_at: DateTime::parse_from_rfc3339(&stored_at_str)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(source: &str, body: &[u8]) -> Document {
        Document::new(
            Uuid::new_v4(),
            source,
            FileType::Html,
            Some("text/html".to_string()),
            body.to_vec(),
        )
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let doc = sample("https://example.com/page", b"<p>hello</p>");
        let id = store.save(doc.clone()).await.unwrap();

        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.source, "https://example.com/page");
        assert_eq!(loaded.file_type, FileType::Html);
        assert_eq!(loaded.content, b"<p>hello</p>");
        assert_eq!(loaded.content_type.as_deref(), Some("text/html"));
        assert_eq!(loaded.content_hash, doc.content_hash);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        assert!(store.get(&Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let a = store.save(sample("a", b"aaa")).await.unwrap();
        store.save(sample("b", b"bb")).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|d| d.source == "a" && d.size == 3));

        assert!(store.delete(&a).await.unwrap());
        assert!(!store.delete(&a).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_storage_error() {
        let store = SqliteDocumentStore::in_memory().unwrap();
        let doc = sample("a", b"x");
        store.save(doc.clone()).await.unwrap();
        let err = store.save(doc).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("docs.db");

        let id = {
            let store = SqliteDocumentStore::new(&path).unwrap();
            store.save(sample("persisted", b"data")).await.unwrap()
        };

        let reopened = SqliteDocumentStore::new(&path).unwrap();
        assert!(reopened.get(&id).await.unwrap().is_some());
        assert!(reopened.health_check().await.unwrap());
    }
}
