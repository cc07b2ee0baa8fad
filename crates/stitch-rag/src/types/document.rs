//! Document, chunk and vector entry types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Identifier assigned to every ingested document
pub type DocumentId = Uuid;

/// Attribute map attached to chunks and vector entries
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Metadata key holding the document source (URL or filename)
pub const META_SOURCE: &str = "source";
/// Metadata key holding the detected file type
pub const META_FILETYPE: &str = "filetype";
/// Metadata key holding the parent document id
pub const META_DOCUMENT_ID: &str = "document_id";
/// Metadata key holding the chunk ordinal
pub const META_CHUNK_INDEX: &str = "chunk_index";

/// Supported document formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// HTML page
    Html,
    /// Anything else, read as plain text
    Txt,
}

impl FileType {
    /// Classify an HTTP `Content-Type` header value.
    ///
    /// Unknown or missing types fall back to plain text.
    pub fn from_content_type(content_type: &str) -> Self {
        let ct = content_type.to_ascii_lowercase();
        if ct.contains("pdf") {
            Self::Pdf
        } else if ct.contains("word") || ct.contains("officedocument") {
            Self::Docx
        } else if ct.contains("html") {
            Self::Html
        } else {
            Self::Txt
        }
    }

    /// Detect file type from a filename extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "html" | "htm" => Some(Self::Html),
            "txt" | "text" | "md" | "markdown" | "csv" | "json" => Some(Self::Txt),
            _ => None,
        }
    }

    /// Classify an upload: a specific content type wins, otherwise the filename extension
    pub fn from_upload(content_type: Option<&str>, filename: &str) -> Self {
        let generic = |ct: &str| {
            let ct = ct.to_ascii_lowercase();
            ct.is_empty() || ct.starts_with("application/octet-stream")
        };

        match content_type {
            Some(ct) if !generic(ct) => Self::from_content_type(ct),
            _ => std::path::Path::new(filename)
                .extension()
                .and_then(|e| e.to_str())
                .and_then(Self::from_extension)
                .unwrap_or(Self::Txt),
        }
    }

    /// Short lowercase name stored in chunk metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Html => "html",
            Self::Txt => "txt",
        }
    }

    /// Canonical MIME type
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Html => "text/html",
            Self::Txt => "text/plain",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "html" => Some(Self::Html),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored source document with its raw bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Source URL or uploaded filename
    pub source: String,
    pub file_type: FileType,
    /// Content type reported by the origin, if any
    pub content_type: Option<String>,
    /// SHA-256 of the raw bytes
    pub content_hash: String,
    /// Raw bytes as fetched or uploaded
    #[serde(skip)]
    pub content: Vec<u8>,
    pub stored_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Create a new document, hashing its content
    pub fn new(
        id: DocumentId,
        source: impl Into<String>,
        file_type: FileType,
        content_type: Option<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            id,
            source: source.into(),
            file_type,
            content_type,
            content_hash: hash_content(&content),
            content,
            stored_at: chrono::Utc::now(),
        }
    }

    /// Size of the raw content in bytes
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    /// Metadata-only view
    pub fn info(&self) -> DocumentInfo {
        DocumentInfo {
            id: self.id,
            source: self.source.clone(),
            file_type: self.file_type,
            content_type: self.content_type.clone(),
            content_hash: self.content_hash.clone(),
            size: self.size(),
            stored_at: self.stored_at,
        }
    }
}

/// Document metadata without the raw bytes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub source: String,
    pub file_type: FileType,
    pub content_type: Option<String>,
    pub content_hash: String,
    pub size: u64,
    pub stored_at: chrono::DateTime<chrono::Utc>,
}

/// A contiguous slice of a document's text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub document_id: DocumentId,
    /// Zero-based position within the document
    pub ordinal: u32,
    pub text: String,
    pub metadata: Metadata,
}

impl Chunk {
    /// Vector store id: `"{document_id}:{ordinal}"`
    pub fn entry_id(&self) -> String {
        format!("{}:{}", self.document_id, self.ordinal)
    }
}

/// A chunk paired with its embedding
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

impl EmbeddedChunk {
    /// Convert into the entry written to the vector store
    pub fn into_entry(self) -> VectorEntry {
        VectorEntry {
            id: self.chunk.entry_id(),
            vector: self.embedding,
            text: self.chunk.text,
            metadata: self.chunk.metadata,
        }
    }
}

/// Record held by a vector store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: Metadata,
}

/// Vector query hit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredEntry {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Hex-encoded SHA-256 of raw bytes
pub fn hash_content(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(data))
}
