//! Configuration for the service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::retrieval::AttributeInfo;
use crate::retry::RetryPolicy;

/// Environment variable naming the TOML configuration file
pub const CONFIG_PATH_ENV: &str = "STITCH_RAG_CONFIG";

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding API configuration
    pub embeddings: EmbeddingConfig,
    /// Chat completion API configuration
    pub llm: LlmConfig,
    /// Vector database configuration
    pub vector_db: VectorDbConfig,
    /// Raw document persistence
    pub document_store: DocumentStoreConfig,
    /// Generated/uploaded object storage
    pub object_store: ObjectStoreConfig,
    /// Text-to-speech / speech-to-text
    pub speech: SpeechConfig,
    /// OCR configuration
    pub ocr: OcrConfig,
    /// Retrieval and answering behaviour
    pub rag: RagSettings,
    /// Processing configuration
    pub processing: ProcessingConfig,
    /// GCP configuration (required for GCS, speech and Document AI)
    pub gcp: Option<GcpConfig>,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))
    }

    /// Load the optional file, apply process environment overrides, then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply secrets and endpoints from an environment lookup.
    ///
    /// Values that fail to parse (e.g. a non-numeric `PORT`) are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT value: {}", port),
            }
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.embeddings.api_key = Some(key.clone());
            self.llm.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.embeddings.base_url = url.clone();
            self.llm.base_url = url;
        }
        if let Some(url) = get("MILVUS_URL") {
            self.vector_db.milvus_url = url;
            self.vector_db.backend = VectorBackend::Milvus;
        }
        if let Some(path) = get("DOCUMENT_DB_PATH") {
            self.document_store.path = PathBuf::from(path);
        }
        if let Some(dir) = get("UPLOAD_DIR") {
            self.object_store.local_dir = PathBuf::from(dir);
        }
        if let Some(bucket) = get("GCS_BUCKET_NAME") {
            self.object_store.gcs_bucket = Some(bucket);
            self.object_store.backend = ObjectBackend::Gcs;
        }
        if let Some(url) = get("RAPIDAPI_URL") {
            self.ocr.rapidapi_url = Some(url);
        }
        if let Some(host) = get("RAPIDAPI_HOST") {
            self.ocr.rapidapi_host = Some(host);
        }
        if let Some(key) = get("RAPIDAPI_KEY") {
            self.ocr.rapidapi_key = Some(key);
        }

        let credentials = get("GOOGLE_APPLICATION_CREDENTIALS");
        let project = get("GCP_PROJECT_ID");
        if credentials.is_some() || project.is_some() {
            let gcp = self.gcp.get_or_insert_with(GcpConfig::default);
            if let Some(path) = credentials {
                gcp.service_account_key_path = PathBuf::from(path);
            }
            if let Some(project) = project {
                gcp.project_id = project;
            }
        }
    }

    /// Reject inconsistent settings
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be positive".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be positive".into()));
        }
        if self.rag.n_retrievals == 0 {
            return Err(Error::Config("rag.n_retrievals must be positive".into()));
        }
        if self.processing.parallel_embeddings == 0 {
            return Err(Error::Config("processing.parallel_embeddings must be positive".into()));
        }
        if self.object_store.backend == ObjectBackend::Gcs {
            if self.object_store.gcs_bucket.is_none() {
                return Err(Error::Config(
                    "object_store.backend = \"gcs\" requires object_store.gcs_bucket".into(),
                ));
            }
            if !cfg!(feature = "gcp") {
                return Err(Error::Config(
                    "GCS object store selected but the gcp feature is not enabled. \
                     Rebuild with --features gcp"
                        .into(),
                ));
            }
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
            request_timeout_secs: 300,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Embedding API configuration (OpenAI-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// API base URL, including the version segment
    pub base_url: String,
    /// Bearer token
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Embedding dimensions
    pub dimensions: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Backoff applied by callers around each embed call
    pub retry: RetryPolicy,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            timeout_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

/// Chat completion API configuration (OpenAI-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL, including the version segment
    pub base_url: String,
    /// Bearer token
    pub api_key: Option<String>,
    /// Chat model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries performed inside the client
    pub retry: RetryPolicy,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            timeout_secs: 120,
            retry: RetryPolicy::default(),
        }
    }
}

/// Vector store backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Exact scan held in process memory
    #[default]
    Memory,
    /// Milvus over its REST v2 API
    Milvus,
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    pub backend: VectorBackend,
    /// Milvus REST endpoint
    pub milvus_url: String,
    /// Collection holding the chunks
    pub collection: String,
    /// Optional Milvus token (`user:password` or API key)
    pub token: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Memory,
            milvus_url: "http://localhost:19530".to_string(),
            collection: "personal_documents".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentStoreConfig {
    /// SQLite database path
    pub path: PathBuf,
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            path: data_dir().join("documents.db"),
        }
    }
}

/// Object store backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectBackend {
    /// Files on local disk, served by the `/objects` route
    #[default]
    Local,
    /// Google Cloud Storage bucket
    Gcs,
}

/// Object store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub backend: ObjectBackend,
    /// Root directory for the local backend
    pub local_dir: PathBuf,
    /// URL prefix the local backend issues
    pub public_base_url: String,
    /// Bucket for the GCS backend
    pub gcs_bucket: Option<String>,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            backend: ObjectBackend::Local,
            local_dir: data_dir().join("objects"),
            public_base_url: "http://localhost:8000/objects".to_string(),
            gcs_bucket: None,
        }
    }
}

/// Speech configuration (Google Cloud Text-to-Speech / Speech-to-Text)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// BCP-47 language code for both directions
    pub language_code: String,
    /// Sample rate of LINEAR16 audio sent for recognition
    pub sample_rate_hertz: u32,
    pub retry: RetryPolicy,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language_code: "en-US".to_string(),
            sample_rate_hertz: 16000,
            retry: RetryPolicy::default(),
        }
    }
}

/// OCR configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// RapidAPI OCR endpoint
    pub rapidapi_url: Option<String>,
    /// Value of the `X-RapidAPI-Host` header
    pub rapidapi_host: Option<String>,
    /// Value of the `X-RapidAPI-Key` header
    pub rapidapi_key: Option<String>,
    pub retry: RetryPolicy,
}

/// Retrieval and answering behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Number of chunks retrieved per question
    pub n_retrievals: usize,
    /// Token budget for conversation memory
    pub chat_max_tokens: usize,
    /// Run a second LLM pass refining each answer
    pub refine_answers: bool,
    /// Description of the corpus given to the self-query LLM
    pub document_content_description: String,
    /// Filterable metadata attributes
    pub attributes: Vec<AttributeInfo>,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            n_retrievals: 4,
            chat_max_tokens: 3097,
            refine_answers: true,
            document_content_description: "Personal and web documents".to_string(),
            attributes: AttributeInfo::defaults(),
        }
    }
}

/// Processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Concurrent embedding requests per document
    pub parallel_embeddings: usize,
    /// Timeout for fetching a source URL in seconds
    pub fetch_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_embeddings: 4,
            fetch_timeout_secs: 60,
        }
    }
}

/// Google Cloud Platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    /// Path to service account JSON key file
    pub service_account_key_path: PathBuf,
    /// GCP project ID
    pub project_id: String,
    /// Document AI region (e.g., "us")
    pub location: String,
    /// Document AI processor ID, enables Document AI OCR when set
    pub document_ai_processor: Option<String>,
    /// Enable Text-to-Speech and Speech-to-Text
    pub enable_speech: bool,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            service_account_key_path: PathBuf::from("service-account.json"),
            project_id: String::new(),
            location: "us".to_string(),
            document_ai_processor: None,
            enable_speech: true,
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stitch-rag")
}
