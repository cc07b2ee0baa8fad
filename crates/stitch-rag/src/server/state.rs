//! Application state for the HTTP server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::{AppConfig, ObjectBackend, VectorBackend};
use crate::error::{Error, Result};
use crate::ingestion::HttpFetcher;
use crate::providers::{
    DocumentStore, EmbeddingProvider, LanguageModel, LocalObjectStore, MilvusVectorStore,
    ObjectStore, OcrProvider, OpenAiChat, OpenAiEmbedder, RapidApiOcr, SpeechRecognizer,
    SpeechSynthesizer, VectorStoreProvider,
};
use crate::rag::{RagOptions, RagOrchestrator, RagServices};
use crate::retrieval::InMemoryVectorStore;
use crate::storage::SqliteDocumentStore;

/// Every service handle the routes use, built once at startup
#[derive(Clone)]
pub struct ServiceRegistry {
    pub rag: RagServices,
    pub object_store: Arc<dyn ObjectStore>,
    /// Set when objects live on local disk and are served from `/objects`
    pub local_objects: Option<Arc<LocalObjectStore>>,
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub recognizer: Option<Arc<dyn SpeechRecognizer>>,
    pub ocr: Option<Arc<dyn OcrProvider>>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    services: ServiceRegistry,
    orchestrator: RagOrchestrator,
    ready: RwLock<bool>,
}

impl AppState {
    /// Build every backend the configuration selects
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        tracing::info!(
            "Initializing services (vector store: {:?}, object store: {:?})",
            config.vector_db.backend,
            config.object_store.backend
        );

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OpenAiEmbedder::new(&config.embeddings)?);
        let llm: Arc<dyn LanguageModel> = Arc::new(OpenAiChat::new(&config.llm)?);
        tracing::info!(
            "OpenAI-compatible providers at {} (embeddings: {}, chat: {})",
            config.llm.base_url,
            config.embeddings.model,
            config.llm.model
        );

        let dimensions = config.embeddings.dimensions;
        let vector_store: Arc<dyn VectorStoreProvider> = match config.vector_db.backend {
            VectorBackend::Memory => Arc::new(InMemoryVectorStore::with_dimensions(dimensions)),
            VectorBackend::Milvus => {
                tracing::info!(
                    "Milvus at {} (collection {})",
                    config.vector_db.milvus_url,
                    config.vector_db.collection
                );
                Arc::new(MilvusVectorStore::new(&config.vector_db, dimensions)?)
            }
        };

        let document_store: Arc<dyn DocumentStore> =
            Arc::new(SqliteDocumentStore::new(&config.document_store.path)?);
        tracing::info!("Document store at {}", config.document_store.path.display());

        let fetcher = Arc::new(HttpFetcher::new(config.processing.fetch_timeout_secs)?);

        let (object_store, local_objects) = build_object_store(&config).await?;

        #[cfg_attr(not(feature = "gcp"), allow(unused_mut))]
        let mut ocr: Option<Arc<dyn OcrProvider>> = match RapidApiOcr::from_config(&config.ocr)? {
            Some(rapidapi) => {
                tracing::info!("OCR via RapidAPI");
                Some(Arc::new(rapidapi))
            }
            None => None,
        };
        #[cfg_attr(not(feature = "gcp"), allow(unused_mut))]
        let mut synthesizer: Option<Arc<dyn SpeechSynthesizer>> = None;
        #[cfg_attr(not(feature = "gcp"), allow(unused_mut))]
        let mut recognizer: Option<Arc<dyn SpeechRecognizer>> = None;

        #[cfg(feature = "gcp")]
        if let Some(gcp) = &config.gcp {
            use crate::providers::gcp::{DocumentAiOcr, GcpAuth, GoogleStt, GoogleTts};

            let auth = Arc::new(GcpAuth::from_service_account(
                &gcp.service_account_key_path,
                gcp.project_id.clone(),
            )?);

            if gcp.enable_speech {
                synthesizer = Some(Arc::new(GoogleTts::new(Arc::clone(&auth), &config.speech)));
                recognizer = Some(Arc::new(GoogleStt::new(Arc::clone(&auth), &config.speech)));
                tracing::info!("Google speech enabled ({})", config.speech.language_code);
            }

            if ocr.is_none() {
                if let Some(processor) = &gcp.document_ai_processor {
                    let document_ai =
                        DocumentAiOcr::new(Arc::clone(&auth), &gcp.location, processor, config.ocr.retry.clone());
                    tracing::info!("OCR via Document AI ({})", document_ai.processor_name());
                    ocr = Some(Arc::new(document_ai));
                }
            }
        }

        #[cfg(not(feature = "gcp"))]
        if config.gcp.is_some() {
            tracing::warn!("gcp section ignored: built without the gcp feature");
        }

        if ocr.is_none() {
            tracing::warn!("No OCR provider configured; /upload-and-ocr will return 503");
        }
        if synthesizer.is_none() {
            tracing::warn!("No speech provider configured; /sing and /listen will return 503");
        }

        let services = ServiceRegistry {
            rag: RagServices {
                embedder,
                vector_store,
                llm,
                document_store,
                fetcher,
            },
            object_store,
            local_objects,
            synthesizer,
            recognizer,
            ocr,
        };

        Self::from_services(config, services)
    }

    /// Assemble state from prebuilt services
    pub fn from_services(config: AppConfig, services: ServiceRegistry) -> Result<Self> {
        let options = RagOptions::from_config(&config)?;
        let orchestrator = RagOrchestrator::new(services.rag.clone(), options);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                services,
                orchestrator,
                ready: RwLock::new(true),
            }),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.inner.services
    }

    pub fn orchestrator(&self) -> &RagOrchestrator {
        &self.inner.orchestrator
    }

    pub fn llm(&self) -> &Arc<dyn LanguageModel> {
        &self.inner.services.rag.llm
    }

    pub fn document_store(&self) -> &Arc<dyn DocumentStore> {
        &self.inner.services.rag.document_store
    }

    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.inner.services.object_store
    }

    pub fn synthesizer(&self) -> Result<&Arc<dyn SpeechSynthesizer>> {
        self.inner
            .services
            .synthesizer
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("Text-to-speech".to_string()))
    }

    pub fn recognizer(&self) -> Result<&Arc<dyn SpeechRecognizer>> {
        self.inner
            .services
            .recognizer
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("Speech-to-text".to_string()))
    }

    pub fn ocr(&self) -> Result<&Arc<dyn OcrProvider>> {
        self.inner
            .services
            .ocr
            .as_ref()
            .ok_or_else(|| Error::NotConfigured("OCR".to_string()))
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}

async fn build_object_store(
    config: &AppConfig,
) -> Result<(Arc<dyn ObjectStore>, Option<Arc<LocalObjectStore>>)> {
    match config.object_store.backend {
        ObjectBackend::Local => {
            let local = Arc::new(LocalObjectStore::from_config(&config.object_store)?);
            tracing::info!("Objects stored under {}", local.root().display());
            let store: Arc<dyn ObjectStore> = local.clone();
            Ok((store, Some(local)))
        }
        ObjectBackend::Gcs => {
            #[cfg(feature = "gcp")]
            {
                let bucket = config.object_store.gcs_bucket.clone().ok_or_else(|| {
                    Error::Config("object_store.gcs_bucket is required for the gcs backend".to_string())
                })?;
                let gcs = crate::providers::gcp::GcsObjectStore::new(bucket).await?;
                tracing::info!("Objects stored in gs://{}", gcs.bucket());
                Ok((Arc::new(gcs), None))
            }
            #[cfg(not(feature = "gcp"))]
            {
                Err(Error::Config(
                    "GCS object store selected but the gcp feature is not enabled. \
                     Rebuild with --features gcp"
                        .to_string(),
                ))
            }
        }
    }
}
