//! Stitch RAG server binary
//!
//! Run with: cargo run -p stitch-rag --bin stitch-rag-server -- --config stitch-rag.toml

use clap::Parser;
use std::path::PathBuf;
use stitch_rag::{
    config::{AppConfig, CONFIG_PATH_ENV},
    server::RagServer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "stitch-rag-server", version, about = "Document Q&A, speech and OCR over HTTP")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stitch_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Embeddings: {} ({} dims)", config.embeddings.model, config.embeddings.dimensions);
    tracing::info!("  - Chat model: {}", config.llm.model);
    tracing::info!("  - Vector store: {:?}", config.vector_db.backend);
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    if config.llm.api_key.is_none() {
        tracing::warn!("No OPENAI_API_KEY set; completions and embeddings will be rejected upstream");
    }

    let server = RagServer::new(config).await?;
    tracing::info!("Health: http://{}/health", server.address());
    tracing::info!("Endpoints: http://{}/info", server.address());

    server.start().await?;

    Ok(())
}
