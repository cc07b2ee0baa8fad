//! Document ingestion: fetching, text extraction and chunking

mod chunker;
mod fetcher;
mod loader;

pub use chunker::TextChunker;
pub use fetcher::{DocumentFetcher, FetchedDocument, HttpFetcher};
pub use loader::{load_text, DocumentLoader, DocxLoader, HtmlLoader, PdfLoader, TextLoader};
