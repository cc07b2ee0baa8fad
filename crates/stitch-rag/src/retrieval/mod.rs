//! Retrieval: metadata filters, the in-memory vector store and self-querying

mod filter;
mod memory_store;
mod self_query;

pub use filter::{AttributeInfo, MetadataFilter};
pub use memory_store::{cosine_similarity, InMemoryVectorStore};
pub use self_query::{parse_structured_query, SelfQueryRetriever, StructuredQuery};
