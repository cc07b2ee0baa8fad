//! Storage module for persistent data storage
//!
//! Provides SQLite-based persistence for ingested documents.

mod database;

pub use database::SqliteDocumentStore;
