//! Tenant-scoped vector index: chunk records, deduplicated embedding
//! ingestion, and row purging for deletes.

pub mod ingestor;
pub mod store;
pub mod types;

pub use ingestor::VectorIngestionService;
pub use store::{PgVectorStore, VectorStore};
pub use types::{ChunkMetadata, IngestChunk, NewChunk, SourceType};
