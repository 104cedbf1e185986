//! Uploaded documents: rows, text extraction, and the processing
//! pipeline (store blob, extract, classify, chunk, embed).

pub mod extract;
pub mod models;
pub mod processor;
pub mod store;

pub use models::{Document, DocumentStatus};
pub use processor::{DocumentProcessor, ProcessedDocument, UploadDocument};
pub use store::{DocumentStore, PgDocumentStore};
