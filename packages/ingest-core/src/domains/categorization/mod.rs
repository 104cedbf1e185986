//! Hybrid document categorization: a deterministic rule pass over the
//! system category registry merged with a language-model pass.

pub mod classifier;
pub mod models;
pub mod registry;
pub mod store;

pub use classifier::{DocumentClassification, HybridClassifier, ScoredLabel};
pub use models::{DocumentCategory, DocumentTag};
pub use store::{CategorizationStore, PgCategorizationStore};
