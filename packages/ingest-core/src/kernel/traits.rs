// Trait definitions for dependency injection
//
// Infrastructure traits only - no business logic. Domain services take
// these as trait objects so tests can swap in mocks.

use anyhow::Result;
use async_trait::async_trait;

/// Chat-completion provider used by the classifier.
#[async_trait]
pub trait BaseAi: Send + Sync {
    /// Complete a prompt with JSON-mode response enforcement; returns the
    /// raw JSON string for the caller to parse.
    async fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Embedding provider used by the vector ingestor.
#[async_trait]
pub trait BaseEmbeddingService: Send + Sync {
    /// Generate one embedding per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
