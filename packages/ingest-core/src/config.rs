use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

use site_crawler::CrawlerConfig;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub vector_database_url: String,
    pub nats_url: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub embedding_model: String,
    pub classifier_model: String,
    pub billing_service_url: String,
    pub minio_endpoint: Option<String>,
    pub minio_access_key: Option<String>,
    pub minio_secret_key: Option<String>,
    pub minio_bucket_name: Option<String>,
    pub crawler: CrawlerConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            vector_database_url: env::var("VECTOR_DATABASE_URL")
                .context("VECTOR_DATABASE_URL must be set")?,
            nats_url: env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-ada-002".to_string()),
            classifier_model: env::var("CLASSIFIER_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            billing_service_url: env::var("BILLING_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8002".to_string()),
            minio_endpoint: env::var("MINIO_ENDPOINT").ok(),
            minio_access_key: env::var("MINIO_ACCESS_KEY").ok(),
            minio_secret_key: env::var("MINIO_SECRET_KEY").ok(),
            minio_bucket_name: env::var("MINIO_BUCKET_NAME").ok(),
            crawler: CrawlerConfig::from_env()?,
        })
    }

    /// Whether the embedding/classifier provider is usable. Checked by
    /// the background runner before any heavy work starts.
    pub fn has_model_credentials(&self) -> bool {
        !self.openai_api_key.is_empty()
    }
}
