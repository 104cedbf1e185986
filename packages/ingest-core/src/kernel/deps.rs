//! The process-wide dependency container.
//!
//! Every external service sits behind a trait object so the domain
//! layer can be exercised against in-memory fakes. Constructed once at
//! startup; the (out-of-scope) HTTP surface clones it per request.

use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::Config;
use crate::domains::billing::BillingClient;
use crate::domains::categorization::{CategorizationStore, HybridClassifier, PgCategorizationStore};
use crate::domains::documents::{DocumentProcessor, DocumentStore, PgDocumentStore};
use crate::domains::ingestions::{IngestionRunner, IngestionService, IngestionStore, PgIngestionStore};
use crate::domains::usage::{NatsConnector, UsagePublisher};
use crate::domains::vectors::{PgVectorStore, VectorIngestionService, VectorStore};
use crate::kernel::object_store::DocumentStorage;
use crate::kernel::openai::OpenAiClient;
use crate::kernel::traits::{BaseAi, BaseEmbeddingService};
use site_crawler::{BrowserFetcher, CrawlStore, HttpFetcher, PageFetcher};

#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    pub vector_pool: PgPool,
    pub ingestions: Arc<dyn IngestionStore>,
    pub crawl_store: Arc<dyn CrawlStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub categorization: Arc<PgCategorizationStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub vector_ingestion: Arc<VectorIngestionService>,
    pub embeddings: Arc<dyn BaseEmbeddingService>,
    pub ai: Arc<dyn BaseAi>,
    pub classifier: Arc<HybridClassifier>,
    pub publisher: Arc<UsagePublisher>,
    pub billing: Arc<BillingClient>,
    pub storage: Arc<DocumentStorage>,
    pub runner: Arc<IngestionRunner>,
    pub config: Config,
}

impl ServerDeps {
    /// Wire production implementations against the given pools.
    pub fn new(db_pool: PgPool, vector_pool: PgPool, config: Config) -> Result<Self> {
        let ingestion_store = Arc::new(PgIngestionStore::new(db_pool.clone()));
        let ingestions: Arc<dyn IngestionStore> = ingestion_store.clone();
        let crawl_store: Arc<dyn CrawlStore> = ingestion_store;
        let documents: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(db_pool.clone()));
        let categorization = Arc::new(PgCategorizationStore::new(db_pool.clone()));
        let vectors: Arc<dyn VectorStore> = Arc::new(PgVectorStore::new(vector_pool.clone()));

        let openai = Arc::new(OpenAiClient::new(&config));
        let embeddings: Arc<dyn BaseEmbeddingService> = openai.clone();
        let ai: Arc<dyn BaseAi> = openai;

        let categorization_store: Arc<dyn CategorizationStore> = categorization.clone();
        let classifier = Arc::new(HybridClassifier::new(
            ai.clone(),
            categorization_store.clone(),
        ));
        let vector_ingestion = Arc::new(VectorIngestionService::new(
            vectors.clone(),
            embeddings.clone(),
        ));
        let publisher = Arc::new(UsagePublisher::new(Box::new(NatsConnector::new(
            config.nats_url.clone(),
        ))));
        let billing = Arc::new(BillingClient::new(config.billing_service_url.clone()));
        let storage = Arc::new(DocumentStorage::from_config(&config)?);

        let http_fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&config.crawler)?);
        let browser_fetcher: Arc<dyn PageFetcher> = Arc::new(BrowserFetcher::new(&config.crawler));

        let runner = Arc::new(IngestionRunner::new(
            ingestions.clone(),
            crawl_store.clone(),
            categorization_store,
            classifier.clone(),
            vector_ingestion.clone(),
            publisher.clone(),
            http_fetcher,
            browser_fetcher,
            config.crawler.clone(),
            config.has_model_credentials(),
        ));

        Ok(Self {
            db_pool,
            vector_pool,
            ingestions,
            crawl_store,
            documents,
            categorization,
            vectors,
            vector_ingestion,
            embeddings,
            ai,
            classifier,
            publisher,
            billing,
            storage,
            runner,
            config,
        })
    }

    pub fn ingestion_service(&self) -> IngestionService {
        IngestionService::new(
            self.ingestions.clone(),
            self.vectors.clone(),
            self.billing.clone(),
            self.publisher.clone(),
            self.runner.clone(),
            self.config.crawler.strategy,
        )
    }

    pub fn document_processor(&self) -> DocumentProcessor {
        let categorization: Arc<dyn CategorizationStore> = self.categorization.clone();
        DocumentProcessor::new(
            self.documents.clone(),
            categorization,
            self.classifier.clone(),
            self.vector_ingestion.clone(),
            self.storage.clone(),
            self.publisher.clone(),
            self.billing.clone(),
        )
    }
}
