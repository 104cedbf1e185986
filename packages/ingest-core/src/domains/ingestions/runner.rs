//! The supervised background job that executes one ingestion.
//!
//! Each job runs in its own task with its own pooled connections and is
//! wrapped by a supervisor that writes the terminal state even when the
//! pipeline panics. The runner is the only writer of its ingestion's
//! status fields, and the final `completed` flip happens on a fresh
//! connection after everything else (crawl, classification, vector
//! write, usage event) has finished.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;

use site_crawler::{
    CrawlOrchestrator, CrawlOutcome, CrawlStore, CrawlTarget, CrawlerConfig, PageFetcher,
    ScrapingStrategy, StrategySelector,
};

use super::store::IngestionStore;
use crate::common::{IngestionId, TenantId};
use crate::domains::categorization::{CategorizationStore, HybridClassifier};
use crate::domains::usage::UsagePublisher;
use crate::domains::vectors::{ChunkMetadata, IngestChunk, SourceType, VectorIngestionService};

/// Web pages are previewed at 2000 characters for the model passes.
const PAGE_PREVIEW_CHARS: usize = 2000;

/// Parameters for one background ingestion run.
#[derive(Debug, Clone)]
pub struct IngestionJob {
    pub tenant_id: TenantId,
    pub ingestion_id: IngestionId,
    pub strategy: ScrapingStrategy,
    pub auto_categorize: bool,
}

pub struct IngestionRunner {
    ingestions: Arc<dyn IngestionStore>,
    crawl_store: Arc<dyn CrawlStore>,
    categorization: Arc<dyn CategorizationStore>,
    classifier: Arc<HybridClassifier>,
    vectors: Arc<VectorIngestionService>,
    publisher: Arc<UsagePublisher>,
    http_fetcher: Arc<dyn PageFetcher>,
    browser_fetcher: Arc<dyn PageFetcher>,
    crawler_config: CrawlerConfig,
    /// Checked before any heavy work; a job without model credentials
    /// fails immediately with a diagnostic message.
    model_credentials_present: bool,
}

impl IngestionRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ingestions: Arc<dyn IngestionStore>,
        crawl_store: Arc<dyn CrawlStore>,
        categorization: Arc<dyn CategorizationStore>,
        classifier: Arc<HybridClassifier>,
        vectors: Arc<VectorIngestionService>,
        publisher: Arc<UsagePublisher>,
        http_fetcher: Arc<dyn PageFetcher>,
        browser_fetcher: Arc<dyn PageFetcher>,
        crawler_config: CrawlerConfig,
        model_credentials_present: bool,
    ) -> Self {
        Self {
            ingestions,
            crawl_store,
            categorization,
            classifier,
            vectors,
            publisher,
            http_fetcher,
            browser_fetcher,
            crawler_config,
            model_credentials_present,
        }
    }

    /// Launch the job under a supervisor that guarantees a terminal
    /// status write even if the pipeline panics.
    pub fn spawn(self: Arc<Self>, job: IngestionJob) -> JoinHandle<()> {
        let runner = self;
        tokio::spawn(async move {
            let pipeline = {
                let runner = Arc::clone(&runner);
                let job = job.clone();
                tokio::spawn(async move { runner.run(&job).await })
            };

            match pipeline.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    runner.record_failure(&job, &format!("{err:#}")).await;
                }
                Err(join_err) => {
                    runner
                        .record_failure(&job, &format!("background job panicked: {join_err}"))
                        .await;
                }
            }
        })
    }

    async fn run(&self, job: &IngestionJob) -> Result<()> {
        tracing::info!(
            tenant_id = %job.tenant_id,
            ingestion_id = %job.ingestion_id,
            strategy = %job.strategy,
            "Background ingestion started"
        );

        if !self.model_credentials_present {
            anyhow::bail!("OPENAI_API_KEY is not configured");
        }

        // Re-read the row here; the caller's copy may be stale by the
        // time this task is scheduled.
        let ingestion = self
            .ingestions
            .fetch(job.tenant_id, job.ingestion_id)
            .await?
            .context("Ingestion row not found")?;

        self.ingestions.mark_in_progress(job.ingestion_id).await?;

        let selector = StrategySelector::new(
            Arc::clone(&self.http_fetcher),
            Arc::clone(&self.browser_fetcher),
            job.strategy,
            self.crawler_config.enable_fallback,
        );
        let mut orchestrator = CrawlOrchestrator::new(
            selector,
            Arc::clone(&self.crawl_store),
            &self.crawler_config,
        );
        let target = CrawlTarget {
            tenant_id: job.tenant_id.into_uuid(),
            ingestion_id: job.ingestion_id.into_uuid(),
            base_url: ingestion.base_url.clone(),
        };

        let outcome = orchestrator.run(&target).await?;
        let pages_scraped = outcome.pages.len();

        let chunks = self.classify_and_chunk(job, &outcome).await;

        if chunks.is_empty() {
            tracing::warn!(
                tenant_id = %job.tenant_id,
                ingestion_id = %job.ingestion_id,
                "No content extracted from website"
            );
        } else {
            self.vectors
                .ingest(job.tenant_id, chunks, None, Some(job.ingestion_id))
                .await?;

            // Fire-and-forget: a lost usage event must not fail the job.
            if !self
                .publisher
                .publish_website_added(
                    job.tenant_id,
                    job.ingestion_id,
                    &ingestion.base_url,
                    pages_scraped as i64,
                )
                .await
            {
                tracing::error!(
                    tenant_id = %job.tenant_id,
                    ingestion_id = %job.ingestion_id,
                    "Failed to publish website usage event"
                );
            }
        }

        // Completed only after the full pipeline; separate call, fresh
        // pooled connection.
        self.ingestions.mark_completed(job.ingestion_id).await?;

        tracing::info!(
            tenant_id = %job.tenant_id,
            ingestion_id = %job.ingestion_id,
            pages_scraped,
            "Background ingestion completed"
        );
        Ok(())
    }

    /// Classify each page once, resolve its category/tag rows, and stamp
    /// the resulting ids onto every chunk of that page. A page whose
    /// classification fails still gets its chunks ingested, unlabeled.
    async fn classify_and_chunk(
        &self,
        job: &IngestionJob,
        outcome: &CrawlOutcome,
    ) -> Vec<IngestChunk> {
        let mut chunks = Vec::new();

        for page in &outcome.pages {
            let classification = self
                .classifier
                .classify(&page.text, job.tenant_id, job.auto_categorize, PAGE_PREVIEW_CHARS)
                .await;

            let mut category_ids = Vec::new();
            for category in &classification.categories {
                match self
                    .categorization
                    .get_or_create_category(
                        job.tenant_id,
                        &category.name,
                        Some(&format!("Auto-categorized as {}", category.name)),
                        None,
                    )
                    .await
                {
                    Ok(row) => category_ids.push(row.id),
                    Err(err) => {
                        tracing::warn!(
                            category = %category.name,
                            error = %err,
                            "Failed to create category"
                        );
                    }
                }
            }

            let mut tag_ids = Vec::new();
            for tag in &classification.tags {
                match self
                    .categorization
                    .get_or_create_tag(job.tenant_id, &tag.name, "auto")
                    .await
                {
                    Ok(row) => tag_ids.push(row.id),
                    Err(err) => {
                        tracing::warn!(tag = %tag.name, error = %err, "Failed to create tag");
                    }
                }
            }

            let metadata = ChunkMetadata {
                source_type: SourceType::Website,
                source_name: page.url.clone(),
                page_number: Some(page.page_number as i32),
                section_title: page.title.clone(),
                category_ids,
                tag_ids,
                content_type: Some(classification.content_type.clone()),
                language: Some(classification.language.clone()),
                sentiment: Some(classification.sentiment.clone()),
                source_date: Some(page.scraped_at),
                ..Default::default()
            };

            for content in &page.chunks {
                chunks.push(IngestChunk {
                    content: content.clone(),
                    metadata: metadata.clone(),
                });
            }
        }

        chunks
    }

    async fn record_failure(&self, job: &IngestionJob, error: &str) {
        tracing::error!(
            tenant_id = %job.tenant_id,
            ingestion_id = %job.ingestion_id,
            error = %error,
            "Background ingestion failed"
        );
        if let Err(update_err) = self.ingestions.mark_failed(job.ingestion_id, error).await {
            tracing::error!(
                ingestion_id = %job.ingestion_id,
                error = %update_err,
                "Failed to record ingestion failure"
            );
        }
    }
}
