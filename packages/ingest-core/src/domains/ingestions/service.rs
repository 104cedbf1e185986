//! Request-path operations for website ingestions.
//!
//! Everything here is short-lived: validate, gate, create or mutate a
//! row, enqueue the background job, and return. The long-running work
//! happens in [`IngestionRunner`](super::runner::IngestionRunner).

use std::sync::Arc;

use super::models::{IngestionStatus, WebsiteIngestion, WebsitePage};
use super::runner::{IngestionJob, IngestionRunner};
use super::store::IngestionStore;
use crate::common::{IngestionId, TenantId};
use crate::domains::billing::BillingClient;
use crate::domains::error::{ServiceError, ServiceResult};
use crate::domains::usage::UsagePublisher;
use crate::domains::vectors::VectorStore;
use site_crawler::ScrapingStrategy;

pub struct IngestionService {
    store: Arc<dyn IngestionStore>,
    vectors: Arc<dyn VectorStore>,
    billing: Arc<BillingClient>,
    publisher: Arc<UsagePublisher>,
    runner: Arc<IngestionRunner>,
    default_strategy: ScrapingStrategy,
}

/// Detail view with per-status page counts for the polling UI.
#[derive(Debug)]
pub struct IngestionStats {
    pub ingestion: WebsiteIngestion,
    pub pages_by_status: Vec<(String, i64)>,
    pub unique_content_pages: i64,
    pub processing_time_seconds: Option<i64>,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn IngestionStore>,
        vectors: Arc<dyn VectorStore>,
        billing: Arc<BillingClient>,
        publisher: Arc<UsagePublisher>,
        runner: Arc<IngestionRunner>,
        default_strategy: ScrapingStrategy,
    ) -> Self {
        Self {
            store,
            vectors,
            billing,
            publisher,
            runner,
            default_strategy,
        }
    }

    /// Start ingesting a website. The limit gate runs first, before any
    /// row exists, so a denied request leaves no trace.
    pub async fn start_website_ingestion(
        &self,
        tenant_id: TenantId,
        access_token: &str,
        website_url: &str,
        auto_categorize: bool,
    ) -> ServiceResult<WebsiteIngestion> {
        if !website_url.starts_with("http://") && !website_url.starts_with("https://") {
            return Err(ServiceError::Validation("Invalid URL format".to_string()));
        }

        let limit_check = self
            .billing
            .check_can_ingest_website(access_token, tenant_id)
            .await?;
        if !limit_check.allowed {
            return Err(ServiceError::LimitExceeded(
                limit_check
                    .reason
                    .unwrap_or_else(|| "Website ingestion not allowed".to_string()),
            ));
        }

        let ingestion = self
            .store
            .create(tenant_id, website_url, self.default_strategy)
            .await?;

        self.runner.clone().spawn(IngestionJob {
            tenant_id,
            ingestion_id: ingestion.id,
            strategy: self.default_strategy,
            auto_categorize,
        });

        tracing::info!(
            tenant_id = %tenant_id,
            ingestion_id = %ingestion.id,
            website_url = %website_url,
            "Website ingestion started"
        );
        Ok(ingestion)
    }

    /// Retry a terminal ingestion. A failed run goes back to `auto` so
    /// the strategy can be re-learned; a completed run reuses whatever
    /// strategy worked before.
    pub async fn retry_ingestion(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> ServiceResult<ScrapingStrategy> {
        let ingestion = self.require(tenant_id, ingestion_id).await?;

        let strategy = match ingestion.status() {
            IngestionStatus::Failed => ScrapingStrategy::Auto,
            IngestionStatus::Completed => ingestion.strategy(),
            _ => {
                return Err(ServiceError::Validation(
                    "Can only retry failed or completed ingestions".to_string(),
                ))
            }
        };

        self.store.reset_for_retry(ingestion_id, strategy).await?;

        self.runner.clone().spawn(IngestionJob {
            tenant_id,
            ingestion_id,
            strategy,
            auto_categorize: true,
        });

        tracing::info!(
            tenant_id = %tenant_id,
            ingestion_id = %ingestion_id,
            strategy = %strategy,
            "Website ingestion retry started"
        );
        Ok(strategy)
    }

    /// Delete an ingestion: vector rows first, then page and ingestion
    /// rows, then the usage event (logged on failure, never fatal).
    pub async fn delete_ingestion(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> ServiceResult<()> {
        let ingestion = self.require(tenant_id, ingestion_id).await?;

        self.vectors
            .delete_ingestion_chunks(tenant_id, ingestion_id)
            .await?;

        let deleted = self.store.delete(tenant_id, ingestion_id).await?;
        if !deleted {
            return Err(ServiceError::NotFound("Ingestion not found".to_string()));
        }

        if !self
            .publisher
            .publish_website_removed(tenant_id, ingestion_id, &ingestion.base_url)
            .await
        {
            tracing::error!(
                tenant_id = %tenant_id,
                ingestion_id = %ingestion_id,
                "Failed to publish website removal usage event"
            );
        }

        Ok(())
    }

    pub async fn get_ingestion(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> ServiceResult<WebsiteIngestion> {
        self.require(tenant_id, ingestion_id).await
    }

    pub async fn list_ingestions(&self, tenant_id: TenantId) -> ServiceResult<Vec<WebsiteIngestion>> {
        Ok(self.store.list(tenant_id).await?)
    }

    /// Paginated page rows for one ingestion, newest first.
    pub async fn list_pages(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
        page: i64,
        page_size: i64,
    ) -> ServiceResult<(Vec<WebsitePage>, i64)> {
        self.require(tenant_id, ingestion_id).await?;
        let offset = (page.max(1) - 1) * page_size;
        Ok(self
            .store
            .list_pages(tenant_id, ingestion_id, offset, page_size)
            .await?)
    }

    pub async fn ingestion_stats(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> ServiceResult<IngestionStats> {
        let ingestion = self.require(tenant_id, ingestion_id).await?;
        let pages_by_status = self
            .store
            .page_status_counts(tenant_id, ingestion_id)
            .await?;
        let unique_content_pages = self
            .store
            .hashed_page_count(tenant_id, ingestion_id)
            .await?;
        let processing_time_seconds = ingestion.processing_time_seconds();

        Ok(IngestionStats {
            ingestion,
            pages_by_status,
            unique_content_pages,
            processing_time_seconds,
        })
    }

    async fn require(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> ServiceResult<WebsiteIngestion> {
        self.store
            .fetch(tenant_id, ingestion_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(
                    "Ingestion not found or does not belong to this tenant".to_string(),
                )
            })
    }
}
