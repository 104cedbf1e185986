//! Ingestion and page row persistence.
//!
//! `PgIngestionStore` owns the ingestion lifecycle queries and also
//! implements the crawler's [`CrawlStore`] seam, so the orchestrator's
//! page records and progress checkpoints land in the same tables.
//! Status updates carry `WHERE` guards so a terminal row can never be
//! overwritten by a late writer.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{PageStatus, WebsiteIngestion, WebsitePage};
use crate::common::{IngestionId, PageId, TenantId};
use site_crawler::{ContentHash, CrawlProgress, CrawlStore, CrawlTarget, ScrapingStrategy};

#[async_trait]
pub trait IngestionStore: Send + Sync {
    async fn create(
        &self,
        tenant_id: TenantId,
        base_url: &str,
        strategy: ScrapingStrategy,
    ) -> Result<WebsiteIngestion>;

    async fn fetch(
        &self,
        tenant_id: TenantId,
        id: IngestionId,
    ) -> Result<Option<WebsiteIngestion>>;

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<WebsiteIngestion>>;

    async fn mark_in_progress(&self, id: IngestionId) -> Result<()>;

    async fn mark_completed(&self, id: IngestionId) -> Result<()>;

    async fn mark_failed(&self, id: IngestionId, error: &str) -> Result<()>;

    /// Put a terminal ingestion back to `pending` with fresh counters
    /// and the strategy the retry should use. Old page rows are removed
    /// so the re-crawl's counters stay truthful.
    async fn reset_for_retry(&self, id: IngestionId, strategy: ScrapingStrategy) -> Result<()>;

    /// Delete the ingestion and its page rows. Returns false when the
    /// row did not exist for this tenant.
    async fn delete(&self, tenant_id: TenantId, id: IngestionId) -> Result<bool>;

    /// Page rows, newest first, with the total count for pagination.
    async fn list_pages(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<WebsitePage>, i64)>;

    async fn page_status_counts(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> Result<Vec<(String, i64)>>;

    /// Pages that finished with a content hash set.
    async fn hashed_page_count(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> Result<i64>;
}

#[async_trait]
impl<T: IngestionStore + ?Sized> IngestionStore for std::sync::Arc<T> {
    async fn create(
        &self,
        tenant_id: TenantId,
        base_url: &str,
        strategy: ScrapingStrategy,
    ) -> Result<WebsiteIngestion> {
        self.as_ref().create(tenant_id, base_url, strategy).await
    }

    async fn fetch(
        &self,
        tenant_id: TenantId,
        id: IngestionId,
    ) -> Result<Option<WebsiteIngestion>> {
        self.as_ref().fetch(tenant_id, id).await
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<WebsiteIngestion>> {
        self.as_ref().list(tenant_id).await
    }

    async fn mark_in_progress(&self, id: IngestionId) -> Result<()> {
        self.as_ref().mark_in_progress(id).await
    }

    async fn mark_completed(&self, id: IngestionId) -> Result<()> {
        self.as_ref().mark_completed(id).await
    }

    async fn mark_failed(&self, id: IngestionId, error: &str) -> Result<()> {
        self.as_ref().mark_failed(id, error).await
    }

    async fn reset_for_retry(&self, id: IngestionId, strategy: ScrapingStrategy) -> Result<()> {
        self.as_ref().reset_for_retry(id, strategy).await
    }

    async fn delete(&self, tenant_id: TenantId, id: IngestionId) -> Result<bool> {
        self.as_ref().delete(tenant_id, id).await
    }

    async fn list_pages(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<WebsitePage>, i64)> {
        self.as_ref().list_pages(tenant_id, ingestion_id, offset, limit).await
    }

    async fn page_status_counts(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> Result<Vec<(String, i64)>> {
        self.as_ref().page_status_counts(tenant_id, ingestion_id).await
    }

    async fn hashed_page_count(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> Result<i64> {
        self.as_ref().hashed_page_count(tenant_id, ingestion_id).await
    }
}

pub struct PgIngestionStore {
    pool: PgPool,
}

impl PgIngestionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IngestionStore for PgIngestionStore {
    async fn create(
        &self,
        tenant_id: TenantId,
        base_url: &str,
        strategy: ScrapingStrategy,
    ) -> Result<WebsiteIngestion> {
        sqlx::query_as::<_, WebsiteIngestion>(
            r#"
            INSERT INTO website_ingestions
                (id, tenant_id, base_url, status, scraping_strategy,
                 pages_discovered, pages_processed, pages_failed, created_at)
            VALUES ($1, $2, $3, 'pending', $4, 0, 0, 0, NOW())
            RETURNING *
            "#,
        )
        .bind(IngestionId::new())
        .bind(tenant_id)
        .bind(base_url)
        .bind(strategy.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to create ingestion")
    }

    async fn fetch(
        &self,
        tenant_id: TenantId,
        id: IngestionId,
    ) -> Result<Option<WebsiteIngestion>> {
        sqlx::query_as::<_, WebsiteIngestion>(
            "SELECT * FROM website_ingestions WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch ingestion")
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<WebsiteIngestion>> {
        sqlx::query_as::<_, WebsiteIngestion>(
            "SELECT * FROM website_ingestions WHERE tenant_id = $1 ORDER BY created_at DESC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list ingestions")
    }

    async fn mark_in_progress(&self, id: IngestionId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE website_ingestions
            SET status = 'in_progress', started_at = NOW(), error_message = NULL
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to mark ingestion in progress")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Ingestion {id} is not pending");
        }
        Ok(())
    }

    async fn mark_completed(&self, id: IngestionId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE website_ingestions
            SET status = 'completed', completed_at = NOW()
            WHERE id = $1 AND status = 'in_progress'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to mark ingestion completed")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Ingestion {id} is not in progress");
        }
        Ok(())
    }

    async fn mark_failed(&self, id: IngestionId, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE website_ingestions
            SET status = 'failed', error_message = $2, completed_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'in_progress')
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .context("Failed to mark ingestion failed")?;
        Ok(())
    }

    async fn reset_for_retry(&self, id: IngestionId, strategy: ScrapingStrategy) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE website_ingestions
            SET status = 'pending', scraping_strategy = $2,
                pages_discovered = 0, pages_processed = 0, pages_failed = 0,
                error_message = NULL, started_at = NULL, completed_at = NULL
            WHERE id = $1 AND status IN ('completed', 'failed')
            "#,
        )
        .bind(id)
        .bind(strategy.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to reset ingestion for retry")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Ingestion {id} is not in a terminal state");
        }

        sqlx::query("DELETE FROM website_pages WHERE ingestion_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to clear pages for retry")?;
        Ok(())
    }

    async fn delete(&self, tenant_id: TenantId, id: IngestionId) -> Result<bool> {
        sqlx::query("DELETE FROM website_pages WHERE tenant_id = $1 AND ingestion_id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete ingestion pages")?;

        let result =
            sqlx::query("DELETE FROM website_ingestions WHERE tenant_id = $1 AND id = $2")
                .bind(tenant_id)
                .bind(id)
                .execute(&self.pool)
                .await
                .context("Failed to delete ingestion")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_pages(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<WebsitePage>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM website_pages WHERE tenant_id = $1 AND ingestion_id = $2",
        )
        .bind(tenant_id)
        .bind(ingestion_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count pages")?;

        let pages = sqlx::query_as::<_, WebsitePage>(
            r#"
            SELECT * FROM website_pages
            WHERE tenant_id = $1 AND ingestion_id = $2
            ORDER BY created_at DESC
            OFFSET $3 LIMIT $4
            "#,
        )
        .bind(tenant_id)
        .bind(ingestion_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list pages")?;

        Ok((pages, total))
    }

    async fn page_status_counts(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*) FROM website_pages
            WHERE tenant_id = $1 AND ingestion_id = $2
            GROUP BY status
            "#,
        )
        .bind(tenant_id)
        .bind(ingestion_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to count pages by status")?;
        Ok(rows)
    }

    async fn hashed_page_count(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> Result<i64> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM website_pages
            WHERE tenant_id = $1 AND ingestion_id = $2 AND content_hash IS NOT NULL
            "#,
        )
        .bind(tenant_id)
        .bind(ingestion_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count hashed pages")
    }
}

#[async_trait]
impl CrawlStore for PgIngestionStore {
    async fn create_page(&self, target: &CrawlTarget, url: &str) -> Result<Uuid> {
        let id = PageId::new();
        sqlx::query(
            r#"
            INSERT INTO website_pages (id, tenant_id, ingestion_id, url, status, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            "#,
        )
        .bind(id)
        .bind(target.tenant_id)
        .bind(target.ingestion_id)
        .bind(url)
        .bind(PageStatus::Processing.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to create page record")?;
        Ok(id.into_uuid())
    }

    async fn complete_page(
        &self,
        page_id: Uuid,
        title: Option<&str>,
        content_hash: &ContentHash,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE website_pages
            SET status = $2, title = $3, content_hash = $4, scraped_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(page_id)
        .bind(PageStatus::Completed.to_string())
        .bind(title)
        .bind(content_hash.to_hex())
        .execute(&self.pool)
        .await
        .context("Failed to complete page record")?;
        Ok(())
    }

    async fn fail_page(&self, page_id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE website_pages
            SET status = $2, error_message = $3, scraped_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(page_id)
        .bind(PageStatus::Failed.to_string())
        .bind(error)
        .execute(&self.pool)
        .await
        .context("Failed to record page failure")?;
        Ok(())
    }

    async fn checkpoint(&self, target: &CrawlTarget, progress: &CrawlProgress) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE website_ingestions
            SET pages_discovered = $2, pages_processed = $3, pages_failed = $4
            WHERE id = $1
            "#,
        )
        .bind(target.ingestion_id)
        .bind(progress.pages_discovered)
        .bind(progress.pages_processed)
        .bind(progress.pages_failed)
        .execute(&self.pool)
        .await
        .context("Failed to checkpoint crawl progress")?;
        Ok(())
    }
}

// Guard sanity for the status transitions the store enforces in SQL.
#[cfg(test)]
mod tests {
    use super::super::models::IngestionStatus;

    #[test]
    fn test_sql_guards_mirror_state_machine() {
        use IngestionStatus::*;
        // mark_in_progress: WHERE status = 'pending'
        assert!(Pending.can_transition_to(InProgress));
        // mark_completed: WHERE status = 'in_progress'
        assert!(InProgress.can_transition_to(Completed));
        // mark_failed: WHERE status IN ('pending', 'in_progress')
        assert!(Pending.can_transition_to(Failed));
        assert!(InProgress.can_transition_to(Failed));
        // reset_for_retry: WHERE status IN ('completed', 'failed')
        assert!(Completed.can_transition_to(Pending));
        assert!(Failed.can_transition_to(Pending));
    }
}
