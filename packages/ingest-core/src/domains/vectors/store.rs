//! Vector store access over pgvector.

use anyhow::{Context, Result};
use async_trait::async_trait;
use pgvector::Vector;
use sqlx::PgPool;

use super::types::NewChunk;
use crate::common::{DocumentId, IngestionId, TenantId};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether a chunk with this content hash already exists for the
    /// tenant (the deduplication key).
    async fn contains_hash(&self, tenant_id: TenantId, content_hash: &str) -> Result<bool>;

    async fn insert_chunks(&self, tenant_id: TenantId, chunks: &[NewChunk]) -> Result<()>;

    /// Bump the per-tenant index statistics after an ingest.
    async fn record_indexed(&self, tenant_id: TenantId, added: i64) -> Result<()>;

    async fn delete_document_chunks(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
    ) -> Result<u64>;

    async fn delete_ingestion_chunks(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> Result<u64>;

    async fn delete_tenant_chunks(&self, tenant_id: TenantId) -> Result<u64>;
}

#[async_trait]
impl<T: VectorStore + ?Sized> VectorStore for std::sync::Arc<T> {
    async fn contains_hash(&self, tenant_id: TenantId, content_hash: &str) -> Result<bool> {
        self.as_ref().contains_hash(tenant_id, content_hash).await
    }

    async fn insert_chunks(&self, tenant_id: TenantId, chunks: &[NewChunk]) -> Result<()> {
        self.as_ref().insert_chunks(tenant_id, chunks).await
    }

    async fn record_indexed(&self, tenant_id: TenantId, added: i64) -> Result<()> {
        self.as_ref().record_indexed(tenant_id, added).await
    }

    async fn delete_document_chunks(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
    ) -> Result<u64> {
        self.as_ref().delete_document_chunks(tenant_id, document_id).await
    }

    async fn delete_ingestion_chunks(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> Result<u64> {
        self.as_ref().delete_ingestion_chunks(tenant_id, ingestion_id).await
    }

    async fn delete_tenant_chunks(&self, tenant_id: TenantId) -> Result<u64> {
        self.as_ref().delete_tenant_chunks(tenant_id).await
    }
}

/// pgvector-backed store. Uses the dedicated vector database pool, not
/// the main relational pool.
pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn contains_hash(&self, tenant_id: TenantId, content_hash: &str) -> Result<bool> {
        let existing: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM document_chunks WHERE tenant_id = $1 AND content_hash = $2 LIMIT 1",
        )
        .bind(tenant_id)
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to check chunk hash")?;
        Ok(existing.is_some())
    }

    async fn insert_chunks(&self, tenant_id: TenantId, chunks: &[NewChunk]) -> Result<()> {
        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO document_chunks
                    (id, tenant_id, document_id, ingestion_id, content, content_hash,
                     chunk_index, embedding, source_type, source_name, page_number,
                     section_title, category_ids, tag_ids, content_type, language,
                     metadata, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                        $15, $16, $17, NOW())
                "#,
            )
            .bind(chunk.id)
            .bind(tenant_id)
            .bind(chunk.document_id)
            .bind(chunk.ingestion_id)
            .bind(&chunk.content)
            .bind(&chunk.content_hash)
            .bind(chunk.chunk_index)
            .bind(Vector::from(chunk.embedding.clone()))
            .bind(chunk.metadata.source_type.to_string())
            .bind(&chunk.metadata.source_name)
            .bind(chunk.metadata.page_number)
            .bind(&chunk.metadata.section_title)
            .bind(&chunk.metadata.category_ids)
            .bind(&chunk.metadata.tag_ids)
            .bind(&chunk.metadata.content_type)
            .bind(&chunk.metadata.language)
            .bind(serde_json::to_value(&chunk.metadata.extra)?)
            .execute(&self.pool)
            .await
            .context("Failed to insert chunk")?;
        }
        Ok(())
    }

    async fn record_indexed(&self, tenant_id: TenantId, added: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vector_search_indexes (id, tenant_id, total_chunks, last_indexed_at)
            VALUES (gen_random_uuid(), $1, $2, NOW())
            ON CONFLICT (tenant_id) DO UPDATE SET
                total_chunks = vector_search_indexes.total_chunks + $2,
                last_indexed_at = NOW()
            "#,
        )
        .bind(tenant_id)
        .bind(added)
        .execute(&self.pool)
        .await
        .context("Failed to update vector index statistics")?;
        Ok(())
    }

    async fn delete_document_chunks(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
    ) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM document_chunks WHERE tenant_id = $1 AND document_id = $2")
                .bind(tenant_id)
                .bind(document_id)
                .execute(&self.pool)
                .await
                .context("Failed to delete document chunks")?;
        let deleted = result.rows_affected();
        self.subtract_stats(tenant_id, deleted as i64).await?;
        tracing::info!(tenant_id = %tenant_id, document_id = %document_id, deleted, "Deleted document vectors");
        Ok(deleted)
    }

    async fn delete_ingestion_chunks(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM document_chunks WHERE tenant_id = $1 AND ingestion_id = $2")
                .bind(tenant_id)
                .bind(ingestion_id)
                .execute(&self.pool)
                .await
                .context("Failed to delete ingestion chunks")?;
        let deleted = result.rows_affected();
        self.subtract_stats(tenant_id, deleted as i64).await?;
        tracing::info!(tenant_id = %tenant_id, ingestion_id = %ingestion_id, deleted, "Deleted ingestion vectors");
        Ok(deleted)
    }

    async fn delete_tenant_chunks(&self, tenant_id: TenantId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM document_chunks WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete tenant chunks")?;
        sqlx::query("DELETE FROM vector_search_indexes WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete tenant index statistics")?;
        Ok(result.rows_affected())
    }
}

impl PgVectorStore {
    async fn subtract_stats(&self, tenant_id: TenantId, deleted: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE vector_search_indexes
            SET total_chunks = GREATEST(0, total_chunks - $2),
                last_indexed_at = NOW()
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .bind(deleted)
        .execute(&self.pool)
        .await
        .context("Failed to update vector index statistics")?;
        Ok(())
    }
}
