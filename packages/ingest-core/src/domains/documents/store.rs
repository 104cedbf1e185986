//! Document row persistence.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use super::models::{Document, DocumentStatus};
use crate::common::{DocumentId, TenantId};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create(
        &self,
        tenant_id: TenantId,
        filename: &str,
        mime_type: &str,
        file_size: i64,
    ) -> Result<Document>;

    async fn set_storage_path(&self, id: DocumentId, storage_path: &str) -> Result<()>;

    async fn mark_completed(&self, id: DocumentId) -> Result<()>;

    async fn mark_failed(&self, id: DocumentId, error: &str) -> Result<()>;

    async fn fetch(&self, tenant_id: TenantId, id: DocumentId) -> Result<Option<Document>>;

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<Document>>;

    async fn delete(&self, tenant_id: TenantId, id: DocumentId) -> Result<bool>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for std::sync::Arc<T> {
    async fn create(
        &self,
        tenant_id: TenantId,
        filename: &str,
        mime_type: &str,
        file_size: i64,
    ) -> Result<Document> {
        self.as_ref().create(tenant_id, filename, mime_type, file_size).await
    }

    async fn set_storage_path(&self, id: DocumentId, storage_path: &str) -> Result<()> {
        self.as_ref().set_storage_path(id, storage_path).await
    }

    async fn mark_completed(&self, id: DocumentId) -> Result<()> {
        self.as_ref().mark_completed(id).await
    }

    async fn mark_failed(&self, id: DocumentId, error: &str) -> Result<()> {
        self.as_ref().mark_failed(id, error).await
    }

    async fn fetch(&self, tenant_id: TenantId, id: DocumentId) -> Result<Option<Document>> {
        self.as_ref().fetch(tenant_id, id).await
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<Document>> {
        self.as_ref().list(tenant_id).await
    }

    async fn delete(&self, tenant_id: TenantId, id: DocumentId) -> Result<bool> {
        self.as_ref().delete(tenant_id, id).await
    }
}

pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn create(
        &self,
        tenant_id: TenantId,
        filename: &str,
        mime_type: &str,
        file_size: i64,
    ) -> Result<Document> {
        sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents
                (id, tenant_id, filename, original_filename, storage_path,
                 file_size, mime_type, status, created_at)
            VALUES ($1, $2, $3, $3, '', $4, $5, $6, NOW())
            RETURNING *
            "#,
        )
        .bind(DocumentId::new())
        .bind(tenant_id)
        .bind(filename)
        .bind(file_size)
        .bind(mime_type)
        .bind(DocumentStatus::Processing.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to create document")
    }

    async fn set_storage_path(&self, id: DocumentId, storage_path: &str) -> Result<()> {
        sqlx::query("UPDATE documents SET storage_path = $2 WHERE id = $1")
            .bind(id)
            .bind(storage_path)
            .execute(&self.pool)
            .await
            .context("Failed to set document storage path")?;
        Ok(())
    }

    async fn mark_completed(&self, id: DocumentId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE documents
            SET status = $2, processed_at = NOW(), error_message = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(DocumentStatus::Completed.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to mark document completed")?;
        Ok(())
    }

    async fn mark_failed(&self, id: DocumentId, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE documents
            SET status = $2, error_message = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(DocumentStatus::Failed.to_string())
        .bind(error)
        .execute(&self.pool)
        .await
        .context("Failed to mark document failed")?;
        Ok(())
    }

    async fn fetch(&self, tenant_id: TenantId, id: DocumentId) -> Result<Option<Document>> {
        sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch document")
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<Document>> {
        sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE tenant_id = $1 ORDER BY created_at DESC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list documents")
    }

    async fn delete(&self, tenant_id: TenantId, id: DocumentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete document")?;
        Ok(result.rows_affected() > 0)
    }
}
