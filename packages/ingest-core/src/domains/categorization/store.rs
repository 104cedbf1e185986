//! Persistence for categories, tags, and assignments.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use super::models::{AssignedBy, CategorySummary, DocumentCategory, DocumentTag};
use super::registry::SYSTEM_CATEGORIES;
use crate::common::{CategoryId, DocumentId, TagId, TenantId};

#[async_trait]
pub trait CategorizationStore: Send + Sync {
    /// Categories visible to the tenant, system categories first.
    async fn tenant_categories(&self, tenant_id: TenantId) -> Result<Vec<CategorySummary>>;

    async fn get_or_create_category(
        &self,
        tenant_id: TenantId,
        name: &str,
        description: Option<&str>,
        parent_id: Option<CategoryId>,
    ) -> Result<DocumentCategory>;

    /// Existing tags get their `usage_count` incremented.
    async fn get_or_create_tag(
        &self,
        tenant_id: TenantId,
        name: &str,
        tag_type: &str,
    ) -> Result<DocumentTag>;

    async fn save_category_assignment(
        &self,
        document_id: DocumentId,
        category_id: CategoryId,
        confidence: f32,
        assigned_by: AssignedBy,
    ) -> Result<()>;

    async fn save_tag_assignment(
        &self,
        document_id: DocumentId,
        tag_id: TagId,
        confidence: f32,
        assigned_by: AssignedBy,
    ) -> Result<()>;

    async fn delete_assignments_for_document(&self, document_id: DocumentId) -> Result<()>;
}

#[async_trait]
impl<T: CategorizationStore + ?Sized> CategorizationStore for std::sync::Arc<T> {
    async fn tenant_categories(&self, tenant_id: TenantId) -> Result<Vec<CategorySummary>> {
        self.as_ref().tenant_categories(tenant_id).await
    }

    async fn get_or_create_category(
        &self,
        tenant_id: TenantId,
        name: &str,
        description: Option<&str>,
        parent_id: Option<CategoryId>,
    ) -> Result<DocumentCategory> {
        self.as_ref()
            .get_or_create_category(tenant_id, name, description, parent_id)
            .await
    }

    async fn get_or_create_tag(
        &self,
        tenant_id: TenantId,
        name: &str,
        tag_type: &str,
    ) -> Result<DocumentTag> {
        self.as_ref().get_or_create_tag(tenant_id, name, tag_type).await
    }

    async fn save_category_assignment(
        &self,
        document_id: DocumentId,
        category_id: CategoryId,
        confidence: f32,
        assigned_by: AssignedBy,
    ) -> Result<()> {
        self.as_ref()
            .save_category_assignment(document_id, category_id, confidence, assigned_by)
            .await
    }

    async fn save_tag_assignment(
        &self,
        document_id: DocumentId,
        tag_id: TagId,
        confidence: f32,
        assigned_by: AssignedBy,
    ) -> Result<()> {
        self.as_ref()
            .save_tag_assignment(document_id, tag_id, confidence, assigned_by)
            .await
    }

    async fn delete_assignments_for_document(&self, document_id: DocumentId) -> Result<()> {
        self.as_ref().delete_assignments_for_document(document_id).await
    }
}

pub struct PgCategorizationStore {
    pool: PgPool,
}

impl PgCategorizationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Seed the five system categories (and their subcategories) for a
    /// tenant. Idempotent; already-seeded tenants are left untouched.
    pub async fn initialize_system_categories(&self, tenant_id: TenantId) -> Result<()> {
        for category in SYSTEM_CATEGORIES.iter() {
            let existing = sqlx::query_scalar::<_, CategoryId>(
                r#"
                SELECT id FROM document_categories
                WHERE tenant_id = $1 AND name = $2 AND is_system_category = true
                "#,
            )
            .bind(tenant_id)
            .bind(category.name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up system category")?;

            if existing.is_some() {
                continue;
            }

            let parent_id = CategoryId::new();
            sqlx::query(
                r#"
                INSERT INTO document_categories
                    (id, tenant_id, name, description, parent_category_id,
                     color, icon, is_system_category, created_at)
                VALUES ($1, $2, $3, $4, NULL, $5, $6, true, NOW())
                "#,
            )
            .bind(parent_id)
            .bind(tenant_id)
            .bind(category.name)
            .bind(format!(
                "System category for {} documents",
                category.name.to_lowercase()
            ))
            .bind(category.color)
            .bind(category.icon)
            .execute(&self.pool)
            .await
            .context("Failed to insert system category")?;

            for subcategory in category.subcategories {
                sqlx::query(
                    r#"
                    INSERT INTO document_categories
                        (id, tenant_id, name, description, parent_category_id,
                         is_system_category, created_at)
                    VALUES ($1, $2, $3, $4, $5, true, NOW())
                    "#,
                )
                .bind(CategoryId::new())
                .bind(tenant_id)
                .bind(subcategory)
                .bind(format!("{} - {}", category.name, subcategory))
                .bind(parent_id)
                .execute(&self.pool)
                .await
                .context("Failed to insert system subcategory")?;
            }
        }

        tracing::info!(
            tenant_id = %tenant_id,
            categories = SYSTEM_CATEGORIES.len(),
            "Initialized system categories"
        );
        Ok(())
    }
}

#[async_trait]
impl CategorizationStore for PgCategorizationStore {
    async fn tenant_categories(&self, tenant_id: TenantId) -> Result<Vec<CategorySummary>> {
        sqlx::query_as::<_, CategorySummary>(
            r#"
            SELECT name, description
            FROM document_categories
            WHERE tenant_id = $1
            ORDER BY is_system_category DESC, name
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load tenant categories")
    }

    async fn get_or_create_category(
        &self,
        tenant_id: TenantId,
        name: &str,
        description: Option<&str>,
        parent_id: Option<CategoryId>,
    ) -> Result<DocumentCategory> {
        let existing = sqlx::query_as::<_, DocumentCategory>(
            r#"
            SELECT * FROM document_categories
            WHERE tenant_id = $1 AND name = $2
              AND parent_category_id IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .bind(parent_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up category")?;

        if let Some(category) = existing {
            return Ok(category);
        }

        let category = sqlx::query_as::<_, DocumentCategory>(
            r#"
            INSERT INTO document_categories
                (id, tenant_id, name, description, parent_category_id,
                 is_system_category, created_at)
            VALUES ($1, $2, $3, $4, $5, false, NOW())
            RETURNING *
            "#,
        )
        .bind(CategoryId::new())
        .bind(tenant_id)
        .bind(name)
        .bind(description)
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create category")?;

        tracing::info!(
            tenant_id = %tenant_id,
            category = %name,
            category_id = %category.id,
            "Created new category"
        );
        Ok(category)
    }

    async fn get_or_create_tag(
        &self,
        tenant_id: TenantId,
        name: &str,
        tag_type: &str,
    ) -> Result<DocumentTag> {
        let existing = sqlx::query_as::<_, DocumentTag>(
            r#"
            UPDATE document_tags
            SET usage_count = usage_count + 1, updated_at = NOW()
            WHERE tenant_id = $1 AND name = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up tag")?;

        if let Some(tag) = existing {
            return Ok(tag);
        }

        let tag = sqlx::query_as::<_, DocumentTag>(
            r#"
            INSERT INTO document_tags (id, tenant_id, name, tag_type, usage_count, created_at)
            VALUES ($1, $2, $3, $4, 1, NOW())
            RETURNING *
            "#,
        )
        .bind(TagId::new())
        .bind(tenant_id)
        .bind(name)
        .bind(tag_type)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create tag")?;

        tracing::info!(tenant_id = %tenant_id, tag = %name, tag_id = %tag.id, "Created new tag");
        Ok(tag)
    }

    async fn save_category_assignment(
        &self,
        document_id: DocumentId,
        category_id: CategoryId,
        confidence: f32,
        assigned_by: AssignedBy,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO document_category_assignments
                (document_id, category_id, confidence_score, assigned_by, assigned_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (document_id, category_id) DO UPDATE
                SET confidence_score = EXCLUDED.confidence_score,
                    assigned_by = EXCLUDED.assigned_by
            "#,
        )
        .bind(document_id)
        .bind(category_id)
        .bind(confidence)
        .bind(assigned_by.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to save category assignment")?;
        Ok(())
    }

    async fn save_tag_assignment(
        &self,
        document_id: DocumentId,
        tag_id: TagId,
        confidence: f32,
        assigned_by: AssignedBy,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO document_tag_assignments
                (document_id, tag_id, confidence_score, assigned_by, assigned_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (document_id, tag_id) DO UPDATE
                SET confidence_score = EXCLUDED.confidence_score,
                    assigned_by = EXCLUDED.assigned_by
            "#,
        )
        .bind(document_id)
        .bind(tag_id)
        .bind(confidence)
        .bind(assigned_by.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to save tag assignment")?;
        Ok(())
    }

    async fn delete_assignments_for_document(&self, document_id: DocumentId) -> Result<()> {
        sqlx::query("DELETE FROM document_category_assignments WHERE document_id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete category assignments")?;
        sqlx::query("DELETE FROM document_tag_assignments WHERE document_id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete tag assignments")?;
        Ok(())
    }
}
