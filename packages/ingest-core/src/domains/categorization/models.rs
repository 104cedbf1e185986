use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{CategoryId, DocumentId, TagId, TenantId};

/// Hierarchical category for organizing documents. Unique per
/// `(tenant_id, name, parent_category_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DocumentCategory {
    pub id: CategoryId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub parent_category_id: Option<CategoryId>,
    pub color: Option<String>,
    pub icon: Option<String>,
    /// Pre-seeded categories are immutable from the tenant's point of view.
    pub is_system_category: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Flat tag, unique per `(tenant_id, name)`. `usage_count` tracks how
/// many times classification or users attached it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DocumentTag {
    pub id: TagId,
    pub tenant_id: TenantId,
    pub name: String,
    /// 'auto', 'custom', or 'system'.
    pub tag_type: String,
    pub usage_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Who attached a category or tag to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignedBy {
    User,
    Ai,
    Rule,
}

impl std::fmt::Display for AssignedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignedBy::User => write!(f, "user"),
            AssignedBy::Ai => write!(f, "ai"),
            AssignedBy::Rule => write!(f, "rule"),
        }
    }
}

/// Many-to-many link between a document and a category.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryAssignment {
    pub document_id: DocumentId,
    pub category_id: CategoryId,
    pub confidence_score: f32,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
}

/// Many-to-many link between a document and a tag.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TagAssignment {
    pub document_id: DocumentId,
    pub tag_id: TagId,
    pub confidence_score: f32,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
}

/// Name/description pair fed into the classifier prompt.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategorySummary {
    pub name: String,
    pub description: Option<String>,
}
