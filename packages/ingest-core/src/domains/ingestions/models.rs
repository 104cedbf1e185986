use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{IngestionId, PageId, TenantId};
use site_crawler::ScrapingStrategy;

/// Lifecycle of an ingestion. Transitions are monotonic: a terminal
/// state only leaves via an explicit retry reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl IngestionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestionStatus::Completed | IngestionStatus::Failed)
    }

    /// Legal transitions. `Failed` before `InProgress` covers jobs that
    /// abort on missing configuration before any work starts; terminal
    /// states return to `Pending` only through a retry reset.
    pub fn can_transition_to(&self, next: IngestionStatus) -> bool {
        use IngestionStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Failed)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (Completed, Pending)
                | (Failed, Pending)
        )
    }
}

impl std::fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestionStatus::Pending => write!(f, "pending"),
            IngestionStatus::InProgress => write!(f, "in_progress"),
            IngestionStatus::Completed => write!(f, "completed"),
            IngestionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for IngestionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(IngestionStatus::Pending),
            "in_progress" => Ok(IngestionStatus::InProgress),
            "completed" => Ok(IngestionStatus::Completed),
            "failed" => Ok(IngestionStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid ingestion status: {}", s)),
        }
    }
}

/// Lifecycle of a single page within an ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for PageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageStatus::Pending => write!(f, "pending"),
            PageStatus::Processing => write!(f, "processing"),
            PageStatus::Completed => write!(f, "completed"),
            PageStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One crawl attempt over one base URL.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WebsiteIngestion {
    pub id: IngestionId,
    pub tenant_id: TenantId,
    pub base_url: String,
    pub status: String,
    /// Strategy this ingestion ran (or will run) with; preserved so a
    /// retry of a completed ingestion can reuse what worked.
    pub scraping_strategy: Option<String>,
    pub pages_discovered: i32,
    pub pages_processed: i32,
    pub pages_failed: i32,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WebsiteIngestion {
    pub fn status(&self) -> IngestionStatus {
        self.status.parse().unwrap_or(IngestionStatus::Pending)
    }

    pub fn strategy(&self) -> ScrapingStrategy {
        self.scraping_strategy
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn processing_time_seconds(&self) -> Option<i64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }
}

/// One URL visited during an ingestion. `content_hash` is set exactly
/// when the page completed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WebsitePage {
    pub id: PageId,
    pub tenant_id: TenantId,
    pub ingestion_id: IngestionId,
    pub url: String,
    pub title: Option<String>,
    pub content_hash: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
