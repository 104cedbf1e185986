//! Usage event payloads.
//!
//! One event per billable resource transition. The subject doubles as
//! the `event_type` field in the JSON body; consumers deduplicate on
//! the `(event_type, tenant_id, resource id, timestamp)` combination,
//! so delivery is at-least-once.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::common::{DocumentId, IngestionId, TenantId};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type")]
pub enum UsageEvent {
    #[serde(rename = "usage.document.added")]
    DocumentAdded {
        tenant_id: TenantId,
        document_id: DocumentId,
        filename: String,
        file_size: i64,
        count: i32,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "usage.document.removed")]
    DocumentRemoved {
        tenant_id: TenantId,
        document_id: DocumentId,
        filename: String,
        count: i32,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "usage.website.added")]
    WebsiteAdded {
        tenant_id: TenantId,
        website_id: IngestionId,
        url: String,
        pages_scraped: i64,
        count: i32,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "usage.website.removed")]
    WebsiteRemoved {
        tenant_id: TenantId,
        website_id: IngestionId,
        url: String,
        count: i32,
        timestamp: DateTime<Utc>,
    },
}

impl UsageEvent {
    pub fn document_added(
        tenant_id: TenantId,
        document_id: DocumentId,
        filename: &str,
        file_size: i64,
    ) -> Self {
        Self::DocumentAdded {
            tenant_id,
            document_id,
            filename: filename.to_string(),
            file_size,
            count: 1,
            timestamp: Utc::now(),
        }
    }

    pub fn document_removed(tenant_id: TenantId, document_id: DocumentId, filename: &str) -> Self {
        Self::DocumentRemoved {
            tenant_id,
            document_id,
            filename: filename.to_string(),
            count: -1,
            timestamp: Utc::now(),
        }
    }

    pub fn website_added(
        tenant_id: TenantId,
        website_id: IngestionId,
        url: &str,
        pages_scraped: i64,
    ) -> Self {
        Self::WebsiteAdded {
            tenant_id,
            website_id,
            url: url.to_string(),
            pages_scraped,
            count: 1,
            timestamp: Utc::now(),
        }
    }

    pub fn website_removed(tenant_id: TenantId, website_id: IngestionId, url: &str) -> Self {
        Self::WebsiteRemoved {
            tenant_id,
            website_id,
            url: url.to_string(),
            count: -1,
            timestamp: Utc::now(),
        }
    }

    /// Routing subject, identical to the serialized `event_type`.
    pub fn subject(&self) -> &'static str {
        match self {
            UsageEvent::DocumentAdded { .. } => "usage.document.added",
            UsageEvent::DocumentRemoved { .. } => "usage.document.removed",
            UsageEvent::WebsiteAdded { .. } => "usage.website.added",
            UsageEvent::WebsiteRemoved { .. } => "usage.website.removed",
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        match self {
            UsageEvent::DocumentAdded { tenant_id, .. }
            | UsageEvent::DocumentRemoved { tenant_id, .. }
            | UsageEvent::WebsiteAdded { tenant_id, .. }
            | UsageEvent::WebsiteRemoved { tenant_id, .. } => *tenant_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_added_event_payload_shape() {
        let tenant = TenantId::new();
        let document = DocumentId::new();
        let event = UsageEvent::document_added(tenant, document, "report.pdf", 2048);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "usage.document.added");
        assert_eq!(value["tenant_id"], tenant.to_string());
        assert_eq!(value["document_id"], document.to_string());
        assert_eq!(value["filename"], "report.pdf");
        assert_eq!(value["file_size"], 2048);
        assert_eq!(value["count"], 1);
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_removed_events_decrement() {
        let event = UsageEvent::website_removed(TenantId::new(), IngestionId::new(), "https://x.example");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["count"], -1);
        assert_eq!(event.subject(), "usage.website.removed");
    }

    #[test]
    fn test_website_added_carries_page_count() {
        let event =
            UsageEvent::website_added(TenantId::new(), IngestionId::new(), "https://x.example", 8);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["pages_scraped"], 8);
        assert_eq!(value["url"], "https://x.example");
    }

    #[test]
    fn test_subject_matches_event_type_field() {
        let event = UsageEvent::document_removed(TenantId::new(), DocumentId::new(), "f.txt");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], event.subject());
    }
}
