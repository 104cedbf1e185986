//! Shared in-memory fakes for the integration tests: one `Platform`
//! struct implements every store trait, plus stub fetchers, model
//! provider, embedder, and broker.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use ingest_core::common::{CategoryId, DocumentId, IngestionId, PageId, TagId, TenantId};
use ingest_core::domains::categorization::models::{
    AssignedBy, CategorySummary, DocumentCategory, DocumentTag,
};
use ingest_core::domains::categorization::CategorizationStore;
use ingest_core::domains::documents::{Document, DocumentStore};
use ingest_core::domains::ingestions::{IngestionStatus, IngestionStore, WebsiteIngestion, WebsitePage};
use ingest_core::domains::usage::{BrokerConnection, BrokerConnector};
use ingest_core::domains::vectors::{NewChunk, VectorStore};
use ingest_core::kernel::traits::{BaseAi, BaseEmbeddingService};
use site_crawler::{
    ContentHash, CrawlProgress, CrawlStore, CrawlTarget, FetchError, FetchedPage, FetcherKind,
    PageFetcher, ScrapingStrategy,
};

// ---------------------------------------------------------------------------
// In-memory platform state shared by all store traits
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Platform {
    pub ingestions: Mutex<HashMap<IngestionId, WebsiteIngestion>>,
    pub pages: Mutex<Vec<WebsitePage>>,
    pub documents: Mutex<Vec<Document>>,
    pub categories: Mutex<Vec<DocumentCategory>>,
    pub tags: Mutex<Vec<DocumentTag>>,
    pub category_assignments: Mutex<Vec<(DocumentId, CategoryId, f32, String)>>,
    pub tag_assignments: Mutex<Vec<(DocumentId, TagId, f32, String)>>,
    pub chunks: Mutex<Vec<(TenantId, NewChunk)>>,
    pub stats: Mutex<HashMap<TenantId, i64>>,
    pub events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl Platform {
    pub fn seed_ingestion(&self, tenant_id: TenantId, base_url: &str) -> IngestionId {
        let id = IngestionId::new();
        let ingestion = WebsiteIngestion {
            id,
            tenant_id,
            base_url: base_url.to_string(),
            status: "pending".to_string(),
            scraping_strategy: Some("auto".to_string()),
            pages_discovered: 0,
            pages_processed: 0,
            pages_failed: 0,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        };
        self.ingestions.lock().unwrap().insert(id, ingestion);
        id
    }

    pub fn status_of(&self, id: IngestionId) -> IngestionStatus {
        self.ingestions.lock().unwrap()[&id].status()
    }

    pub fn events_for(&self, subject: &str) -> Vec<serde_json::Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == subject)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

#[async_trait]
impl IngestionStore for Platform {
    async fn create(
        &self,
        tenant_id: TenantId,
        base_url: &str,
        _strategy: ScrapingStrategy,
    ) -> Result<WebsiteIngestion> {
        let id = self.seed_ingestion(tenant_id, base_url);
        Ok(self.ingestions.lock().unwrap()[&id].clone())
    }

    async fn fetch(
        &self,
        tenant_id: TenantId,
        id: IngestionId,
    ) -> Result<Option<WebsiteIngestion>> {
        Ok(self
            .ingestions
            .lock()
            .unwrap()
            .get(&id)
            .filter(|i| i.tenant_id == tenant_id)
            .cloned())
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<WebsiteIngestion>> {
        Ok(self
            .ingestions
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn mark_in_progress(&self, id: IngestionId) -> Result<()> {
        let mut ingestions = self.ingestions.lock().unwrap();
        let ingestion = ingestions.get_mut(&id).expect("ingestion exists");
        anyhow::ensure!(ingestion.status == "pending", "not pending");
        ingestion.status = "in_progress".to_string();
        ingestion.started_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_completed(&self, id: IngestionId) -> Result<()> {
        let mut ingestions = self.ingestions.lock().unwrap();
        let ingestion = ingestions.get_mut(&id).expect("ingestion exists");
        anyhow::ensure!(ingestion.status == "in_progress", "not in progress");
        ingestion.status = "completed".to_string();
        ingestion.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_failed(&self, id: IngestionId, error: &str) -> Result<()> {
        let mut ingestions = self.ingestions.lock().unwrap();
        if let Some(ingestion) = ingestions.get_mut(&id) {
            if ingestion.status == "pending" || ingestion.status == "in_progress" {
                ingestion.status = "failed".to_string();
                ingestion.error_message = Some(error.to_string());
                ingestion.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn reset_for_retry(&self, id: IngestionId, strategy: ScrapingStrategy) -> Result<()> {
        let mut ingestions = self.ingestions.lock().unwrap();
        let ingestion = ingestions.get_mut(&id).expect("ingestion exists");
        ingestion.status = "pending".to_string();
        ingestion.scraping_strategy = Some(strategy.to_string());
        ingestion.pages_discovered = 0;
        ingestion.pages_processed = 0;
        ingestion.pages_failed = 0;
        ingestion.error_message = None;
        self.pages.lock().unwrap().retain(|p| p.ingestion_id != id);
        Ok(())
    }

    async fn delete(&self, tenant_id: TenantId, id: IngestionId) -> Result<bool> {
        self.pages.lock().unwrap().retain(|p| p.ingestion_id != id);
        Ok(self
            .ingestions
            .lock()
            .unwrap()
            .remove(&id)
            .filter(|i| i.tenant_id == tenant_id)
            .is_some())
    }

    async fn list_pages(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<WebsitePage>, i64)> {
        let pages: Vec<WebsitePage> = self
            .pages
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.ingestion_id == ingestion_id)
            .cloned()
            .collect();
        let total = pages.len() as i64;
        let paged = pages
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((paged, total))
    }

    async fn page_status_counts(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> Result<Vec<(String, i64)>> {
        let mut counts: HashMap<String, i64> = HashMap::new();
        for page in self.pages.lock().unwrap().iter() {
            if page.tenant_id == tenant_id && page.ingestion_id == ingestion_id {
                *counts.entry(page.status.clone()).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }

    async fn hashed_page_count(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> Result<i64> {
        Ok(self
            .pages
            .lock()
            .unwrap()
            .iter()
            .filter(|p| {
                p.tenant_id == tenant_id
                    && p.ingestion_id == ingestion_id
                    && p.content_hash.is_some()
            })
            .count() as i64)
    }
}

#[async_trait]
impl CrawlStore for Platform {
    async fn create_page(&self, target: &CrawlTarget, url: &str) -> Result<Uuid> {
        let id = PageId::new();
        self.pages.lock().unwrap().push(WebsitePage {
            id,
            tenant_id: TenantId::from_uuid(target.tenant_id),
            ingestion_id: IngestionId::from_uuid(target.ingestion_id),
            url: url.to_string(),
            title: None,
            content_hash: None,
            status: "processing".to_string(),
            error_message: None,
            scraped_at: None,
            created_at: Utc::now(),
        });
        Ok(id.into_uuid())
    }

    async fn complete_page(
        &self,
        page_id: Uuid,
        title: Option<&str>,
        content_hash: &ContentHash,
    ) -> Result<()> {
        let mut pages = self.pages.lock().unwrap();
        let page = pages
            .iter_mut()
            .find(|p| p.id.into_uuid() == page_id)
            .expect("page exists");
        page.status = "completed".to_string();
        page.title = title.map(str::to_string);
        page.content_hash = Some(content_hash.to_hex());
        page.scraped_at = Some(Utc::now());
        Ok(())
    }

    async fn fail_page(&self, page_id: Uuid, error: &str) -> Result<()> {
        let mut pages = self.pages.lock().unwrap();
        let page = pages
            .iter_mut()
            .find(|p| p.id.into_uuid() == page_id)
            .expect("page exists");
        page.status = "failed".to_string();
        page.error_message = Some(error.to_string());
        Ok(())
    }

    async fn checkpoint(&self, target: &CrawlTarget, progress: &CrawlProgress) -> Result<()> {
        let mut ingestions = self.ingestions.lock().unwrap();
        let ingestion = ingestions
            .get_mut(&IngestionId::from_uuid(target.ingestion_id))
            .expect("ingestion exists");
        ingestion.pages_discovered = progress.pages_discovered;
        ingestion.pages_processed = progress.pages_processed;
        ingestion.pages_failed = progress.pages_failed;
        Ok(())
    }
}

#[async_trait]
impl CategorizationStore for Platform {
    async fn tenant_categories(&self, tenant_id: TenantId) -> Result<Vec<CategorySummary>> {
        Ok(self
            .categories
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .map(|c| CategorySummary {
                name: c.name.clone(),
                description: c.description.clone(),
            })
            .collect())
    }

    async fn get_or_create_category(
        &self,
        tenant_id: TenantId,
        name: &str,
        description: Option<&str>,
        parent_id: Option<CategoryId>,
    ) -> Result<DocumentCategory> {
        let mut categories = self.categories.lock().unwrap();
        if let Some(existing) = categories
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.name == name)
        {
            return Ok(existing.clone());
        }
        let category = DocumentCategory {
            id: CategoryId::new(),
            tenant_id,
            name: name.to_string(),
            description: description.map(str::to_string),
            parent_category_id: parent_id,
            color: None,
            icon: None,
            is_system_category: false,
            created_at: Utc::now(),
            updated_at: None,
        };
        categories.push(category.clone());
        Ok(category)
    }

    async fn get_or_create_tag(
        &self,
        tenant_id: TenantId,
        name: &str,
        tag_type: &str,
    ) -> Result<DocumentTag> {
        let mut tags = self.tags.lock().unwrap();
        if let Some(existing) = tags
            .iter_mut()
            .find(|t| t.tenant_id == tenant_id && t.name == name)
        {
            existing.usage_count += 1;
            return Ok(existing.clone());
        }
        let tag = DocumentTag {
            id: TagId::new(),
            tenant_id,
            name: name.to_string(),
            tag_type: tag_type.to_string(),
            usage_count: 1,
            created_at: Utc::now(),
            updated_at: None,
        };
        tags.push(tag.clone());
        Ok(tag)
    }

    async fn save_category_assignment(
        &self,
        document_id: DocumentId,
        category_id: CategoryId,
        confidence: f32,
        assigned_by: AssignedBy,
    ) -> Result<()> {
        self.category_assignments.lock().unwrap().push((
            document_id,
            category_id,
            confidence,
            assigned_by.to_string(),
        ));
        Ok(())
    }

    async fn save_tag_assignment(
        &self,
        document_id: DocumentId,
        tag_id: TagId,
        confidence: f32,
        assigned_by: AssignedBy,
    ) -> Result<()> {
        self.tag_assignments.lock().unwrap().push((
            document_id,
            tag_id,
            confidence,
            assigned_by.to_string(),
        ));
        Ok(())
    }

    async fn delete_assignments_for_document(&self, document_id: DocumentId) -> Result<()> {
        self.category_assignments
            .lock()
            .unwrap()
            .retain(|(d, ..)| *d != document_id);
        self.tag_assignments
            .lock()
            .unwrap()
            .retain(|(d, ..)| *d != document_id);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for Platform {
    async fn create(
        &self,
        tenant_id: TenantId,
        filename: &str,
        mime_type: &str,
        file_size: i64,
    ) -> Result<Document> {
        let document = Document {
            id: DocumentId::new(),
            tenant_id,
            filename: filename.to_string(),
            original_filename: filename.to_string(),
            storage_path: String::new(),
            file_size: Some(file_size),
            mime_type: Some(mime_type.to_string()),
            status: "processing".to_string(),
            error_message: None,
            created_at: Utc::now(),
            processed_at: None,
        };
        self.documents.lock().unwrap().push(document.clone());
        Ok(document)
    }

    async fn set_storage_path(&self, id: DocumentId, storage_path: &str) -> Result<()> {
        let mut documents = self.documents.lock().unwrap();
        let document = documents.iter_mut().find(|d| d.id == id).expect("document");
        document.storage_path = storage_path.to_string();
        Ok(())
    }

    async fn mark_completed(&self, id: DocumentId) -> Result<()> {
        let mut documents = self.documents.lock().unwrap();
        let document = documents.iter_mut().find(|d| d.id == id).expect("document");
        document.status = "completed".to_string();
        document.processed_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_failed(&self, id: DocumentId, error: &str) -> Result<()> {
        let mut documents = self.documents.lock().unwrap();
        let document = documents.iter_mut().find(|d| d.id == id).expect("document");
        document.status = "failed".to_string();
        document.error_message = Some(error.to_string());
        Ok(())
    }

    async fn fetch(&self, tenant_id: TenantId, id: DocumentId) -> Result<Option<Document>> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.tenant_id == tenant_id && d.id == id)
            .cloned())
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, tenant_id: TenantId, id: DocumentId) -> Result<bool> {
        let mut documents = self.documents.lock().unwrap();
        let before = documents.len();
        documents.retain(|d| !(d.tenant_id == tenant_id && d.id == id));
        Ok(documents.len() < before)
    }
}

#[async_trait]
impl VectorStore for Platform {
    async fn contains_hash(&self, tenant_id: TenantId, content_hash: &str) -> Result<bool> {
        Ok(self
            .chunks
            .lock()
            .unwrap()
            .iter()
            .any(|(t, c)| *t == tenant_id && c.content_hash == content_hash))
    }

    async fn insert_chunks(&self, tenant_id: TenantId, chunks: &[NewChunk]) -> Result<()> {
        let mut rows = self.chunks.lock().unwrap();
        for chunk in chunks {
            rows.push((tenant_id, chunk.clone()));
        }
        Ok(())
    }

    async fn record_indexed(&self, tenant_id: TenantId, added: i64) -> Result<()> {
        *self.stats.lock().unwrap().entry(tenant_id).or_default() += added;
        Ok(())
    }

    async fn delete_document_chunks(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
    ) -> Result<u64> {
        let mut rows = self.chunks.lock().unwrap();
        let before = rows.len();
        rows.retain(|(t, c)| !(*t == tenant_id && c.document_id == Some(document_id)));
        Ok((before - rows.len()) as u64)
    }

    async fn delete_ingestion_chunks(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> Result<u64> {
        let mut rows = self.chunks.lock().unwrap();
        let before = rows.len();
        rows.retain(|(t, c)| !(*t == tenant_id && c.ingestion_id == Some(ingestion_id)));
        Ok((before - rows.len()) as u64)
    }

    async fn delete_tenant_chunks(&self, tenant_id: TenantId) -> Result<u64> {
        let mut rows = self.chunks.lock().unwrap();
        let before = rows.len();
        rows.retain(|(t, _)| *t != tenant_id);
        Ok((before - rows.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// External collaborators
// ---------------------------------------------------------------------------

pub fn page_html(text: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|l| format!("<a href=\"{l}\">link</a>"))
        .collect();
    format!(
        "<html><head><title>Example</title></head><body><main><p>{}</p>{}</main></body></html>",
        text.repeat(25),
        anchors
    )
}

/// Serves a three-page static site; every other URL is a 404.
pub struct StaticSite;

#[async_trait]
impl PageFetcher for StaticSite {
    fn kind(&self) -> FetcherKind {
        FetcherKind::Http
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let html = match url {
            "https://example.com/" => {
                page_html("welcome to our legal consulting practice ", &["/services", "/about"])
            }
            "https://example.com/services" => {
                page_html("contract review and compliance services ", &[])
            }
            "https://example.com/about" => page_html("about our team of legal experts ", &[]),
            _ => return Err(FetchError::Status(404)),
        };
        Ok(FetchedPage {
            html,
            final_url: url.to_string(),
            status: 200,
            content_type: Some("text/html".to_string()),
        })
    }
}

/// Refuses every fetch; used for the zero-pages path.
pub struct DeadSite;

#[async_trait]
impl PageFetcher for DeadSite {
    fn kind(&self) -> FetcherKind {
        FetcherKind::Http
    }

    async fn fetch(&self, _url: &str) -> Result<FetchedPage, FetchError> {
        Err(FetchError::Network("connection refused".to_string()))
    }
}

/// Fixed classification and entity responses.
pub struct StubAi;

#[async_trait]
impl BaseAi for StubAi {
    async fn complete_json(&self, _system: &str, user: &str) -> Result<String> {
        if user.contains("entities") {
            Ok(serde_json::json!({"entities": ["Example Corp"]}).to_string())
        } else {
            Ok(serde_json::json!({
                "primary_category": "Legal",
                "categories": [{"name": "Legal", "confidence": 0.9}],
                "tags": [{"name": "legal-services", "confidence": 0.8}],
                "content_type": "report",
                "language": "en",
                "sentiment": "neutral",
                "summary": "legal services site"
            })
            .to_string())
        }
    }
}

pub struct StubEmbedder;

#[async_trait]
impl BaseEmbeddingService for StubEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.0; 8]).collect())
    }
}

/// Always-healthy broker that records events on the platform.
pub struct MemoryBroker {
    pub platform: Arc<Platform>,
}

pub struct MemoryBrokerConnection {
    platform: Arc<Platform>,
}

#[async_trait]
impl BrokerConnection for MemoryBrokerConnection {
    fn is_open(&self) -> bool {
        true
    }

    async fn probe(&self) -> Result<()> {
        Ok(())
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<()> {
        let value: serde_json::Value = serde_json::from_slice(&payload)?;
        self.platform
            .events
            .lock()
            .unwrap()
            .push((subject.to_string(), value));
        Ok(())
    }
}

#[async_trait]
impl BrokerConnector for MemoryBroker {
    async fn connect(&self) -> Result<Box<dyn BrokerConnection>> {
        Ok(Box::new(MemoryBrokerConnection {
            platform: self.platform.clone(),
        }))
    }
}
