//! The document upload pipeline.
//!
//! Store the blob, extract text, chunk, classify once per document on a
//! representative preview, persist assignments, embed, and announce the
//! new document to billing. Any step failing flips the row to `failed`
//! with the error message; the blob (if already stored) is kept for a
//! later retry.

use anyhow::Context;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;
use typed_builder::TypedBuilder;

use site_crawler::TextChunker;

use super::extract::extract_text;
use super::models::Document;
use super::store::DocumentStore;
use crate::common::{CategoryId, DocumentId, TagId, TenantId};
use crate::domains::billing::{BillingClient, UsageType};
use crate::domains::categorization::models::AssignedBy;
use crate::domains::categorization::{CategorizationStore, DocumentClassification, HybridClassifier};
use crate::domains::error::{ServiceError, ServiceResult};
use crate::domains::usage::UsagePublisher;
use crate::domains::vectors::{ChunkMetadata, IngestChunk, SourceType, VectorIngestionService};
use crate::kernel::object_store::DocumentStorage;

/// Documents are previewed at 4000 characters for classification.
const DOCUMENT_PREVIEW_CHARS: usize = 4000;

/// How many leading chunks feed the classification preview.
const PREVIEW_CHUNKS: usize = 3;

/// One upload request.
#[derive(TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct UploadDocument {
    pub data: Bytes,
    pub filename: String,
    pub content_type: String,
    #[builder(default)]
    pub user_categories: Vec<String>,
    #[builder(default)]
    pub user_tags: Vec<String>,
    #[builder(default = true)]
    pub auto_categorize: bool,
}

pub struct DocumentProcessor {
    documents: Arc<dyn DocumentStore>,
    categorization: Arc<dyn CategorizationStore>,
    classifier: Arc<HybridClassifier>,
    vectors: Arc<VectorIngestionService>,
    storage: Arc<DocumentStorage>,
    publisher: Arc<UsagePublisher>,
    billing: Arc<BillingClient>,
    chunker: TextChunker,
}

/// What the upload endpoint returns to the caller.
#[derive(Debug)]
pub struct ProcessedDocument {
    pub document: Document,
    pub chunks_created: usize,
    pub classification: Option<DocumentClassification>,
}

impl DocumentProcessor {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        categorization: Arc<dyn CategorizationStore>,
        classifier: Arc<HybridClassifier>,
        vectors: Arc<VectorIngestionService>,
        storage: Arc<DocumentStorage>,
        publisher: Arc<UsagePublisher>,
        billing: Arc<BillingClient>,
    ) -> Self {
        Self {
            documents,
            categorization,
            classifier,
            vectors,
            storage,
            publisher,
            billing,
            chunker: TextChunker::default(),
        }
    }

    /// Upload and process a document. The limit gate runs before any
    /// row or blob exists; a denied upload leaves no trace.
    pub async fn upload(
        &self,
        tenant_id: TenantId,
        access_token: &str,
        upload: UploadDocument,
    ) -> ServiceResult<ProcessedDocument> {
        let limit_check = self
            .billing
            .check_usage_limit(access_token, UsageType::Documents)
            .await?;
        if !limit_check.allowed {
            return Err(ServiceError::LimitExceeded(
                limit_check
                    .reason
                    .unwrap_or_else(|| "Document limit reached".to_string()),
            ));
        }

        self.process_upload(tenant_id, upload).await
    }

    async fn process_upload(
        &self,
        tenant_id: TenantId,
        upload: UploadDocument,
    ) -> ServiceResult<ProcessedDocument> {
        tracing::info!(
            tenant_id = %tenant_id,
            filename = %upload.filename,
            content_type = %upload.content_type,
            size = upload.data.len(),
            auto_categorize = upload.auto_categorize,
            "Starting document processing"
        );

        let document = self
            .documents
            .create(
                tenant_id,
                &upload.filename,
                &upload.content_type,
                upload.data.len() as i64,
            )
            .await?;

        match self.run_pipeline(tenant_id, &document, &upload).await {
            Ok(mut outcome) => {
                self.documents.mark_completed(document.id).await?;
                // Return the row as it now stands, not the creation-time copy.
                if let Some(fresh) = self.documents.fetch(tenant_id, document.id).await? {
                    outcome.document = fresh;
                }
                tracing::info!(
                    tenant_id = %tenant_id,
                    document_id = %document.id,
                    chunks_created = outcome.chunks_created,
                    "Document processing completed"
                );
                Ok(outcome)
            }
            Err(err) => {
                if let Err(update_err) = self
                    .documents
                    .mark_failed(document.id, &err.to_string())
                    .await
                {
                    tracing::error!(
                        document_id = %document.id,
                        error = %update_err,
                        "Failed to record document failure"
                    );
                }
                Err(err)
            }
        }
    }

    async fn run_pipeline(
        &self,
        tenant_id: TenantId,
        document: &Document,
        upload: &UploadDocument,
    ) -> ServiceResult<ProcessedDocument> {
        let storage_path = self
            .storage
            .upload_document(tenant_id, &upload.filename, upload.data.clone())
            .await?;
        self.documents
            .set_storage_path(document.id, &storage_path)
            .await?;

        let text = extract_text(&upload.data, &upload.filename, &upload.content_type)?;
        let chunks = self.chunker.split(&text);
        if chunks.is_empty() {
            return Err(ServiceError::Validation(
                "Document contains no extractable text".to_string(),
            ));
        }

        // Classify once on a representative preview, not per chunk.
        let preview: String = chunks
            .iter()
            .take(PREVIEW_CHUNKS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(DOCUMENT_PREVIEW_CHARS)
            .collect();

        let classification = self
            .classifier
            .classify(
                &preview,
                tenant_id,
                upload.auto_categorize,
                DOCUMENT_PREVIEW_CHARS,
            )
            .await;

        let mut category_ids = self
            .persist_ai_categories(tenant_id, document, &classification)
            .await;
        let mut tag_ids = self
            .persist_ai_tags(tenant_id, document, &classification)
            .await;

        let (user_category_ids, user_tag_ids) = self
            .persist_user_labels(tenant_id, document, &upload.user_categories, &upload.user_tags)
            .await?;
        category_ids.extend(user_category_ids);
        tag_ids.extend(user_tag_ids);

        let category_ids: Vec<CategoryId> = dedupe(category_ids);
        let tag_ids: Vec<TagId> = dedupe(tag_ids);

        let metadata = ChunkMetadata {
            source_type: SourceType::Document,
            source_name: upload.filename.clone(),
            category_ids,
            tag_ids,
            content_type: Some(classification.content_type.clone()),
            language: Some(classification.language.clone()),
            sentiment: Some(classification.sentiment.clone()),
            source_date: Some(document.created_at),
            ..Default::default()
        };

        let ingest_chunks: Vec<IngestChunk> = chunks
            .into_iter()
            .map(|content| IngestChunk {
                content,
                metadata: metadata.clone(),
            })
            .collect();

        let chunks_created = self
            .vectors
            .ingest(tenant_id, ingest_chunks, Some(document.id), None)
            .await?;

        // Fire-and-forget: a lost usage event must not fail the upload.
        if !self
            .publisher
            .publish_document_added(
                tenant_id,
                document.id,
                &upload.filename,
                document.file_size.unwrap_or(0),
            )
            .await
        {
            tracing::error!(
                tenant_id = %tenant_id,
                document_id = %document.id,
                "Failed to publish document usage event"
            );
        }

        Ok(ProcessedDocument {
            document: document.clone(),
            chunks_created,
            classification: Some(classification),
        })
    }

    async fn persist_ai_categories(
        &self,
        tenant_id: TenantId,
        document: &Document,
        classification: &DocumentClassification,
    ) -> Vec<CategoryId> {
        let mut ids = Vec::new();
        for category in &classification.categories {
            let result = async {
                let row = self
                    .categorization
                    .get_or_create_category(tenant_id, &category.name, None, None)
                    .await?;
                self.categorization
                    .save_category_assignment(
                        document.id,
                        row.id,
                        category.confidence,
                        AssignedBy::Ai,
                    )
                    .await?;
                anyhow::Ok(row.id)
            }
            .await;

            match result {
                Ok(id) => ids.push(id),
                Err(err) => {
                    tracing::warn!(category = %category.name, error = %err, "Failed to persist category");
                }
            }
        }
        ids
    }

    async fn persist_ai_tags(
        &self,
        tenant_id: TenantId,
        document: &Document,
        classification: &DocumentClassification,
    ) -> Vec<TagId> {
        let mut ids = Vec::new();
        for tag in &classification.tags {
            let result = async {
                let row = self
                    .categorization
                    .get_or_create_tag(tenant_id, &tag.name, "auto")
                    .await?;
                self.categorization
                    .save_tag_assignment(document.id, row.id, tag.confidence, AssignedBy::Ai)
                    .await?;
                anyhow::Ok(row.id)
            }
            .await;

            match result {
                Ok(id) => ids.push(id),
                Err(err) => {
                    tracing::warn!(tag = %tag.name, error = %err, "Failed to persist tag");
                }
            }
        }
        ids
    }

    /// User-supplied labels are recorded at full confidence.
    async fn persist_user_labels(
        &self,
        tenant_id: TenantId,
        document: &Document,
        user_categories: &[String],
        user_tags: &[String],
    ) -> ServiceResult<(Vec<CategoryId>, Vec<TagId>)> {
        let mut category_ids = Vec::new();
        for name in user_categories {
            let row = self
                .categorization
                .get_or_create_category(tenant_id, name, None, None)
                .await
                .context("Failed to create user category")?;
            self.categorization
                .save_category_assignment(document.id, row.id, 1.0, AssignedBy::User)
                .await
                .context("Failed to save user category assignment")?;
            category_ids.push(row.id);
        }

        let mut tag_ids = Vec::new();
        for name in user_tags {
            let row = self
                .categorization
                .get_or_create_tag(tenant_id, name, "custom")
                .await
                .context("Failed to create user tag")?;
            self.categorization
                .save_tag_assignment(document.id, row.id, 1.0, AssignedBy::User)
                .await
                .context("Failed to save user tag assignment")?;
            tag_ids.push(row.id);
        }

        Ok((category_ids, tag_ids))
    }

    /// Remove a document everywhere: blob, vector rows, assignments,
    /// and finally the row itself, then announce the removal.
    pub async fn delete_document(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
    ) -> ServiceResult<()> {
        let document = self
            .documents
            .fetch(tenant_id, document_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(
                    "Document not found or does not belong to this tenant".to_string(),
                )
            })?;

        if !document.storage_path.is_empty() {
            if let Err(err) = self.storage.delete(&document.storage_path).await {
                tracing::warn!(
                    document_id = %document_id,
                    storage_path = %document.storage_path,
                    error = %err,
                    "Failed to delete document blob"
                );
            }
        }

        self.vectors
            .delete_document_vectors(tenant_id, document_id)
            .await?;
        self.categorization
            .delete_assignments_for_document(document_id)
            .await?;
        self.documents.delete(tenant_id, document_id).await?;

        if !self
            .publisher
            .publish_document_removed(tenant_id, document_id, &document.original_filename)
            .await
        {
            tracing::error!(
                tenant_id = %tenant_id,
                document_id = %document_id,
                "Failed to publish document removal usage event"
            );
        }

        Ok(())
    }

    pub async fn list_documents(&self, tenant_id: TenantId) -> ServiceResult<Vec<Document>> {
        Ok(self.documents.list(tenant_id).await?)
    }
}

fn dedupe<T: std::hash::Hash + Eq + Copy>(ids: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
