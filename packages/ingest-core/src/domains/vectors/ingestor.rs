//! Batched, deduplicated embedding ingestion.
//!
//! Chunks are processed in batches of ten: hashes computed, duplicates
//! skipped against the `(tenant_id, content_hash)` key, one embedding
//! call per batch, rows inserted with source-ordered `chunk_index`.
//! Any failure aborts the whole call; the background runner owns the
//! retry decision.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;

use site_crawler::ContentHash;

use super::store::VectorStore;
use super::types::{IngestChunk, NewChunk};
use crate::common::{ChunkId, DocumentId, IngestionId, TenantId};
use crate::kernel::traits::BaseEmbeddingService;

/// Kept small for embedding-provider rate limits.
const BATCH_SIZE: usize = 10;

pub struct VectorIngestionService {
    store: Arc<dyn VectorStore>,
    embeddings: Arc<dyn BaseEmbeddingService>,
}

impl VectorIngestionService {
    pub fn new(store: Arc<dyn VectorStore>, embeddings: Arc<dyn BaseEmbeddingService>) -> Self {
        Self { store, embeddings }
    }

    /// Ingest chunks for one document or one website ingestion. Returns
    /// the number of rows actually inserted (duplicates are skipped).
    pub async fn ingest(
        &self,
        tenant_id: TenantId,
        chunks: Vec<IngestChunk>,
        document_id: Option<DocumentId>,
        ingestion_id: Option<IngestionId>,
    ) -> Result<usize> {
        if chunks.is_empty() {
            tracing::warn!(tenant_id = %tenant_id, "No chunks provided for ingestion");
            return Ok(0);
        }
        if document_id.is_none() && ingestion_id.is_none() {
            tracing::warn!(tenant_id = %tenant_id, "Chunks have neither document nor ingestion id");
            return Ok(0);
        }

        tracing::info!(
            tenant_id = %tenant_id,
            chunk_count = chunks.len(),
            document_id = ?document_id,
            ingestion_id = ?ingestion_id,
            "Starting vector ingestion"
        );

        let mut seen_hashes: HashSet<String> = HashSet::new();
        let mut total_inserted = 0usize;

        for (batch_number, batch) in chunks.chunks(BATCH_SIZE).enumerate() {
            let mut fresh: Vec<(usize, &IngestChunk, String)> = Vec::new();

            for (offset, chunk) in batch.iter().enumerate() {
                let hash = ContentHash::from_text(&chunk.content).to_hex();

                if !seen_hashes.insert(hash.clone()) {
                    tracing::debug!(tenant_id = %tenant_id, "Skipping duplicate chunk within call");
                    continue;
                }
                if self.store.contains_hash(tenant_id, &hash).await? {
                    tracing::debug!(tenant_id = %tenant_id, "Skipping already-indexed chunk");
                    continue;
                }

                fresh.push((batch_number * BATCH_SIZE + offset, chunk, hash));
            }

            if fresh.is_empty() {
                continue;
            }

            let texts: Vec<String> = fresh.iter().map(|(_, c, _)| c.content.clone()).collect();
            let embeddings = self
                .embeddings
                .embed_batch(&texts)
                .await
                .context("Embedding generation failed")?;

            let rows: Vec<NewChunk> = fresh
                .into_iter()
                .zip(embeddings)
                .map(|((index, chunk, hash), embedding)| NewChunk {
                    id: ChunkId::new(),
                    document_id,
                    ingestion_id,
                    content: chunk.content.clone(),
                    content_hash: hash,
                    chunk_index: index as i32,
                    embedding,
                    metadata: chunk.metadata.clone(),
                })
                .collect();

            self.store.insert_chunks(tenant_id, &rows).await?;
            total_inserted += rows.len();
        }

        self.store
            .record_indexed(tenant_id, total_inserted as i64)
            .await?;

        tracing::info!(
            tenant_id = %tenant_id,
            chunks_inserted = total_inserted,
            "Vector ingestion completed"
        );
        Ok(total_inserted)
    }

    pub async fn delete_document_vectors(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
    ) -> Result<u64> {
        self.store.delete_document_chunks(tenant_id, document_id).await
    }

    pub async fn delete_ingestion_vectors(
        &self,
        tenant_id: TenantId,
        ingestion_id: IngestionId,
    ) -> Result<u64> {
        self.store
            .delete_ingestion_chunks(tenant_id, ingestion_id)
            .await
    }
}
