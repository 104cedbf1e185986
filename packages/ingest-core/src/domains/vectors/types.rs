use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::common::{CategoryId, ChunkId, DocumentId, IngestionId, TagId};

/// Where a chunk's text originally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    Document,
    Website,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Document => write!(f, "document"),
            SourceType::Website => write!(f, "website"),
        }
    }
}

/// Typed chunk metadata with an extension map for fields we do not yet
/// model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_type: SourceType,
    /// Filename for documents, page URL for websites.
    pub source_name: String,
    pub page_number: Option<i32>,
    pub section_title: Option<String>,
    pub category_ids: Vec<CategoryId>,
    pub tag_ids: Vec<TagId>,
    pub content_type: Option<String>,
    pub language: Option<String>,
    pub sentiment: Option<String>,
    /// Upload time for documents, scrape time for pages.
    pub source_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

/// One text window headed for the vector index.
#[derive(Debug, Clone)]
pub struct IngestChunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Fully prepared row: content, hash, embedding, and metadata.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub id: ChunkId,
    pub document_id: Option<DocumentId>,
    pub ingestion_id: Option<IngestionId>,
    pub content: String,
    pub content_hash: String,
    pub chunk_index: i32,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}
