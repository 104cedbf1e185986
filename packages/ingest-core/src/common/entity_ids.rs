//! Typed id aliases for the domain entities.

pub use super::id::Id;

/// Marker for tenants. The platform never owns tenant state; the id is
/// carried on every row for isolation.
pub struct Tenant;

/// Marker for website ingestions (one crawl attempt over one base URL).
pub struct Ingestion;

/// Marker for pages visited during an ingestion.
pub struct Page;

/// Marker for uploaded documents.
pub struct Document;

/// Marker for document categories.
pub struct Category;

/// Marker for document tags.
pub struct TagEntity;

/// Marker for vector chunks.
pub struct Chunk;

pub type TenantId = Id<Tenant>;
pub type IngestionId = Id<Ingestion>;
pub type PageId = Id<Page>;
pub type DocumentId = Id<Document>;
pub type CategoryId = Id<Category>;
pub type TagId = Id<TagEntity>;
pub type ChunkId = Id<Chunk>;
