//! The two page fetchers behind one contract.

pub mod browser;
pub mod http;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::FetcherKind;

/// One fetched HTML document, before cleaning.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
}

/// Common contract for the HTTP fetcher and the browser fetcher.
///
/// Implementations must be safe to share across concurrently running
/// ingestion jobs; each job calls `fetch` sequentially.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    fn kind(&self) -> FetcherKind;

    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}
