use thiserror::Error;

/// Why a single page could not be turned into cleaned text.
///
/// Every variant is a per-page failure: the crawl records the page as
/// failed and moves on, it never aborts the whole ingestion.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("not an HTML document: {0}")]
    NotHtml(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("insufficient content ({0} characters after cleaning)")]
    InsufficientContent(usize),
}

impl FetchError {
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout_secs)
        } else {
            FetchError::Network(err.to_string())
        }
    }
}
