use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 hash of cleaned page text, used for chunk deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub Vec<u8>);

impl ContentHash {
    pub fn from_text(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self(hasher.finalize().to_vec())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(s).map(Self)
    }
}

/// Which fetcher implementation produced (or should produce) a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetcherKind {
    Http,
    Browser,
}

impl std::fmt::Display for FetcherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetcherKind::Http => write!(f, "http"),
            FetcherKind::Browser => write!(f, "browser"),
        }
    }
}

impl FetcherKind {
    /// The other fetcher, for fallback decisions.
    pub fn other(self) -> Self {
        match self {
            FetcherKind::Http => FetcherKind::Browser,
            FetcherKind::Browser => FetcherKind::Http,
        }
    }
}

/// Policy for choosing between the HTTP fetcher and the browser fetcher.
///
/// `Auto` learns a per-domain preference during the crawl; the other
/// variants pin the decision for the whole ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScrapingStrategy {
    #[default]
    Auto,
    HttpFirst,
    BrowserOnly,
    HttpOnly,
}

impl std::fmt::Display for ScrapingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrapingStrategy::Auto => write!(f, "auto"),
            ScrapingStrategy::HttpFirst => write!(f, "http_first"),
            ScrapingStrategy::BrowserOnly => write!(f, "browser_only"),
            ScrapingStrategy::HttpOnly => write!(f, "http_only"),
        }
    }
}

impl std::str::FromStr for ScrapingStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ScrapingStrategy::Auto),
            "http_first" => Ok(ScrapingStrategy::HttpFirst),
            "browser_only" => Ok(ScrapingStrategy::BrowserOnly),
            "http_only" => Ok(ScrapingStrategy::HttpOnly),
            _ => Err(anyhow::anyhow!("Invalid scraping strategy: {}", s)),
        }
    }
}

/// Title + cleaned visible text extracted from one HTML document.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedContent {
    pub title: Option<String>,
    pub text: String,
    pub hash: ContentHash,
}

/// One successfully scraped page, chunked and ready for classification
/// and vector ingestion.
#[derive(Debug, Clone)]
pub struct ScrapedPage {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
    pub content_hash: ContentHash,
    /// Overlapping windows of `text`, in source order.
    pub chunks: Vec<String>,
    /// 1-based position of this page within the crawl.
    pub page_number: u32,
    pub fetched_via: FetcherKind,
    pub scraped_at: DateTime<Utc>,
}
