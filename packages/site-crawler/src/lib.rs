//! Site crawler for the content ingestion platform.
//!
//! Performs bounded breadth-first crawls over a single base URL, choosing
//! per page between a plain HTTP fetcher and a headless browser fetcher,
//! and learning per-domain which of the two actually yields content.
//!
//! Persistence is abstracted behind [`CrawlStore`] so the crawler itself
//! carries no database dependency.

pub mod chunker;
pub mod cleaner;
pub mod config;
pub mod crawler;
pub mod error;
pub mod fetch;
pub mod links;
pub mod strategy;
pub mod types;

pub use chunker::TextChunker;
pub use cleaner::clean_html;
pub use config::CrawlerConfig;
pub use crawler::{CrawlOrchestrator, CrawlOutcome, CrawlProgress, CrawlStore, CrawlTarget};
pub use error::FetchError;
pub use fetch::{browser::BrowserFetcher, http::HttpFetcher, FetchedPage, PageFetcher};
pub use strategy::{DomainPreferences, ScrapeSuccess, StrategySelector, MIN_CONTENT_CHARS};
pub use types::{CleanedContent, ContentHash, FetcherKind, ScrapedPage, ScrapingStrategy};
