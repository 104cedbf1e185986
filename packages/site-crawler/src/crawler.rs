//! Bounded breadth-first crawl over one base URL.
//!
//! The orchestrator owns the traversal state (visited set, queue,
//! counters) and reports per-page results and periodic progress through
//! the [`CrawlStore`] trait, so callers decide how rows are persisted.
//! It never sets the ingestion's terminal status; that is the background
//! runner's job after classification and vector ingestion finish.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use url::Url;
use uuid::Uuid;

use crate::chunker::TextChunker;
use crate::config::CrawlerConfig;
use crate::strategy::StrategySelector;
use crate::types::{ContentHash, ScrapedPage};

/// Progress is checkpointed to the store every this many finished pages,
/// which is what the polling UI reads.
const CHECKPOINT_EVERY: usize = 5;

/// Identifies the ingestion a crawl belongs to.
#[derive(Debug, Clone)]
pub struct CrawlTarget {
    pub tenant_id: Uuid,
    pub ingestion_id: Uuid,
    pub base_url: String,
}

/// Counters mirrored onto the ingestion row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlProgress {
    pub pages_discovered: i32,
    pub pages_processed: i32,
    pub pages_failed: i32,
}

/// Persistence seam for per-page records and progress checkpoints.
#[async_trait]
pub trait CrawlStore: Send + Sync {
    /// Record a page in `processing` state; returns the page row id.
    async fn create_page(&self, target: &CrawlTarget, url: &str) -> Result<Uuid>;

    async fn complete_page(
        &self,
        page_id: Uuid,
        title: Option<&str>,
        content_hash: &ContentHash,
    ) -> Result<()>;

    async fn fail_page(&self, page_id: Uuid, error: &str) -> Result<()>;

    async fn checkpoint(&self, target: &CrawlTarget, progress: &CrawlProgress) -> Result<()>;
}

#[async_trait]
impl<T: CrawlStore + ?Sized> CrawlStore for std::sync::Arc<T> {
    async fn create_page(&self, target: &CrawlTarget, url: &str) -> Result<Uuid> {
        self.as_ref().create_page(target, url).await
    }

    async fn complete_page(
        &self,
        page_id: Uuid,
        title: Option<&str>,
        content_hash: &ContentHash,
    ) -> Result<()> {
        self.as_ref().complete_page(page_id, title, content_hash).await
    }

    async fn fail_page(&self, page_id: Uuid, error: &str) -> Result<()> {
        self.as_ref().fail_page(page_id, error).await
    }

    async fn checkpoint(&self, target: &CrawlTarget, progress: &CrawlProgress) -> Result<()> {
        self.as_ref().checkpoint(target, progress).await
    }
}

/// Everything a finished crawl hands back to the background runner.
#[derive(Debug)]
pub struct CrawlOutcome {
    pub pages: Vec<ScrapedPage>,
    pub progress: CrawlProgress,
}

pub struct CrawlOrchestrator<S: CrawlStore> {
    selector: StrategySelector,
    chunker: TextChunker,
    store: S,
    max_pages: usize,
    delay: std::time::Duration,
}

impl<S: CrawlStore> CrawlOrchestrator<S> {
    pub fn new(selector: StrategySelector, store: S, config: &CrawlerConfig) -> Self {
        Self {
            selector,
            chunker: TextChunker::default(),
            store,
            max_pages: config.max_pages_per_site,
            delay: config.scraping_delay,
        }
    }

    /// Crawl the target site breadth-first up to the page cap.
    ///
    /// Individual page failures are recorded and skipped; only store
    /// errors (and an unparseable base URL) abort the crawl.
    pub async fn run(&mut self, target: &CrawlTarget) -> Result<CrawlOutcome> {
        let base = Url::parse(&target.base_url)
            .with_context(|| format!("Invalid base URL: {}", target.base_url))?;
        let base_domain = base
            .host_str()
            .context("Base URL has no host")?
            .to_string();

        tracing::info!(
            tenant_id = %target.tenant_id,
            ingestion_id = %target.ingestion_id,
            base_url = %target.base_url,
            strategy = %self.selector.strategy(),
            max_pages = self.max_pages,
            "Starting crawl"
        );

        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        seen.insert(target.base_url.clone());
        queue.push_back(target.base_url.clone());

        let mut pages: Vec<ScrapedPage> = Vec::new();
        let mut progress = CrawlProgress {
            pages_discovered: 1,
            ..Default::default()
        };
        let mut page_number: u32 = 0;

        while let Some(url) = queue.pop_front() {
            let attempted = (progress.pages_processed + progress.pages_failed) as usize;
            if attempted >= self.max_pages {
                tracing::info!(max_pages = self.max_pages, "Page cap reached, stopping crawl");
                break;
            }

            let page_id = self.store.create_page(target, &url).await?;

            match self.selector.scrape_page(&url, &base_domain).await {
                Ok(success) => {
                    page_number += 1;
                    self.store
                        .complete_page(page_id, success.content.title.as_deref(), &success.content.hash)
                        .await?;
                    progress.pages_processed += 1;

                    for link in &success.links {
                        if seen.insert(link.clone()) {
                            queue.push_back(link.clone());
                        }
                    }

                    tracing::debug!(
                        url = %url,
                        fetched_via = %success.fetched_via,
                        chars = success.content.text.chars().count(),
                        links = success.links.len(),
                        "Page scraped"
                    );

                    let chunks = self.chunker.split(&success.content.text);
                    pages.push(ScrapedPage {
                        url: url.clone(),
                        title: success.content.title,
                        text: success.content.text,
                        content_hash: success.content.hash,
                        chunks,
                        page_number,
                        fetched_via: success.fetched_via,
                        scraped_at: Utc::now(),
                    });
                }
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "Page failed");
                    self.store.fail_page(page_id, &err.to_string()).await?;
                    progress.pages_failed += 1;
                }
            }

            progress.pages_discovered = seen.len() as i32;

            let finished = (progress.pages_processed + progress.pages_failed) as usize;
            if finished % CHECKPOINT_EVERY == 0 {
                self.store.checkpoint(target, &progress).await?;
            }

            if !queue.is_empty() && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        self.store.checkpoint(target, &progress).await?;

        tracing::info!(
            ingestion_id = %target.ingestion_id,
            pages_processed = progress.pages_processed,
            pages_failed = progress.pages_failed,
            pages_discovered = progress.pages_discovered,
            "Crawl finished"
        );

        Ok(CrawlOutcome { pages, progress })
    }

    /// The selector (and its learned domain preferences) after a run.
    pub fn selector(&self) -> &StrategySelector {
        &self.selector
    }
}
