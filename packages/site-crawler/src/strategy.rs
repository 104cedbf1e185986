//! Fetcher selection with per-domain preference learning.
//!
//! `Auto` probes the cheap HTTP fetcher first and only reaches for the
//! browser when the page comes back content-poor, remembering per host
//! which of the two actually worked. The cache lives for a single
//! ingestion job and dies with it.

use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::cleaner::clean_html;
use crate::error::FetchError;
use crate::fetch::PageFetcher;
use crate::links::extract_links;
use crate::types::{CleanedContent, FetcherKind, ScrapingStrategy};

/// Cleaned text shorter than this is taken as a sign the page renders
/// client-side, and the browser fetcher should be tried.
pub const MIN_CONTENT_CHARS: usize = 500;

/// Per-job cache of which fetcher works for a host. Not durable.
#[derive(Debug, Default)]
pub struct DomainPreferences {
    map: HashMap<String, FetcherKind>,
}

impl DomainPreferences {
    pub fn get(&self, host: &str) -> Option<FetcherKind> {
        self.map.get(host).copied()
    }

    pub fn set(&mut self, host: &str, kind: FetcherKind) {
        self.map.insert(host.to_string(), kind);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// One successfully scraped and cleaned page.
#[derive(Debug, Clone)]
pub struct ScrapeSuccess {
    pub content: CleanedContent,
    pub links: Vec<String>,
    pub fetched_via: FetcherKind,
}

pub struct StrategySelector {
    http: Arc<dyn PageFetcher>,
    browser: Arc<dyn PageFetcher>,
    strategy: ScrapingStrategy,
    enable_fallback: bool,
    preferences: DomainPreferences,
}

impl StrategySelector {
    pub fn new(
        http: Arc<dyn PageFetcher>,
        browser: Arc<dyn PageFetcher>,
        strategy: ScrapingStrategy,
        enable_fallback: bool,
    ) -> Self {
        Self {
            http,
            browser,
            strategy,
            enable_fallback,
            preferences: DomainPreferences::default(),
        }
    }

    pub fn strategy(&self) -> ScrapingStrategy {
        self.strategy
    }

    pub fn preferences(&self) -> &DomainPreferences {
        &self.preferences
    }

    /// Fetch, clean, and extract links from one page, choosing the
    /// fetcher according to the configured strategy.
    pub async fn scrape_page(
        &mut self,
        url: &str,
        base_domain: &str,
    ) -> Result<ScrapeSuccess, FetchError> {
        match self.strategy {
            ScrapingStrategy::HttpOnly => self.fetch_with(FetcherKind::Http, url, base_domain).await,
            ScrapingStrategy::BrowserOnly => {
                self.fetch_with(FetcherKind::Browser, url, base_domain).await
            }
            ScrapingStrategy::HttpFirst => {
                match self.fetch_with(FetcherKind::Http, url, base_domain).await {
                    Ok(success) => Ok(success),
                    Err(err) if self.enable_fallback => {
                        tracing::debug!(url = %url, error = %err, "HTTP fetch failed, falling back to browser");
                        self.fetch_with(FetcherKind::Browser, url, base_domain).await
                    }
                    Err(err) => Err(err),
                }
            }
            ScrapingStrategy::Auto => self.scrape_auto(url, base_domain).await,
        }
    }

    async fn scrape_auto(
        &mut self,
        url: &str,
        base_domain: &str,
    ) -> Result<ScrapeSuccess, FetchError> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| base_domain.to_string());

        if let Some(preferred) = self.preferences.get(&host) {
            match self.fetch_with(preferred, url, base_domain).await {
                Ok(success) => return Ok(success),
                Err(err) => {
                    tracing::debug!(
                        url = %url,
                        preferred = %preferred,
                        error = %err,
                        "Cached fetcher failed, trying the other one"
                    );
                    let success = self.fetch_with(preferred.other(), url, base_domain).await?;
                    self.preferences.set(&host, preferred.other());
                    return Ok(success);
                }
            }
        }

        // No preference yet: probe with HTTP and learn from the result.
        let http_attempt = self.fetch_with(FetcherKind::Http, url, base_domain).await;
        if let Ok(success) = &http_attempt {
            if success.content.text.chars().count() >= MIN_CONTENT_CHARS {
                self.preferences.set(&host, FetcherKind::Http);
                tracing::debug!(host = %host, "Learned preference: http");
                return http_attempt;
            }
        }

        match self.fetch_with(FetcherKind::Browser, url, base_domain).await {
            Ok(success) if success.content.text.chars().count() >= MIN_CONTENT_CHARS => {
                self.preferences.set(&host, FetcherKind::Browser);
                tracing::debug!(host = %host, "Learned preference: browser");
                Ok(success)
            }
            Ok(success) => {
                // Neither fetcher cleared the threshold; if HTTP at least
                // produced something, both are content-poor. Fail without
                // caching so a later page can re-probe.
                let best = http_attempt
                    .map(|h| {
                        h.content
                            .text
                            .chars()
                            .count()
                            .max(success.content.text.chars().count())
                    })
                    .unwrap_or_else(|_| success.content.text.chars().count());
                Err(FetchError::InsufficientContent(best))
            }
            Err(err) => match http_attempt {
                // Browser failed outright; a short-but-clean HTTP result
                // is still better than nothing.
                Ok(success) => Ok(success),
                Err(_) => Err(err),
            },
        }
    }

    async fn fetch_with(
        &self,
        kind: FetcherKind,
        url: &str,
        base_domain: &str,
    ) -> Result<ScrapeSuccess, FetchError> {
        let fetcher = match kind {
            FetcherKind::Http => &self.http,
            FetcherKind::Browser => &self.browser,
        };

        let page = fetcher.fetch(url).await?;
        let content = clean_html(&page.html)?;

        let current = Url::parse(&page.final_url)
            .or_else(|_| Url::parse(url))
            .map_err(|e| FetchError::Network(format!("unparseable URL {url}: {e}")))?;
        let links = extract_links(&page.html, &current, base_domain);

        Ok(ScrapeSuccess {
            content,
            links,
            fetched_via: kind,
        })
    }
}
