use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use crate::types::ScrapingStrategy;

/// Crawler configuration, loaded once per process from environment
/// variables and shared (by value) with every crawl.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Default strategy for new ingestions. A retry may override this
    /// per ingestion.
    pub strategy: ScrapingStrategy,
    /// Whether pinned-first strategies may fall back to the other fetcher.
    pub enable_fallback: bool,
    pub http_timeout: Duration,
    pub browser_timeout: Duration,
    pub max_pages_per_site: usize,
    /// Politeness delay between consecutive page fetches.
    pub scraping_delay: Duration,
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            strategy: ScrapingStrategy::Auto,
            enable_fallback: true,
            http_timeout: Duration::from_secs(10),
            browser_timeout: Duration::from_secs(30),
            max_pages_per_site: 100,
            scraping_delay: Duration::from_millis(1000),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl CrawlerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let strategy = match env::var("SCRAPING_STRATEGY") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("SCRAPING_STRATEGY has invalid value: {raw}"))?,
            Err(_) => defaults.strategy,
        };

        Ok(Self {
            strategy,
            enable_fallback: env_parse("ENABLE_FALLBACK", defaults.enable_fallback)?,
            http_timeout: Duration::from_secs(env_parse(
                "HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )?),
            browser_timeout: Duration::from_secs(env_parse(
                "BROWSER_TIMEOUT_SECS",
                defaults.browser_timeout.as_secs(),
            )?),
            max_pages_per_site: env_parse("MAX_PAGES_PER_SITE", defaults.max_pages_per_site)?,
            scraping_delay: Duration::from_millis(env_parse(
                "SCRAPING_DELAY_MS",
                defaults.scraping_delay.as_millis() as u64,
            )?),
            user_agent: env::var("SCRAPER_USER_AGENT").unwrap_or(defaults.user_agent),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} has invalid value {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}
