//! Plain HTTP fetcher.
//!
//! Fast path for server-rendered sites: a pooled reqwest client with a
//! browser-like User-Agent, a short timeout, and redirect following.
//! Rejects anything that is not HTML.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::{FetchedPage, PageFetcher};
use crate::config::CrawlerConfig;
use crate::error::FetchError;
use crate::types::FetcherKind;

pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
                .parse()
                .context("invalid Accept header")?,
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            "en-US,en;q=0.5".parse().context("invalid Accept-Language header")?,
        );

        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            timeout: config.http_timeout,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    fn kind(&self) -> FetcherKind {
        FetcherKind::Http
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        tracing::debug!(url = %url, "Fetching page over HTTP");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout.as_secs()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(ct) = &content_type {
            if !is_html(ct) {
                return Err(FetchError::NotHtml(ct.clone()));
            }
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, self.timeout.as_secs()))?;

        Ok(FetchedPage {
            html,
            final_url,
            status: status.as_u16(),
            content_type,
        })
    }
}

fn is_html(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    ct.contains("text/html") || ct.contains("application/xhtml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&CrawlerConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetches_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body>hello</body></html>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let page = fetcher().fetch(&format!("{}/page", server.uri())).await.unwrap();
        assert_eq!(page.status, 200);
        assert!(page.html.contains("hello"));
        assert!(page.content_type.unwrap().contains("text/html"));
    }

    #[tokio::test]
    async fn test_rejects_non_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{\"a\":1}")
                    .insert_header("content-type", "application/json"),
            )
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/data", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NotHtml(_)));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
    }
}
