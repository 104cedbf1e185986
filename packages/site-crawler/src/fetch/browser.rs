//! Headless browser fetcher.
//!
//! Renders client-side frameworks that the HTTP fetcher cannot see.
//! Drives a shared Chromium instance (launched lazily, 1920x1080
//! viewport), waits for the page to settle, dismisses overlays with an
//! Escape keypress and a sweep of common close-button selectors, then
//! reads the rendered DOM.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder};
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{FetchedPage, PageFetcher};
use crate::config::CrawlerConfig;
use crate::error::FetchError;
use crate::types::FetcherKind;

/// Extra settle time after the load event so late XHR-driven renders
/// make it into the DOM.
const RENDER_SETTLE: Duration = Duration::from_millis(750);

/// How long to wait for the main document's network response event
/// before assuming the navigation succeeded.
const STATUS_EVENT_WAIT: Duration = Duration::from_millis(500);

/// Dispatches Escape and clicks whatever overlay close buttons exist.
/// Selector failures are swallowed; this is best-effort.
const DISMISS_OVERLAYS_JS: &str = r#"
(function () {
  document.dispatchEvent(new KeyboardEvent('keydown', { key: 'Escape', bubbles: true }));
  var selectors = [
    '.close', '.modal-close', '.popup-close', '.close-button',
    '[aria-label="Close"]', '[aria-label="close"]', '[data-dismiss="modal"]',
    '.cookie-accept', '.cookie-consent-accept', '#onetrust-accept-btn-handler'
  ];
  for (var i = 0; i < selectors.length; i++) {
    try {
      var el = document.querySelector(selectors[i]);
      if (el) { el.click(); }
    } catch (_) {}
  }
})()
"#;

struct BrowserHandle {
    browser: Browser,
    event_loop: JoinHandle<()>,
}

impl Drop for BrowserHandle {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

pub struct BrowserFetcher {
    timeout: Duration,
    user_agent: String,
    state: Mutex<Option<Arc<BrowserHandle>>>,
}

impl BrowserFetcher {
    /// Create the fetcher without launching Chromium; the browser starts
    /// on the first `fetch` call and is reused afterwards.
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            timeout: config.browser_timeout,
            user_agent: config.user_agent.clone(),
            state: Mutex::new(None),
        }
    }

    async fn launch(&self) -> Result<BrowserHandle, FetchError> {
        tracing::info!("Launching headless browser");

        let config = BrowserConfigBuilder::default()
            .window_size(1920, 1080)
            .request_timeout(self.timeout)
            .arg(format!("--user-agent={}", self.user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-notifications")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio")
            .arg("--hide-scrollbars")
            .build()
            .map_err(FetchError::Browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        let event_loop = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "Browser handler event error");
                }
            }
        });

        Ok(BrowserHandle {
            browser,
            event_loop,
        })
    }

    async fn render(&self, url: &str) -> Result<FetchedPage, FetchError> {
        // The lock guards lazy launch only; concurrent jobs render on
        // separate pages of the shared browser.
        let handle = {
            let mut state = self.state.lock().await;
            match state.as_ref() {
                Some(handle) => Arc::clone(handle),
                None => {
                    let handle = Arc::new(self.launch().await?);
                    *state = Some(Arc::clone(&handle));
                    handle
                }
            }
        };

        let page = handle
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        let result = Self::render_on_page(&page, url).await;
        let _ = page.close().await;
        result
    }

    async fn render_on_page(page: &Page, url: &str) -> Result<FetchedPage, FetchError> {
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        page.goto(url)
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        // The document response usually arrives before load completes,
        // so this drain normally returns immediately.
        let mut status: u16 = 200;
        let deadline = tokio::time::Instant::now() + STATUS_EVENT_WAIT;
        while let Ok(Some(event)) =
            tokio::time::timeout_at(deadline, responses.next()).await
        {
            if matches!(event.r#type, ResourceType::Document) {
                status = event.response.status as u16;
                break;
            }
        }
        if status >= 400 {
            return Err(FetchError::Status(status));
        }

        tokio::time::sleep(RENDER_SETTLE).await;

        if let Err(e) = page.evaluate(DISMISS_OVERLAYS_JS).await {
            tracing::debug!(url = %url, error = %e, "Overlay dismissal failed");
        }

        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());
        let html = page
            .content()
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        Ok(FetchedPage {
            html,
            final_url,
            status,
            content_type: Some("text/html".to_string()),
        })
    }

    /// Shut down the shared browser instance, if it was ever launched.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let Some(handle) = state.take() {
            if let Ok(mut handle) = Arc::try_unwrap(handle) {
                if let Err(e) = handle.browser.close().await {
                    tracing::warn!(error = %e, "Failed to close browser cleanly");
                }
                let _ = handle.browser.wait().await;
            }
        }
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    fn kind(&self) -> FetcherKind {
        FetcherKind::Browser
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        tracing::debug!(url = %url, "Rendering page in headless browser");

        match tokio::time::timeout(self.timeout, self.render(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_is_lazy() {
        let fetcher = BrowserFetcher::new(&CrawlerConfig::default());
        assert_eq!(fetcher.kind(), FetcherKind::Browser);
        assert!(fetcher.state.try_lock().unwrap().is_none());
    }
}
