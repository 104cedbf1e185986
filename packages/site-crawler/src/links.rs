//! Same-domain link discovery.
//!
//! Filters anchor targets down to crawlable, HTML-like URLs on the base
//! domain, preserving discovery order.

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// File extensions that never lead to an HTML page worth crawling.
const EXCLUDED_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".bmp", ".tiff", ".pdf", ".doc",
    ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".odt", ".zip", ".rar", ".tar", ".gz", ".7z",
    ".mp3", ".mp4", ".avi", ".mov", ".wmv", ".webm", ".mkv", ".js", ".css", ".xml", ".json",
    ".exe", ".dmg", ".pkg", ".deb", ".rpm", ".msi",
];

/// Path segments that mark asset/download routes.
const EXCLUDED_PATH_SEGMENTS: &[&str] = &["/download/", "/file/", "/asset/", "/static/", "/media/"];

/// Extract same-domain links from a rendered page.
///
/// `current_url` resolves relative hrefs; `base_domain` is the host of
/// the ingestion's base URL. Fragments are stripped, query strings kept,
/// and duplicates removed while preserving first-seen order.
pub fn extract_links(html: &str, current_url: &Url, base_domain: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for href in document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
    {
        let Ok(mut resolved) = current_url.join(href) else {
            continue;
        };

        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }
        if resolved.host_str() != Some(base_domain) {
            continue;
        }
        if is_excluded_path(resolved.path()) {
            continue;
        }

        resolved.set_fragment(None);

        let link = resolved.to_string();
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    links
}

fn is_excluded_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    EXCLUDED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        || EXCLUDED_PATH_SEGMENTS.iter().any(|seg| lower.contains(seg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links_of(html: &str) -> Vec<String> {
        let base = Url::parse("https://example.com/docs/start").unwrap();
        extract_links(html, &base, "example.com")
    }

    #[test]
    fn test_resolves_relative_urls() {
        let links = links_of(r#"<a href="/about">About</a><a href="next">Next</a>"#);
        assert_eq!(
            links,
            vec![
                "https://example.com/about".to_string(),
                "https://example.com/docs/next".to_string(),
            ]
        );
    }

    #[test]
    fn test_drops_foreign_domains() {
        let links = links_of(r#"<a href="https://other.com/page">x</a><a href="/ok">y</a>"#);
        assert_eq!(links, vec!["https://example.com/ok".to_string()]);
    }

    #[test]
    fn test_drops_asset_extensions_and_paths() {
        let links = links_of(
            r#"
            <a href="/logo.png">logo</a>
            <a href="/styles.css">css</a>
            <a href="/report.PDF">report</a>
            <a href="/static/app">app</a>
            <a href="/download/tool">tool</a>
            <a href="/pricing">pricing</a>
        "#,
        );
        assert_eq!(links, vec!["https://example.com/pricing".to_string()]);
    }

    #[test]
    fn test_strips_fragment_keeps_query() {
        let links = links_of(r#"<a href="/search?q=widgets#results">search</a>"#);
        assert_eq!(links, vec!["https://example.com/search?q=widgets".to_string()]);
    }

    #[test]
    fn test_deduplicates_preserving_order() {
        let links = links_of(
            r#"
            <a href="/b">b</a>
            <a href="/a">a</a>
            <a href="/b">b again</a>
        "#,
        );
        assert_eq!(
            links,
            vec![
                "https://example.com/b".to_string(),
                "https://example.com/a".to_string(),
            ]
        );
    }

    #[test]
    fn test_non_http_schemes_ignored() {
        let links = links_of(r#"<a href="mailto:x@example.com">mail</a><a href="tel:123">t</a>"#);
        assert!(links.is_empty());
    }
}
