//! HTML to plain text cleaning.
//!
//! Picks a main-content region, strips script/style/media noise and
//! ad/cookie/modal elements, and normalizes whitespace. Given identical
//! HTML bytes the output is byte-identical, so the content hash derived
//! from it is stable across retries.

use scraper::{Html, Selector};

use crate::error::FetchError;
use crate::types::{CleanedContent, ContentHash};

/// Candidate main-content containers, tried in order; first hit wins.
/// Nav/header/footer/aside are deliberately kept — real content often
/// lives there on small sites.
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    ".content",
    ".main-content",
    "#content",
    "#main",
    "body",
];

/// Elements removed from the main-content subtree before text extraction.
const NOISE_SELECTORS: &[&str] = &[
    "script",
    "style",
    "noscript",
    "iframe",
    "embed",
    "object",
    "video",
    "audio",
    "picture",
    "source",
    "svg",
    "canvas",
    "img",
    "link",
    "meta",
    "base",
    "[class*='advertisement']",
    "[class*='banner']",
    "[class*='cookie-banner']",
    "[class*='cookie-consent']",
    "[class*='popup']",
    "[class*='modal']",
];

/// Pages whose cleaned text is shorter than this are recorded as failed.
const MIN_CLEANED_CHARS: usize = 50;

/// Clean raw HTML into a title and normalized visible text.
///
/// Returns [`FetchError::InsufficientContent`] when fewer than 50
/// characters of text survive cleaning.
pub fn clean_html(html: &str) -> Result<CleanedContent, FetchError> {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let region = main_content_region(&document);
    let stripped = remove_noise(&region);

    let fragment = Html::parse_fragment(&stripped);
    let raw_text: String = fragment.root_element().text().collect();
    let text = normalize_text(&raw_text);

    let char_count = text.chars().count();
    if char_count < MIN_CLEANED_CHARS {
        return Err(FetchError::InsufficientContent(char_count));
    }

    let hash = ContentHash::from_text(&text);
    Ok(CleanedContent { title, text, hash })
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| normalize_line(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

/// Serialize the first matching main-content element, falling back to
/// the whole document when even `body` is absent.
fn main_content_region(document: &Html) -> String {
    for selector_str in MAIN_CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                return element.html();
            }
        }
    }
    document.html()
}

/// Remove noise elements by deleting their serialized form from the
/// region's HTML string.
fn remove_noise(region_html: &str) -> String {
    let document = Html::parse_document(region_html);
    let mut result = region_html.to_string();

    for selector_str in NOISE_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in document.select(&selector) {
                let element_html = element.html();
                result = result.replace(&element_html, "");
            }
        }
    }

    result
}

/// Collapse whitespace per line and drop lines that carry no content:
/// two characters or fewer, or punctuation only.
fn normalize_text(raw: &str) -> String {
    raw.lines()
        .map(normalize_line)
        .filter(|line| line.chars().count() > 2)
        .filter(|line| line.chars().any(|c| c.is_alphanumeric()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn normalize_line(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}
