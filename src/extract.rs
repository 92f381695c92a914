//! Page extractor: derives (title, body, next URL) from a chapter page with layered fallbacks.
//!
//! Selectors are fixed for the reader markup this tool targets:
//! - title: first `h1`
//! - body: `div[data-container]` text, else `main[data-reader-content] .node-doc p`
//! - next: `a[data-next-chapter-link]`, else the last `a.ty_a0.ty_cm[href*='/read/']`

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

const TITLE: &str = "h1";
const READER_CONTAINER: &str = "div[data-container]";
const READER_PARAGRAPHS: &str = "main[data-reader-content] .node-doc p";
const NEXT_LINK: &str = "a[data-next-chapter-link]";
const NEXT_LINK_FALLBACK: &str = "a.ty_a0.ty_cm[href*='/read/']";

/// What one page yielded. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: Option<String>,
    pub body: Option<String>,
    pub next_url: Option<String>,
}

impl ExtractedPage {
    /// Title and body are both present.
    pub fn is_complete(&self) -> bool {
        self.title.is_some() && self.body.is_some()
    }
}

/// Elements matching `sel`, in document order. A selector that fails to parse matches nothing.
fn select_all<'a>(doc: &'a Html, sel: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(sel) {
        Ok(selector) => doc.select(&selector).collect(),
        Err(e) => {
            tracing::warn!("invalid selector {:?}: {}", sel, e);
            Vec::new()
        }
    }
}

/// Extract title, body and next-chapter URL. Never fails: missing parts come back as `None`.
///
/// Relative next links are joined against `base` (scheme + host of the start URL), not
/// against the page URL.
pub fn extract(html: &str, base: &Url) -> ExtractedPage {
    let doc = Html::parse_document(html);
    ExtractedPage {
        title: extract_title(&doc),
        body: extract_body(&doc),
        next_url: extract_next_url(&doc, base),
    }
}

fn extract_title(doc: &Html) -> Option<String> {
    select_all(doc, TITLE)
        .first()
        .map(|e| {
            e.text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|t| !t.is_empty())
}

fn extract_body(doc: &Html) -> Option<String> {
    let text = if let Some(container) = select_all(doc, READER_CONTAINER).first() {
        container.text().collect::<Vec<_>>().join("\n")
    } else {
        let paragraphs = select_all(doc, READER_PARAGRAPHS);
        if paragraphs.is_empty() {
            return None;
        }
        paragraphs
            .iter()
            .map(|p| p.text().collect::<String>().trim().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    };
    let cleaned = strip_blank_lines(&text);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Drop lines that are empty or whitespace-only. Remaining lines are kept verbatim.
pub fn strip_blank_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_next_url(doc: &Html, base: &Url) -> Option<String> {
    let primary = select_all(doc, NEXT_LINK)
        .first()
        .and_then(|a| a.value().attr("href"))
        .filter(|h| !h.trim().is_empty());
    let href = primary.or_else(|| {
        select_all(doc, NEXT_LINK_FALLBACK)
            .last()
            .and_then(|a| a.value().attr("href"))
    })?;
    resolve_href(base, href)
}

/// Join `href` against `base`. Absolute hrefs come back unchanged apart from URL normalization.
pub fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match base.join(href) {
        Ok(u) => Some(u.to_string()),
        Err(e) => {
            tracing::warn!(href, "Ignoring unresolvable next link: {}", e);
            None
        }
    }
}

/// `scheme://host[:port]` of `url`, used as the base for relative next links.
pub fn base_domain(url: &str) -> Result<Url, String> {
    let parsed = Url::parse(url).map_err(|e| e.to_string())?;
    if parsed.host_str().is_none() {
        return Err("URL has no host".to_string());
    }
    Url::parse(&parsed.origin().ascii_serialization()).map_err(|e| e.to_string())
}
