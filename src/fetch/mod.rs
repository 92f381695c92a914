//! Fetch strategies and the policy that picks between them.
//!
//! Two interchangeable providers implement [PageFetcher]: a cheap HTTP GET and a headless
//! browser render. [fetch_page] applies the engine policy, including the `auto` fallback from
//! cheap to rendered when extraction comes back incomplete.

mod browser;
mod client;
mod error;

pub use browser::{
    BrowserFetcher, BrowserFetcherBuilder, DEFAULT_RENDER_TIMEOUT_SECS, DEFAULT_SETTLE_MS,
};
pub use client::{HttpFetcher, HttpFetcherBuilder, DEFAULT_TIMEOUT_SECS};
pub use error::FetchError;

use crate::extract::{extract, ExtractedPage};
use reqwest::Url;

/// Anything that can turn a URL into raw HTML.
pub trait PageFetcher {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn fetch(&mut self, url: &str) -> Result<String, FetchError>;
}

/// Which fetcher(s) to use for each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchEngine {
    /// Cheap first; rendered retry on the same URL when title or body is missing.
    #[default]
    Auto,
    /// HTTP only.
    Cheap,
    /// Browser only.
    Rendered,
}

impl std::str::FromStr for FetchEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(FetchEngine::Auto),
            "cheap" | "http" | "requests" => Ok(FetchEngine::Cheap),
            "rendered" | "browser" | "playwright" => Ok(FetchEngine::Rendered),
            _ => Err(format!(
                "Invalid engine: '{}'. Use auto, cheap, or rendered.",
                s
            )),
        }
    }
}

/// The pair of providers the policy chooses from.
pub struct Fetchers<'a> {
    pub cheap: &'a mut dyn PageFetcher,
    pub rendered: &'a mut dyn PageFetcher,
}

/// Fetch `url` and extract it according to `engine`.
///
/// The returned page may still be incomplete; deciding that this is fatal is up to the caller.
/// A fetch error is returned as-is, also in `Auto` mode.
pub fn fetch_page(
    engine: FetchEngine,
    fetchers: &mut Fetchers<'_>,
    url: &str,
    base: &Url,
) -> Result<ExtractedPage, FetchError> {
    match engine {
        FetchEngine::Cheap => fetch_with(fetchers.cheap, url, base),
        FetchEngine::Rendered => fetch_with(fetchers.rendered, url, base),
        FetchEngine::Auto => {
            let page = fetch_with(fetchers.cheap, url, base)?;
            if page.is_complete() {
                return Ok(page);
            }
            tracing::info!(url, "Incomplete page from plain fetch, retrying with browser");
            fetch_with(fetchers.rendered, url, base)
        }
    }
}

fn fetch_with(
    fetcher: &mut dyn PageFetcher,
    url: &str,
    base: &Url,
) -> Result<ExtractedPage, FetchError> {
    tracing::debug!(url, fetcher = fetcher.name(), "fetching");
    let html = fetcher.fetch(url)?;
    Ok(extract(&html, base))
}
