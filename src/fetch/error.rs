//! Error type shared by the HTTP and browser fetchers.

use std::time::Duration;
use thiserror::Error;

/// Failure to obtain the raw HTML of a page. Never retried; the crawl aborts on the first one.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {input}: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("Network error: could not reach {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("Timed out after {}s fetching {url}", after.as_secs())]
    Timeout { url: String, after: Duration },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead { url: String, source: reqwest::Error },

    #[error("Browser error at {url}: {reason}")]
    Browser { url: String, reason: String },
}
