//! Crawl loop: fetch, extract, append, checkpoint, follow the next link until there is none.
//!
//! The loop is strictly sequential with a fixed pause before every page. The first failure ends
//! the run; the checkpoint still points at the page that failed, so the next run resumes there.

mod checkpoint;
mod sink;

pub use checkpoint::{CheckpointStore, FileCheckpoint, MemoryCheckpoint, DEFAULT_CHECKPOINT_PATH};
pub use sink::{slugify, AppendSink, ChapterSink, MemorySink, RotatingSink};

use crate::extract::{base_domain, ExtractedPage};
use crate::fetch::{fetch_page, FetchEngine, FetchError, Fetchers};
use crate::model::ChapterRecord;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DELAY_SECS: u64 = 3;

/// Errors that abort a crawl. Page-level variants carry the offending URL.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Invalid start URL: {input}: {reason}")]
    InvalidStartUrl { input: String, reason: String },

    #[error("Error while processing {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Error while processing {url}: failed to extract chapter title or content")]
    Extraction { url: String },

    #[error("Cannot write output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot access checkpoint {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Knobs for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub engine: FetchEngine,
    /// Pause before every page fetch.
    pub delay: Duration,
    /// Save the checkpoint after every Nth chapter. Completion is always saved.
    pub checkpoint_every: u32,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            engine: FetchEngine::Auto,
            delay: Duration::from_secs(DEFAULT_DELAY_SECS),
            checkpoint_every: 1,
        }
    }
}

/// Outcome of a crawl that ran to the last chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Chapters written during this run.
    pub chapters: u32,
    /// Checkpoint URL the run started from, if it resumed.
    pub resumed_from: Option<String>,
    /// Last page processed.
    pub last_url: Option<String>,
}

/// Called after each chapter is written, with the running count for this run.
pub type ProgressFn<'a> = &'a dyn Fn(u32, &ChapterRecord);

/// Run the crawl from `start_url`, or from the checkpoint if it holds a URL.
pub fn crawl(
    start_url: &str,
    fetchers: &mut Fetchers<'_>,
    sink: &mut dyn ChapterSink,
    checkpoint: &mut dyn CheckpointStore,
    options: &CrawlOptions,
    progress: Option<ProgressFn<'_>>,
) -> Result<CrawlSummary, CrawlError> {
    let base = base_domain(start_url).map_err(|reason| CrawlError::InvalidStartUrl {
        input: start_url.to_string(),
        reason,
    })?;

    let saved = checkpoint.load().map_err(|e| CrawlError::Checkpoint {
        path: checkpoint.location(),
        source: e,
    })?;
    let mut current_url = match &saved {
        Some(url) => {
            tracing::info!(url = %url, "Checkpoint found, resuming from last saved URL");
            url.clone()
        }
        None => start_url.to_string(),
    };

    let every = options.checkpoint_every.max(1);
    let mut summary = CrawlSummary {
        chapters: 0,
        resumed_from: saved,
        last_url: None,
    };

    while !current_url.is_empty() {
        if !options.delay.is_zero() {
            std::thread::sleep(options.delay);
        }
        tracing::info!("Processing {}...", current_url);

        let ExtractedPage {
            title,
            body,
            next_url,
        } = fetch_page(options.engine, fetchers, &current_url, &base).map_err(|e| {
            tracing::error!(url = %current_url, "Fetch failed: {}", e);
            CrawlError::Fetch {
                url: current_url.clone(),
                source: e,
            }
        })?;

        let chapter = match (title, body) {
            (Some(title), Some(body)) => ChapterRecord { title, body },
            _ => {
                tracing::error!(url = %current_url, "Failed to extract chapter content");
                return Err(CrawlError::Extraction {
                    url: current_url.clone(),
                });
            }
        };

        sink.write_chapter(&chapter)
            .map_err(|e| CrawlError::Output {
                path: sink.current_path().map(PathBuf::from).unwrap_or_default(),
                source: e,
            })?;
        summary.chapters += 1;
        tracing::debug!(title = %chapter.title, "chapter written");

        let next_url = next_url.unwrap_or_default();
        if next_url.is_empty() || summary.chapters % every == 0 {
            checkpoint
                .save(&next_url)
                .map_err(|e| CrawlError::Checkpoint {
                    path: checkpoint.location(),
                    source: e,
                })?;
            tracing::debug!(next = %next_url, "checkpoint saved");
        }

        if let Some(cb) = progress {
            cb(summary.chapters, &chapter);
        }
        summary.last_url = Some(std::mem::replace(&mut current_url, next_url));
    }

    tracing::info!(chapters = summary.chapters, "Crawl finished");
    Ok(summary)
}
