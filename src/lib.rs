//! bookworm: crawl web-novel chapters into flat text, and turn flat text into EPUB.

pub mod cli;
pub mod config;
pub mod crawl;
pub mod epub;
pub mod extract;
pub mod fetch;
pub mod flat;
pub mod logging;
pub mod model;

// Re-exports for CLI and consumers.
pub use crawl::{
    crawl, AppendSink, ChapterSink, CheckpointStore, CrawlError, CrawlOptions, CrawlSummary,
    FileCheckpoint, RotatingSink,
};
pub use epub::{build_epub, convert_file, write_epub, EpubError};
pub use extract::{extract, ExtractedPage};
pub use fetch::{
    fetch_page, BrowserFetcher, FetchEngine, FetchError, Fetchers, HttpFetcher, PageFetcher,
};
pub use flat::{format_block, split_chapters, BlockStyle, ParseError};
pub use model::{BookMetadata, ChapterRecord};
