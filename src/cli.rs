//! CLI parsing and orchestration. Parses args, runs a crawl or a text -> EPUB conversion. Maps
//! errors to exit codes.

use crate::config::{self, Config};
use crate::crawl::{
    crawl, AppendSink, ChapterSink, CrawlError, CrawlOptions, FileCheckpoint, RotatingSink,
    DEFAULT_CHECKPOINT_PATH, DEFAULT_DELAY_SECS,
};
use crate::epub::{convert_file, EpubError};
use crate::fetch::{
    BrowserFetcher, FetchEngine, Fetchers, HttpFetcher, DEFAULT_RENDER_TIMEOUT_SECS,
    DEFAULT_SETTLE_MS, DEFAULT_TIMEOUT_SECS,
};
use crate::flat::BlockStyle;
use crate::model::{BookMetadata, ChapterRecord, DEFAULT_AUTHOR, DEFAULT_LANGUAGE, DEFAULT_TITLE};
use clap::{Parser, Subcommand};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Crawl(#[from] CrawlError),

    #[error("{0}")]
    Epub(#[from] EpubError),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Crawl(_) => 2,
            CliRunError::Epub(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "bookworm")]
#[command(about = "Crawl web-novel chapters to flat text, and convert flat text to EPUB")]
#[command(
    after_help = "Config file keys (user_agent, request_delay_secs, timeout_secs, render_timeout_secs, render_settle_ms, checkpoint_path, browser_path) are read from ./bookworm.toml or the user config dir. CLI flags override config."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Warnings and errors only; no progress spinner.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug logging and the full error cause chain on failure.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Delay before each page fetch in seconds (overrides config; default 3).
    #[arg(long, global = true)]
    pub delay: Option<u64>,

    /// HTTP request timeout in seconds (overrides config; default 30).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// HTTP User-Agent (overrides config).
    #[arg(long, global = true)]
    pub user_agent: Option<String>,
}

impl Args {
    /// Default log filter for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Follow next-chapter links from URL, appending every chapter to one text file.
    Crawl(CrawlArgs),

    /// Crawl into a new text file every N chapters, named after the group's first chapter.
    CrawlSplit(CrawlSplitArgs),

    /// Convert a flat text file of dash-separated chapters into an EPUB.
    Epub(EpubArgs),
}

#[derive(clap::Args, Debug)]
pub struct CrawlArgs {
    /// First chapter URL. Ignored while a checkpoint holds a URL.
    #[arg(short, long)]
    pub url: String,

    /// Text file chapters are appended to.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Fetch engine: auto, cheap (http, requests), or rendered (browser, playwright).
    #[arg(short, long, default_value = "auto", value_parser = parse_engine)]
    pub engine: FetchEngine,

    /// Checkpoint file (overrides config; default .current_url.txt).
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct CrawlSplitArgs {
    /// First chapter URL. Ignored while a checkpoint holds a URL.
    #[arg(short, long)]
    pub url: String,

    /// Base output path; files are written as <BASE>__<slug>.txt.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Chapters per output file. The checkpoint is saved at the same cadence.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    pub every: u32,

    /// Chapter block layout: underlined or separator.
    #[arg(long, default_value = "underlined", value_parser = parse_style)]
    pub style: BlockStyle,

    /// Fetch engine: auto, cheap, or rendered.
    #[arg(short, long, default_value = "rendered", value_parser = parse_engine)]
    pub engine: FetchEngine,

    /// Checkpoint file (overrides config; default .current_url.txt).
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct EpubArgs {
    /// Flat text file with chapters separated by lines of 20 or more dashes.
    #[arg(short, long)]
    pub input: PathBuf,

    /// EPUB file to write.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Book title.
    #[arg(short, long, default_value = DEFAULT_TITLE)]
    pub title: String,

    /// Book author.
    #[arg(short, long, default_value = DEFAULT_AUTHOR)]
    pub author: String,

    /// Language code.
    #[arg(short, long, default_value = DEFAULT_LANGUAGE)]
    pub language: String,
}

fn parse_engine(s: &str) -> Result<FetchEngine, String> {
    s.parse()
}

fn parse_style(s: &str) -> Result<BlockStyle, String> {
    s.parse()
}

/// Crawl settings after applying flags over config over defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CrawlSettings {
    delay_secs: u64,
    timeout_secs: u64,
    render_timeout_secs: u64,
    render_settle_ms: u64,
    user_agent: Option<String>,
    checkpoint_path: PathBuf,
    browser_path: Option<PathBuf>,
}

fn resolve_settings(
    args: &Args,
    config: Option<&Config>,
    checkpoint: Option<&Path>,
) -> CrawlSettings {
    CrawlSettings {
        delay_secs: args
            .delay
            .or_else(|| config.and_then(|c| c.request_delay_secs))
            .unwrap_or(DEFAULT_DELAY_SECS),
        timeout_secs: args
            .timeout
            .or_else(|| config.and_then(|c| c.timeout_secs))
            .unwrap_or(DEFAULT_TIMEOUT_SECS),
        render_timeout_secs: config
            .and_then(|c| c.render_timeout_secs)
            .unwrap_or(DEFAULT_RENDER_TIMEOUT_SECS),
        render_settle_ms: config
            .and_then(|c| c.render_settle_ms)
            .unwrap_or(DEFAULT_SETTLE_MS),
        user_agent: args
            .user_agent
            .clone()
            .or_else(|| config.and_then(|c| c.user_agent.clone())),
        checkpoint_path: checkpoint
            .map(Path::to_path_buf)
            .or_else(|| config.and_then(|c| c.checkpoint_path.clone()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CHECKPOINT_PATH)),
        browser_path: config.and_then(|c| c.browser_path.clone()),
    }
}

/// Reject URLs that cannot start a crawl before any file is touched.
fn validate_start_url(url: &str) -> Result<(), CliRunError> {
    crate::extract::base_domain(url).map(|_| ()).map_err(|reason| {
        CliRunError::InvalidInput(format!(
            "Expected an absolute chapter URL, e.g. https://example.com/read/1. Invalid: {}: {}",
            url, reason
        ))
    })
}

/// Ensure output path parent exists.
fn validate_output_path(path: &Path) -> Result<(), CliRunError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(CliRunError::InvalidInput(format!(
                "Cannot write output: {}: parent directory does not exist.",
                path.display()
            )));
        }
    }
    Ok(())
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    match &args.command {
        Command::Crawl(c) => {
            validate_start_url(&c.url)?;
            let config = config::load_config().map_err(CliRunError::InvalidInput)?;
            let mut sink = AppendSink::open(&c.output, BlockStyle::Separator).map_err(|e| {
                CrawlError::Output {
                    path: c.output.clone(),
                    source: e,
                }
            })?;
            run_crawl(
                args,
                config.as_ref(),
                &c.url,
                c.engine,
                c.checkpoint.as_deref(),
                1,
                &mut sink,
            )
        }
        Command::CrawlSplit(c) => {
            validate_start_url(&c.url)?;
            let config = config::load_config().map_err(CliRunError::InvalidInput)?;
            let mut sink = RotatingSink::new(&c.output, c.every, c.style);
            run_crawl(
                args,
                config.as_ref(),
                &c.url,
                c.engine,
                c.checkpoint.as_deref(),
                c.every,
                &mut sink,
            )
        }
        Command::Epub(e) => run_epub(args, e),
    }
}

fn run_crawl(
    args: &Args,
    config: Option<&Config>,
    url: &str,
    engine: FetchEngine,
    checkpoint_flag: Option<&Path>,
    checkpoint_every: u32,
    sink: &mut dyn ChapterSink,
) -> Result<(), CliRunError> {
    let settings = resolve_settings(args, config, checkpoint_flag);
    tracing::debug!(?settings, "crawl settings");

    let mut http_builder = HttpFetcher::builder().timeout_secs(settings.timeout_secs);
    if let Some(ua) = settings.user_agent.clone() {
        http_builder = http_builder.user_agent(ua);
    }
    let mut http = http_builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    let mut browser_builder = BrowserFetcher::builder()
        .navigation_timeout_secs(settings.render_timeout_secs)
        .settle_ms(settings.render_settle_ms);
    if let Some(path) = settings.browser_path.clone() {
        browser_builder = browser_builder.executable(path);
    }
    let mut browser = browser_builder.build().map_err(|e| {
        CliRunError::InvalidInput(format!("Failed to prepare browser runtime: {}", e))
    })?;

    let mut fetchers = Fetchers {
        cheap: &mut http,
        rendered: &mut browser,
    };
    let mut checkpoint = FileCheckpoint::new(settings.checkpoint_path.clone());
    let options = CrawlOptions {
        engine,
        delay: Duration::from_secs(settings.delay_secs),
        checkpoint_every,
    };

    let spinner: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |n: u32, chapter: &ChapterRecord| {
        let mut state = spinner.borrow_mut();
        let pb = state.get_or_insert_with(|| {
            let bar = indicatif::ProgressBar::new_spinner();
            if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner} {msg} ({elapsed})")
            {
                bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
            }
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        pb.set_message(format!("{} chapters written, latest: {}", n, chapter.title));
    };
    let progress: Option<&dyn Fn(u32, &ChapterRecord)> =
        if args.quiet { None } else { Some(&progress_cb) };

    let result = crawl(
        url,
        &mut fetchers,
        sink,
        &mut checkpoint,
        &options,
        progress,
    );

    if let Some(pb) = spinner.borrow_mut().take() {
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }

    let summary = result?;
    if !args.quiet {
        match sink.current_path() {
            Some(path) => eprintln!(
                "Wrote {} chapters (last file {})",
                summary.chapters,
                path.display()
            ),
            None => eprintln!("Wrote {} chapters", summary.chapters),
        }
    }
    Ok(())
}

fn run_epub(args: &Args, e: &EpubArgs) -> Result<(), CliRunError> {
    if !e.input.is_file() {
        return Err(CliRunError::InvalidInput(format!(
            "Input file not found: {}",
            e.input.display()
        )));
    }
    validate_output_path(&e.output)?;

    let meta = BookMetadata {
        title: e.title.clone(),
        author: e.author.clone(),
        language: e.language.clone(),
    };
    let count = convert_file(&e.input, &e.output, &meta)?;

    if !args.quiet {
        eprintln!("Wrote {} ({} chapters)", e.output.display(), count);
    }
    Ok(())
}
