//! Headless Chromium fetcher. Each call launches an isolated browser, renders the page and
//! tears the browser down again before returning.

use super::{FetchError, PageFetcher};
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;

pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SETTLE_MS: u64 = 1000;

/// Renders pages in a fresh headless browser per call.
///
/// Owns a single-threaded tokio runtime that drives chromiumoxide; callers stay blocking.
pub struct BrowserFetcher {
    runtime: tokio::runtime::Runtime,
    navigation_timeout: Duration,
    settle: Duration,
    executable: Option<PathBuf>,
}

impl std::fmt::Debug for BrowserFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserFetcher")
            .field("navigation_timeout", &self.navigation_timeout)
            .field("settle", &self.settle)
            .field("executable", &self.executable)
            .finish()
    }
}

impl BrowserFetcher {
    pub fn new() -> std::io::Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> BrowserFetcherBuilder {
        BrowserFetcherBuilder::default()
    }

    fn launch_config(&self, profile: &TempDir, url: &str) -> Result<BrowserConfig, FetchError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(profile.path())
            .request_timeout(self.navigation_timeout)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(|reason| FetchError::Browser {
            url: url.to_string(),
            reason,
        })
    }

    async fn render(&self, url: &str) -> Result<String, FetchError> {
        let profile = TempDir::new().map_err(|e| FetchError::Browser {
            url: url.to_string(),
            reason: format!("could not create browser profile directory: {}", e),
        })?;
        let config = self.launch_config(&profile, url)?;
        let mut session = BrowserSession::launch(config, profile, url).await?;
        // Capture first, close unconditionally, then report the capture outcome.
        let outcome = session
            .capture(url, self.navigation_timeout, self.settle)
            .await;
        session.close().await;
        outcome
    }
}

impl PageFetcher for BrowserFetcher {
    fn name(&self) -> &'static str {
        "browser"
    }

    fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        self.runtime.block_on(self.render(url))
    }
}

/// A launched browser plus its CDP event loop and throwaway profile.
///
/// `close` shuts the process down gracefully; if it is never reached, `Drop` stops the event
/// loop and chromiumoxide kills the child process when `Browser` drops.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    _profile: TempDir,
}

impl BrowserSession {
    async fn launch(config: BrowserConfig, profile: TempDir, url: &str) -> Result<Self, FetchError> {
        let (browser, mut handler) =
            Browser::launch(config)
                .await
                .map_err(|e| FetchError::Browser {
                    url: url.to_string(),
                    reason: format!("could not launch browser: {}", e),
                })?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        tracing::debug!(url, "browser launched");
        Ok(Self {
            browser,
            handler,
            _profile: profile,
        })
    }

    async fn capture(
        &self,
        url: &str,
        navigation_timeout: Duration,
        settle: Duration,
    ) -> Result<String, FetchError> {
        let browser_err = |e: chromiumoxide::error::CdpError| FetchError::Browser {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let page = self.browser.new_page("about:blank").await.map_err(browser_err)?;
        match tokio::time::timeout(navigation_timeout, page.goto(url)).await {
            Ok(result) => {
                result.map_err(browser_err)?;
            }
            Err(_) => {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                    after: navigation_timeout,
                })
            }
        }
        tokio::time::sleep(settle).await;
        page.content().await.map_err(browser_err)
    }

    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            tracing::warn!("Failed to wait for browser exit: {}", e);
        }
        tracing::debug!("browser closed");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Builder for BrowserFetcher with navigation timeout, settle delay and executable path.
#[derive(Debug)]
pub struct BrowserFetcherBuilder {
    navigation_timeout_secs: u64,
    settle_ms: u64,
    executable: Option<PathBuf>,
}

impl Default for BrowserFetcherBuilder {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: DEFAULT_RENDER_TIMEOUT_SECS,
            settle_ms: DEFAULT_SETTLE_MS,
            executable: None,
        }
    }
}

impl BrowserFetcherBuilder {
    /// Navigation timeout in seconds. Default 60.
    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.navigation_timeout_secs = secs;
        self
    }

    /// Wait after navigation so client-side rendering can finish. Default 1000 ms.
    pub fn settle_ms(mut self, ms: u64) -> Self {
        self.settle_ms = ms;
        self
    }

    /// Explicit Chrome/Chromium binary. If not set, chromiumoxide searches the usual locations.
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    pub fn build(self) -> std::io::Result<BrowserFetcher> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(BrowserFetcher {
            runtime,
            navigation_timeout: Duration::from_secs(self.navigation_timeout_secs),
            settle: Duration::from_millis(self.settle_ms),
            executable: self.executable,
        })
    }
}
