//! Durable crawl progress: the URL to resume from.

use std::io::Write;
use std::path::PathBuf;

/// Default checkpoint file, relative to the working directory.
pub const DEFAULT_CHECKPOINT_PATH: &str = ".current_url.txt";

/// Holds a single optional URL: the next page still to fetch.
pub trait CheckpointStore {
    /// Saved URL, or `None` if nothing is saved or the saved value is empty.
    fn load(&mut self) -> std::io::Result<Option<String>>;

    /// Replace the saved value. An empty string marks the crawl as complete.
    fn save(&mut self, next_url: &str) -> std::io::Result<()>;

    /// Where the value lives, for error messages.
    fn location(&self) -> PathBuf;
}

/// Single-line UTF-8 checkpoint file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for FileCheckpoint {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKPOINT_PATH)
    }
}

impl CheckpointStore for FileCheckpoint {
    fn load(&mut self) -> std::io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => {
                let first = s.lines().next().unwrap_or("").trim();
                Ok((!first.is_empty()).then(|| first.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write to a temp file beside the target, then rename over it.
    fn save(&mut self, next_url: &str) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(next_url.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}

/// In-memory checkpoint for tests and dry runs. Records every save.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpoint {
    value: Option<String>,
    pub saves: Vec<String>,
}

impl MemoryCheckpoint {
    pub fn with_value(url: impl Into<String>) -> Self {
        Self {
            value: Some(url.into()),
            saves: Vec::new(),
        }
    }

    /// Raw stored value, including an empty string after completion.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl CheckpointStore for MemoryCheckpoint {
    fn load(&mut self) -> std::io::Result<Option<String>> {
        Ok(self
            .value
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from))
    }

    fn save(&mut self, next_url: &str) -> std::io::Result<()> {
        self.value = Some(next_url.to_string());
        self.saves.push(next_url.to_string());
        Ok(())
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("<memory>")
    }
}
