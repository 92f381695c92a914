//! Where crawled chapters go: one growing file, or a series of files rotated every N chapters.

use crate::flat::{format_block, BlockStyle};
use crate::model::ChapterRecord;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Receives chapters in crawl order.
pub trait ChapterSink {
    fn write_chapter(&mut self, chapter: &ChapterRecord) -> std::io::Result<()>;

    /// File the last chapter went to, for error messages and progress output.
    fn current_path(&self) -> Option<&Path>;
}

fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Appends every chapter to a single file. Existing content is kept.
#[derive(Debug)]
pub struct AppendSink {
    path: PathBuf,
    file: File,
    style: BlockStyle,
}

impl AppendSink {
    /// Open `path` for appending, creating it and its parent directory if needed.
    pub fn open(path: impl Into<PathBuf>, style: BlockStyle) -> std::io::Result<Self> {
        let path = path.into();
        ensure_parent_dir(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file, style })
    }
}

impl ChapterSink for AppendSink {
    fn write_chapter(&mut self, chapter: &ChapterRecord) -> std::io::Result<()> {
        self.file
            .write_all(format_block(chapter, self.style).as_bytes())?;
        self.file.flush()
    }

    fn current_path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Starts a new file `<base>__<slug(title)>.txt` on the first chapter of every group of `every`.
///
/// A new file is truncated when opened, so re-crawling a group after a resume rewrites it
/// instead of duplicating its chapters.
#[derive(Debug)]
pub struct RotatingSink {
    base: PathBuf,
    every: u32,
    style: BlockStyle,
    written: u32,
    current: Option<(PathBuf, File)>,
}

impl RotatingSink {
    pub fn new(base: impl Into<PathBuf>, every: u32, style: BlockStyle) -> Self {
        Self {
            base: base.into(),
            every: every.max(1),
            style,
            written: 0,
            current: None,
        }
    }

    /// `<base>__<slug>.txt`, keeping the directory part of `base`.
    pub fn file_name_for(&self, title: &str) -> PathBuf {
        let stem = self
            .base
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.base
            .with_file_name(format!("{}__{}.txt", stem, slugify(title)))
    }
}

impl ChapterSink for RotatingSink {
    fn write_chapter(&mut self, chapter: &ChapterRecord) -> std::io::Result<()> {
        if self.written % self.every == 0 || self.current.is_none() {
            let path = self.file_name_for(&chapter.title);
            ensure_parent_dir(&path)?;
            let file = File::create(&path)?;
            tracing::info!(path = %path.display(), "Started new output file");
            self.current = Some((path, file));
        }
        if let Some((_, file)) = self.current.as_mut() {
            file.write_all(format_block(chapter, self.style).as_bytes())?;
            file.flush()?;
        }
        self.written += 1;
        Ok(())
    }

    fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|(p, _)| p.as_path())
    }
}

/// Lowercase, alphanumerics kept, every other run of characters collapsed to a single `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("chapter");
    }
    slug
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub chapters: Vec<ChapterRecord>,
}

impl ChapterSink for MemorySink {
    fn write_chapter(&mut self, chapter: &ChapterRecord) -> std::io::Result<()> {
        self.chapters.push(chapter.clone());
        Ok(())
    }

    fn current_path(&self) -> Option<&Path> {
        None
    }
}
