//! Chapter and book metadata types shared by the crawler, the flat-text format and the EPUB writer.

/// One chapter in discovery order.
///
/// `body` is plain text, already normalized: no blank lines when it comes from the extractor,
/// trimmed when it comes from the splitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRecord {
    pub title: String,
    pub body: String,
}

impl ChapterRecord {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Package-level metadata for the EPUB converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    /// BCP 47 language tag, e.g. `en`.
    pub language: String,
}

pub const DEFAULT_TITLE: &str = "Untitled";
pub const DEFAULT_AUTHOR: &str = "Unknown";
pub const DEFAULT_LANGUAGE: &str = "en";

impl Default for BookMetadata {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            author: DEFAULT_AUTHOR.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}
