//! Flat-text chapter format shared by the crawler (writer side) and the EPUB converter (reader side).
//!
//! A chapter block is `"\n" + 20 dashes + "\n" + title + "\n\n" + body`. The splitter accepts any
//! line of 20 or more dashes as a delimiter.

use crate::model::ChapterRecord;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

pub const SEPARATOR_LEN: usize = 20;

/// Title used when a segment's first line is blank.
pub const PLACEHOLDER_TITLE: &str = "Chapter";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("No chapters found in input file")]
    NoChaptersFound,
}

/// Layout of one chapter in a crawl output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockStyle {
    /// Dash separator line before each chapter. Readable by [split_chapters].
    #[default]
    Separator,
    /// Title underlined with `=`, body, two blank lines after.
    Underlined,
}

impl std::str::FromStr for BlockStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "separator" | "dashes" => Ok(BlockStyle::Separator),
            "underlined" | "underline" => Ok(BlockStyle::Underlined),
            _ => Err(format!(
                "Invalid style: '{}'. Use separator or underlined.",
                s
            )),
        }
    }
}

/// Render one chapter as it is appended to the output file.
pub fn format_block(chapter: &ChapterRecord, style: BlockStyle) -> String {
    match style {
        BlockStyle::Separator => format!(
            "\n{}\n{}\n\n{}",
            "-".repeat(SEPARATOR_LEN),
            chapter.title,
            chapter.body
        ),
        BlockStyle::Underlined => format!(
            "{}\n{}\n{}\n\n\n",
            chapter.title,
            "=".repeat(chapter.title.chars().count()),
            chapter.body
        ),
    }
}

static SEPARATOR_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n-{20,}\n").unwrap());

/// Split flat text into chapters in file order.
///
/// Each segment's first line is the title (placeholder if blank), the rest is the body. Segments
/// with an empty body are dropped. Fails with [ParseError::NoChaptersFound] if nothing is left.
pub fn split_chapters(content: &str) -> Result<Vec<ChapterRecord>, ParseError> {
    let content = content.replace("\r\n", "\n");
    let chapters: Vec<ChapterRecord> = SEPARATOR_LINE
        .split(&content)
        .filter_map(parse_segment)
        .collect();
    if chapters.is_empty() {
        return Err(ParseError::NoChaptersFound);
    }
    Ok(chapters)
}

fn parse_segment(segment: &str) -> Option<ChapterRecord> {
    let segment = segment.trim();
    if segment.is_empty() {
        return None;
    }
    let (title, body) = segment.split_once('\n').unwrap_or((segment, ""));
    let title = title.trim();
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    let title = if title.is_empty() {
        PLACEHOLDER_TITLE
    } else {
        title
    };
    Some(ChapterRecord::new(title, body))
}
