//! Chapter file format detection and parsing.

pub mod simple;

use std::fs;
use std::path::Path;

use crate::error::{ChapterError, Result};
use crate::model::Chapters;
use crate::uid::UniqueIds;

/// Fallbacks for values a chapter file does not specify.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ChapterDefaults {
    /// Language for chapter names. Simple chapters fall back to "eng".
    pub language: Option<String>,
    pub country: Option<String>,
}

/// Timeframe filter and language override applied while parsing.
/// Timecodes are in nanoseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub min: u64,
    pub max: Option<u64>,
    /// Subtracted from every kept start timecode.
    pub offset: u64,
    pub language: Option<String>,
}

/// Recognised chapter file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterFormat {
    Simple,
    CueSheet,
    Xml,
}

impl std::fmt::Display for ChapterFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChapterFormat::Simple => write!(f, "simple chapters"),
            ChapterFormat::CueSheet => write!(f, "CUE sheet"),
            ChapterFormat::Xml => write!(f, "XML chapters"),
        }
    }
}

const CUE_KEYWORDS: [&str; 6] = ["FILE ", "TITLE ", "PERFORMER ", "REM ", "CATALOG ", "CDTEXTFILE "];

fn first_line(text: &str) -> Option<&str> {
    text.trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
}

/// Detect the format of a chapter file from its content.
pub fn detect_format(text: &str) -> Option<ChapterFormat> {
    if simple::probe(text) {
        return Some(ChapterFormat::Simple);
    }

    let line = first_line(text)?;
    let upper = line.to_ascii_uppercase();
    if CUE_KEYWORDS.iter().any(|kw| upper.starts_with(kw)) {
        return Some(ChapterFormat::CueSheet);
    }
    if line.starts_with("<?xml") || line.starts_with("<Chapters") {
        return Some(ChapterFormat::Xml);
    }
    None
}

/// Parse chapters of any supported format.
///
/// Returns `Ok(None)` if the file is valid but no chapter falls into the
/// requested timeframe. On error no partial tree is returned.
pub fn parse_chapters(
    text: &str,
    options: &ParseOptions,
    defaults: &ChapterDefaults,
    uids: &mut UniqueIds,
) -> Result<Option<Chapters>> {
    match detect_format(text) {
        Some(ChapterFormat::Simple) => simple::parse(text, options, defaults, uids),
        Some(format) => Err(ChapterError::UnsupportedFormat(format.to_string())),
        None => Err(ChapterError::UnknownFormat),
    }
}

/// Read and parse a chapter file.
pub fn parse_chapter_file(
    path: impl AsRef<Path>,
    options: &ParseOptions,
    defaults: &ChapterDefaults,
    uids: &mut UniqueIds,
) -> Result<Option<Chapters>> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_chapters(&text, options, defaults, uids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(
            detect_format("CHAPTER01=00:00:00.000\nCHAPTER01NAME=a"),
            Some(ChapterFormat::Simple)
        );
        assert_eq!(
            detect_format("\nTITLE \"Album\"\nFILE \"a.flac\" WAVE"),
            Some(ChapterFormat::CueSheet)
        );
        assert_eq!(
            detect_format("<?xml version=\"1.0\"?>\n<Chapters/>"),
            Some(ChapterFormat::Xml)
        );
        assert_eq!(detect_format("hello"), None);
        assert_eq!(detect_format(""), None);
    }

    #[test]
    fn test_unsupported_and_unknown() {
        let mut uids = UniqueIds::with_seed(2);
        let defaults = ChapterDefaults::default();
        let options = ParseOptions::default();

        let err = parse_chapters("<Chapters></Chapters>", &options, &defaults, &mut uids);
        assert!(matches!(err, Err(ChapterError::UnsupportedFormat(_))));

        let err = parse_chapters("garbage", &options, &defaults, &mut uids);
        assert!(matches!(err, Err(ChapterError::UnknownFormat)));
    }
}
