//! OGM style "simple" chapters:
//!
//! ```text
//! CHAPTER01=00:00:00.000
//! CHAPTER01NAME=Intro
//! ```

use regex::Regex;
use tracing::debug;

use super::{ChapterDefaults, ParseOptions};
use crate::error::{ChapterError, Result};
use crate::model::{ChapterAtom, ChapterDisplay, Chapters, Edition};
use crate::uid::{UidKind, UniqueIds};

const TIMECODE_LINE: &str = r"^\s*CHAPTER\d+\s*=\s*(\d+)\s*:\s*(\d+)\s*:\s*(\d+)\s*[\.,]\s*(\d+)";
const TIMECODE: &str = r"^\s*CHAPTER\d+\s*=(.*)";
const NAME_LINE: &str = r"^\s*CHAPTER\d+NAME\s*=(.*)";

const DEFAULT_LANGUAGE: &str = "eng";
const NS_PER_MS: u64 = 1_000_000;

/// Non-empty, trimmed lines with their 1-based line numbers.
fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.trim_start_matches('\u{feff}')
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

/// Whether the first non-empty line is a `CHAPTERxx=` timecode line and the
/// next one a `CHAPTERxxNAME=` line.
pub fn probe(text: &str) -> bool {
    let (Ok(timecode_line), Ok(name_line)) = (Regex::new(TIMECODE_LINE), Regex::new(NAME_LINE))
    else {
        return false;
    };

    let mut lines = content_lines(text).map(|(_, line)| line);
    match (lines.next(), lines.next()) {
        (Some(first), Some(second)) => timecode_line.is_match(first) && name_line.is_match(second),
        _ => false,
    }
}

struct Patterns {
    timecode_line: Regex,
    timecode: Regex,
    name_line: Regex,
}

impl Patterns {
    fn new() -> Result<Self> {
        Ok(Self {
            timecode_line: Regex::new(&format!("{TIMECODE_LINE}$"))?,
            timecode: Regex::new(&format!("{TIMECODE}$"))?,
            name_line: Regex::new(&format!("{NAME_LINE}$"))?,
        })
    }
}

fn number(line: usize, digits: &str) -> Result<u64> {
    digits
        .parse()
        .map_err(|_| ChapterError::parse(line, format!("'{}' is not a valid number.", digits)))
}

fn timecode_overflow(line: usize, text: &str) -> ChapterError {
    ChapterError::parse(line, format!("'{}': the timecode is out of range.", text))
}

/// Parse simple chapters into a single edition.
///
/// Only chapters starting inside the window of `options` are kept; their
/// start is shifted by `-options.offset`. Window and offset are applied at
/// millisecond precision. Returns `Ok(None)` if no chapter is left.
pub fn parse(
    text: &str,
    options: &ParseOptions,
    defaults: &ChapterDefaults,
    uids: &mut UniqueIds,
) -> Result<Option<Chapters>> {
    let patterns = Patterns::new()?;

    let min_ms = options.min / NS_PER_MS;
    let max_ms = options.max.map(|max| max / NS_PER_MS);
    let offset_ms = options.offset / NS_PER_MS;

    let language = options
        .language
        .as_deref()
        .filter(|l| !l.is_empty())
        .or(defaults.language.as_deref())
        .unwrap_or(DEFAULT_LANGUAGE)
        .to_string();

    let mut atoms = Vec::new();
    let mut pending: Option<(u64, u64, String)> = None;

    for (line_no, line) in content_lines(text) {
        match pending.take() {
            None => {
                let caps = patterns.timecode_line.captures(line).ok_or_else(|| {
                    ChapterError::parse(line_no, format!("'{}' is not a CHAPTERxx=... line.", line))
                })?;
                let hours = number(line_no, &caps[1])?;
                let minutes = number(line_no, &caps[2])?;
                let seconds = number(line_no, &caps[3])?;
                let msecs = number(line_no, &caps[4])?;
                if minutes > 59 {
                    return Err(ChapterError::parse(
                        line_no,
                        format!("Invalid minute: {}", minutes),
                    ));
                }
                if seconds > 59 {
                    return Err(ChapterError::parse(
                        line_no,
                        format!("Invalid second: {}", seconds),
                    ));
                }
                let start = hours
                    .checked_mul(3_600_000)
                    .and_then(|ms| ms.checked_add(minutes * 60_000 + seconds * 1000))
                    .and_then(|ms| ms.checked_add(msecs))
                    .ok_or_else(|| timecode_overflow(line_no, line))?;
                let start_ns = start
                    .saturating_sub(offset_ms)
                    .checked_mul(NS_PER_MS)
                    .ok_or_else(|| timecode_overflow(line_no, line))?;

                let raw = patterns
                    .timecode
                    .captures(line)
                    .map(|caps| caps[1].to_string())
                    .ok_or_else(|| {
                        ChapterError::parse(
                            line_no,
                            format!("'{}' is not a CHAPTERxx=... line.", line),
                        )
                    })?;
                pending = Some((start, start_ns, raw));
            }
            Some((start, start_ns, raw)) => {
                let caps = patterns.name_line.captures(line).ok_or_else(|| {
                    ChapterError::parse(
                        line_no,
                        format!("'{}' is not a CHAPTERxxNAME=... line.", line),
                    )
                })?;
                let name = match &caps[1] {
                    "" => raw,
                    name => name.to_string(),
                };

                let in_window = start >= min_ms && max_ms.map_or(true, |max| start <= max);
                if !in_window {
                    debug!("simple chapters: skipping '{}' at {} ms", name, start);
                    continue;
                }

                let mut display = ChapterDisplay::new(name, language.clone());
                display.country = defaults.country.clone();
                atoms.push(ChapterAtom {
                    uid: Some(uids.create(UidKind::Chapter)),
                    time_start: Some(start_ns),
                    displays: vec![display],
                    ..ChapterAtom::default()
                });
            }
        }
    }

    if atoms.is_empty() {
        return Ok(None);
    }
    debug!("simple chapters: parsed {} entries", atoms.len());

    Ok(Some(Chapters {
        editions: vec![Edition {
            atoms,
            ..Edition::default()
        }],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "CHAPTER01=00:00:00.000\n\
                          CHAPTER01NAME=Intro\n\
                          \n\
                          CHAPTER02=00:01:30.500\n\
                          CHAPTER02NAME=\n\
                          CHAPTER03=01:00:00,250\n\
                          CHAPTER03NAME=Finale\n";

    fn parse_sample(options: &ParseOptions) -> Option<Chapters> {
        parse(
            SAMPLE,
            options,
            &ChapterDefaults::default(),
            &mut UniqueIds::with_seed(9),
        )
        .unwrap()
    }

    #[test]
    fn test_probe() {
        assert!(probe(SAMPLE));
        assert!(probe("\n  CHAPTER1 = 0:0:0.0\nCHAPTER1NAME=x"));
        assert!(!probe("CHAPTER01=00:00:00.000\nCHAPTER02=00:00:01.000"));
        assert!(!probe("CHAPTER01=00:00:00.000"));
        assert!(!probe("FILE \"a.wav\" WAVE"));
    }

    #[test]
    fn test_parse_sample() {
        let chapters = parse_sample(&ParseOptions::default()).unwrap();
        let atoms = &chapters.editions[0].atoms;
        assert_eq!(atoms.len(), 3);
        assert_eq!(atoms[0].time_start, Some(0));
        assert_eq!(atoms[1].time_start, Some(90_500 * NS_PER_MS));
        assert_eq!(atoms[2].time_start, Some(3_600_250 * NS_PER_MS));
        assert_eq!(atoms[0].name(), "Intro");
        // empty names fall back to the raw timecode
        assert_eq!(atoms[1].name(), "00:01:30.500");
        assert_eq!(atoms[0].displays[0].language.as_deref(), Some("eng"));
        assert!(atoms.iter().all(|a| a.uid.is_some()));
        assert_ne!(atoms[0].uid, atoms[1].uid);
    }

    #[test]
    fn test_window_and_offset() {
        let options = ParseOptions {
            min: 60_000 * NS_PER_MS,
            max: Some(120_000 * NS_PER_MS),
            offset: 60_000 * NS_PER_MS,
            language: Some("ger".to_string()),
        };
        let chapters = parse_sample(&options).unwrap();
        let atoms = &chapters.editions[0].atoms;
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].time_start, Some(30_500 * NS_PER_MS));
        assert_eq!(atoms[0].displays[0].language.as_deref(), Some("ger"));
    }

    #[test]
    fn test_nothing_in_window() {
        let options = ParseOptions {
            min: 10_000_000 * NS_PER_MS,
            ..ParseOptions::default()
        };
        assert!(parse_sample(&options).is_none());
    }

    #[test]
    fn test_defaults_supply_language_and_country() {
        let defaults = ChapterDefaults {
            language: Some("fre".to_string()),
            country: Some("fr".to_string()),
        };
        let chapters = parse(
            SAMPLE,
            &ParseOptions::default(),
            &defaults,
            &mut UniqueIds::with_seed(1),
        )
        .unwrap()
        .unwrap();
        let display = &chapters.editions[0].atoms[0].displays[0];
        assert_eq!(display.language.as_deref(), Some("fre"));
        assert_eq!(display.country.as_deref(), Some("fr"));
    }

    #[test]
    fn test_invalid_minute() {
        let text = "CHAPTER01=00:61:00.000\nCHAPTER01NAME=x\n";
        let err = parse(
            text,
            &ParseOptions::default(),
            &ChapterDefaults::default(),
            &mut UniqueIds::with_seed(1),
        )
        .unwrap_err();
        assert!(matches!(err, ChapterError::Parse { line: 1, .. }));
        assert!(err.to_string().contains("Invalid minute: 61"));
    }

    #[test]
    fn test_missing_name_line() {
        let text = "CHAPTER01=00:00:00.000\nCHAPTER02=00:00:05.000\n";
        let err = parse(
            text,
            &ParseOptions::default(),
            &ChapterDefaults::default(),
            &mut UniqueIds::with_seed(1),
        )
        .unwrap_err();
        assert!(matches!(err, ChapterError::Parse { line: 2, .. }));
    }

    fn parse_one(timecode: &str, options: &ParseOptions) -> Result<Option<Chapters>> {
        let text = format!("CHAPTER01={}\nCHAPTER01NAME=x\n", timecode);
        parse(
            &text,
            options,
            &ChapterDefaults::default(),
            &mut UniqueIds::with_seed(1),
        )
    }

    #[test]
    fn test_huge_timecode_fields_are_rejected() {
        for timecode in [
            "99999999999999999:00:00.000",
            "00:00:00.18446744073709551615",
            "99999999999999999999999:00:00.000",
            "6000000:00:00.000",
        ] {
            let err = parse_one(timecode, &ParseOptions::default()).unwrap_err();
            assert!(
                matches!(err, ChapterError::Parse { line: 1, .. }),
                "{}: {:?}",
                timecode,
                err
            );
        }
    }

    #[test]
    fn test_offset_brings_large_timecode_into_range() {
        let options = ParseOptions {
            offset: 1_000_000 * 3_600 * NS_PER_MS * 1000,
            ..ParseOptions::default()
        };
        let chapters = parse_one("6000000:00:00.000", &options).unwrap().unwrap();
        assert_eq!(
            chapters.editions[0].atoms[0].time_start,
            Some(5_000_000 * 3_600 * 1_000_000_000)
        );
    }

    #[test]
    fn test_large_hours_within_range() {
        let chapters = parse_one("6000:00:00.000", &ParseOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(
            chapters.editions[0].atoms[0].time_start,
            Some(6000 * 3_600 * 1_000_000_000)
        );
    }
}
