//! # mediasplice-chapters
//!
//! Matroska style chapter trees and the edits applied to them when files
//! are split, joined or retimed.
//!
//! ## Features
//!
//! - Typed chapter model: editions, atoms, displays, tracks, processes
//! - Timeframe selection that keeps chapters spanning the window start
//! - Merging of sibling chapters sharing a UID
//! - UID lookup, moving atoms between trees by edition, timecode shifting
//! - Mandatory element normalization with a seedable unique ID registry
//! - OGM style simple chapter parsing
//!
//! ## Example
//!
//! ```
//! use mediasplice_chapters::{parse_chapters, ChapterDefaults, ParseOptions, UniqueIds};
//!
//! let text = "CHAPTER01=00:00:00.000\nCHAPTER01NAME=Intro\n\
//!             CHAPTER02=00:05:00.000\nCHAPTER02NAME=Main\n";
//! let mut uids = UniqueIds::with_seed(1);
//! let chapters = parse_chapters(text, &ParseOptions::default(), &ChapterDefaults::default(), &mut uids)
//!     .unwrap()
//!     .unwrap();
//!
//! let selected = chapters
//!     .select_in_timeframe(60_000_000_000, None, 60_000_000_000)
//!     .unwrap();
//! assert_eq!(selected.editions[0].atoms.len(), 2);
//! assert_eq!(selected.editions[0].atoms[1].time_start, Some(240_000_000_000));
//! ```

pub mod edit;
pub mod error;
pub mod fix;
pub mod lookup;
pub mod model;
pub mod parser;
pub mod uid;

pub use error::{ChapterError, Result};
pub use model::{
    ChapterAtom, ChapterDisplay, ChapterProcess, ChapterTrack, Chapters, Edition, ProcessCommand,
};
pub use parser::{
    detect_format, parse_chapter_file, parse_chapters, ChapterDefaults, ChapterFormat,
    ParseOptions,
};
pub use uid::{UidKind, UniqueIds};
