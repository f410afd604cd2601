//! The chapter tree.
//!
//! Every element mirrors a Matroska chapter master. Optional fields model
//! elements that may be absent from a file; [`crate::fix`] fills in the
//! mandatory ones. Timecodes are in nanoseconds.

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Language assumed for displays that carry none.
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// Top level chapter container holding all editions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Chapters {
    pub editions: Vec<Edition>,
}

/// One complete, alternative list of chapters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Edition {
    pub uid: Option<u64>,
    pub flag_hidden: Option<bool>,
    pub flag_default: Option<bool>,
    pub flag_ordered: Option<bool>,
    pub atoms: Vec<ChapterAtom>,
}

/// A single chapter, possibly with nested sub-chapters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ChapterAtom {
    pub uid: Option<u64>,
    pub time_start: Option<u64>,
    pub time_end: Option<u64>,
    pub flag_hidden: Option<bool>,
    pub flag_enabled: Option<bool>,
    pub displays: Vec<ChapterDisplay>,
    pub track: Option<ChapterTrack>,
    pub processes: Vec<ChapterProcess>,
    /// Sub-chapters in playback order.
    pub children: Vec<ChapterAtom>,
}

/// A chapter name in one language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ChapterDisplay {
    pub string: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
}

/// Tracks a chapter applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ChapterTrack {
    pub track_numbers: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ChapterProcess {
    pub codec_id: Option<u64>,
    pub private: Option<Vec<u8>>,
    pub commands: Vec<ProcessCommand>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ProcessCommand {
    pub time: Option<u64>,
    pub data: Option<Vec<u8>>,
}

impl Chapters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.editions.is_empty()
    }

    /// Number of atoms at every nesting level across all editions.
    pub fn atom_count(&self) -> usize {
        fn count(atoms: &[ChapterAtom]) -> usize {
            atoms.iter().map(|a| 1 + count(&a.children)).sum()
        }
        self.editions.iter().map(|e| count(&e.atoms)).sum()
    }
}

impl Edition {
    pub fn with_uid(uid: u64) -> Self {
        Self {
            uid: Some(uid),
            ..Self::default()
        }
    }
}

impl ChapterAtom {
    /// Atom with a start and an optional end timecode.
    pub fn new(time_start: u64, time_end: Option<u64>) -> Self {
        Self {
            time_start: Some(time_start),
            time_end,
            ..Self::default()
        }
    }

    pub fn with_uid(mut self, uid: u64) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn with_display(mut self, display: ChapterDisplay) -> Self {
        self.displays.push(display);
        self
    }

    pub fn with_child(mut self, child: ChapterAtom) -> Self {
        self.children.push(child);
        self
    }

    /// Start timecode, or `default` if the atom has none.
    pub fn start_or(&self, default: u64) -> u64 {
        self.time_start.unwrap_or(default)
    }

    pub fn end(&self) -> Option<u64> {
        self.time_end
    }

    /// Name of the first display, or an empty string.
    pub fn name(&self) -> &str {
        self.displays
            .first()
            .and_then(|d| d.string.as_deref())
            .unwrap_or("")
    }
}

impl ChapterDisplay {
    pub fn new(string: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            string: Some(string.into()),
            language: Some(language.into()),
            country: None,
        }
    }
}
