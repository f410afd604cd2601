//! Track, frame and identification types shared by all demuxers.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Media kind of a track. The declaration order is the sort order used
/// when tracks are handed downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum TrackKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

impl TrackKind {
    /// High bits of the composite track sort key.
    pub fn sort_bucket(self) -> u32 {
        match self {
            TrackKind::Video => 0x00000,
            TrackKind::Audio => 0x10000,
            TrackKind::Subtitle => 0x20000,
            TrackKind::Other => 0x30000,
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Video => write!(f, "video"),
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Subtitle => write!(f, "subtitles"),
            TrackKind::Other => write!(f, "other"),
        }
    }
}

/// Codec carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Codec {
    /// MPEG-1 (1) or MPEG-2 (2) video.
    MpegVideo(u8),
    /// AVC/h.264 elementary stream.
    Avc,
    /// VC-1 advanced profile.
    Vc1,
    /// MPEG-1/2 audio layer 1, 2 or 3.
    MpegAudio(u8),
    Ac3,
    EAc3,
    Dts,
    Pcm,
    VobSub,
    Tta,
}

impl Codec {
    /// Four character code for the codec.
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            Codec::MpegVideo(version) => [b'M', b'P', b'G', b'0' + version],
            Codec::Avc => *b"AVC1",
            Codec::Vc1 => *b"WVC1",
            Codec::MpegAudio(layer) => [b'M', b'P', b'0' + layer, b' '],
            Codec::Ac3 | Codec::EAc3 => *b"AC3 ",
            Codec::Dts => *b"DTS ",
            Codec::Pcm => *b"PCM ",
            Codec::VobSub => *b"VSUB",
            Codec::Tta => *b"TTA1",
        }
    }

    /// Human readable codec name as used in identification output.
    pub fn name(self) -> &'static str {
        match self {
            Codec::MpegVideo(1) => "MPEG-1",
            Codec::MpegVideo(_) => "MPEG-2",
            Codec::Avc => "AVC/h.264",
            Codec::Vc1 => "VC1",
            Codec::MpegAudio(1) => "MPEG-1 layer 1",
            Codec::MpegAudio(2) => "MPEG-1 layer 2",
            Codec::MpegAudio(_) => "MPEG-1 layer 3",
            Codec::Ac3 => "AC3",
            Codec::EAc3 => "EAC3",
            Codec::Dts => "DTS",
            Codec::Pcm => "PCM",
            Codec::VobSub => "VobSub",
            Codec::Tta => "TTA",
        }
    }

    /// File extension for a raw dump of the elementary stream.
    pub fn file_extension(self) -> &'static str {
        match self {
            Codec::MpegVideo(1) => "m1v",
            Codec::MpegVideo(_) => "m2v",
            Codec::Avc => "h264",
            Codec::Vc1 => "vc1",
            Codec::MpegAudio(1) => "mp1",
            Codec::MpegAudio(2) => "mp2",
            Codec::MpegAudio(_) => "mp3",
            Codec::Ac3 => "ac3",
            Codec::EAc3 => "eac3",
            Codec::Dts => "dts",
            Codec::Pcm => "pcm",
            Codec::VobSub => "sub",
            Codec::Tta => "tta",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Video parameters extracted by a sniffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoParams {
    pub width: u32,
    pub height: u32,
    pub display_width: u32,
    pub display_height: u32,
    pub frame_rate: Option<f64>,
    /// Display aspect ratio, if the stream signals one.
    pub aspect_ratio: Option<f64>,
    /// Codec private data (raw sequence header, avcC record).
    pub codec_private: Option<Bytes>,
}

/// Audio parameters extracted by a sniffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioParams {
    pub channels: u32,
    pub sample_rate: u32,
    pub bits_per_sample: Option<u32>,
    /// AC-3 bitstream id.
    pub bsid: Option<u8>,
    /// Raw codec header of the first frame.
    pub codec_header: Option<Bytes>,
}

/// Kind specific track parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackParams {
    Video(VideoParams),
    Audio(AudioParams),
    None,
}

impl TrackParams {
    pub fn video(&self) -> Option<&VideoParams> {
        match self {
            TrackParams::Video(v) => Some(v),
            _ => None,
        }
    }

    pub fn audio(&self) -> Option<&AudioParams> {
        match self {
            TrackParams::Audio(a) => Some(a),
            _ => None,
        }
    }
}

/// A classified track as exposed by a reader.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    /// Position in the reader's sorted track list.
    pub index: usize,
    pub kind: TrackKind,
    pub codec: Codec,
    pub params: TrackParams,
    /// Offset of the track's first timestamp relative to the earliest
    /// track, in nanoseconds.
    pub timestamp_offset: Option<i64>,
}

/// Side channel data attached to a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameExtension {
    /// Source timestamps coalesced into one buffered frame, each paired with
    /// the byte offset inside the frame where its payload started.
    MultipleTimestamps(Vec<(i64, usize)>),
}

/// A demuxed frame. Timestamps and durations are in nanoseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub data: Bytes,
    /// Absent timestamps are derived downstream from context.
    pub timestamp: Option<i64>,
    pub duration: Option<i64>,
    pub extensions: Vec<FrameExtension>,
}

impl Frame {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            timestamp: None,
            duration: None,
            extensions: Vec::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: Option<i64>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_duration(mut self, duration: Option<i64>) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_extension(mut self, extension: FrameExtension) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Outcome of a single `read` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    MoreData,
    Done,
}

/// Summary of one track for "identify" mode.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TrackSummary {
    pub id: usize,
    pub kind: TrackKind,
    pub codec: String,
    pub properties: BTreeMap<String, String>,
}

/// Container and track summary produced without demuxing.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Identification {
    pub container: String,
    pub tracks: Vec<TrackSummary>,
}

impl Identification {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            tracks: Vec::new(),
        }
    }

    pub fn add_track(
        &mut self,
        kind: TrackKind,
        codec: impl Into<String>,
        properties: impl IntoIterator<Item = (String, String)>,
    ) {
        let id = self.tracks.len();
        self.tracks.push(TrackSummary {
            id,
            kind,
            codec: codec.into(),
            properties: properties.into_iter().collect(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_buckets_follow_kind_order() {
        let kinds = [
            TrackKind::Video,
            TrackKind::Audio,
            TrackKind::Subtitle,
            TrackKind::Other,
        ];
        for pair in kinds.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].sort_bucket() < pair[1].sort_bucket());
        }
    }

    #[test]
    fn test_codec_fourcc_and_name() {
        assert_eq!(&Codec::MpegVideo(2).fourcc(), b"MPG2");
        assert_eq!(&Codec::MpegAudio(2).fourcc(), b"MP2 ");
        assert_eq!(Codec::EAc3.name(), "EAC3");
        assert_eq!(Codec::Avc.to_string(), "AVC/h.264");
    }

    #[test]
    fn test_identification_numbers_tracks() {
        let mut id = Identification::new("TTA");
        id.add_track(TrackKind::Audio, "TTA", Vec::new());
        id.add_track(
            TrackKind::Audio,
            "AC3",
            vec![("stream_id".to_string(), "bd".to_string())],
        );
        assert_eq!(id.tracks[1].id, 1);
        assert_eq!(id.tracks[1].properties["stream_id"], "bd");
    }
}
