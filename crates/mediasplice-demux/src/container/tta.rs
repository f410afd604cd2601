//! TTA lossless audio demuxer.
//!
//! A TTA file is a fixed 22 byte header followed by a seek table of frame
//! sizes, a 4 byte table checksum and the frames themselves. The seek table
//! has to account for every byte between the header and a trailing tag.

use std::io::{self, Read, Seek};

use tracing::{debug, info};

use super::{id3, Reader};
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::sink::FrameSink;
use crate::types::{
    AudioParams, Codec, FileStatus, Frame, Identification, TrackInfo, TrackKind, TrackParams,
};

pub const MAGIC: &[u8; 4] = b"TTA1";
pub const HEADER_SIZE: usize = 22;

/// Nominal duration of one TTA frame in seconds.
pub const FRAME_TIME: f64 = 1.044_897_959_183_673_469_39;

const MIN_FILE_SIZE: u64 = 26;

/// The fixed TTA file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtaHeader {
    pub audio_format: u16,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub sample_rate: u32,
    /// Total number of samples per channel.
    pub data_length: u32,
    pub crc: u32,
}

impl TtaHeader {
    fn parse(raw: &[u8; HEADER_SIZE]) -> Result<Self> {
        if &raw[..4] != MAGIC {
            return Err(Error::invalid_data("missing TTA1 signature"));
        }
        let u16_at = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        let header = Self {
            audio_format: u16_at(4),
            channels: u16_at(6),
            bits_per_sample: u16_at(8),
            sample_rate: u32_at(10),
            data_length: u32_at(14),
            crc: u32_at(18),
        };
        if header.sample_rate == 0 {
            return Err(Error::invalid_data("TTA header with a sample rate of 0"));
        }
        Ok(header)
    }
}

/// Check for a TTA file, optionally behind a leading ID3v2 tag.
///
/// Never fails; the source position is restored.
pub fn probe<S: Read + Seek>(source: &mut S) -> bool {
    let Ok(start) = source.stream_position() else {
        return false;
    };
    let found = probe_inner(&mut *source).unwrap_or(false);
    source.seek(io::SeekFrom::Start(start)).is_ok() && found
}

fn probe_inner<S: Read + Seek>(source: S) -> io::Result<bool> {
    let mut io = ByteCursor::new(source)?;
    if io.size() < MIN_FILE_SIZE {
        return Ok(false);
    }
    id3::skip_id3v2_tag(&mut io)?;
    let mut magic = [0u8; 4];
    io.read_exact(&mut magic)?;
    Ok(&magic == MAGIC)
}

pub struct TtaReader<R> {
    io: ByteCursor<R>,
    header: TtaHeader,
    seek_points: Vec<u32>,
    /// Index of the next frame to read.
    pos: usize,
    sink: Option<Box<dyn FrameSink>>,
    done: bool,
}

impl<R: Read + Seek> TtaReader<R> {
    /// Open and validate a TTA source.
    ///
    /// Fails with [`Error::BrokenSeekTable`] unless the seek table covers
    /// the payload exactly.
    pub fn new(source: R) -> Result<Self> {
        let mut io = ByteCursor::new(source)?;
        let tag_size = id3::skip_id3v2_tag(&mut io)?;

        let mut raw = [0u8; HEADER_SIZE];
        io.read_exact(&mut raw).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::invalid_data("The file header is too short"),
            _ => Error::Io(e),
        })?;
        let header = TtaHeader::parse(&raw)?;

        let trailing = id3::trailing_tag_size(&mut io)?;
        let size = io
            .size()
            .saturating_sub(tag_size)
            .saturating_sub(trailing);
        let mut seek_sum = io.position() + 4 - tag_size;

        let mut seek_points = Vec::new();
        loop {
            let point = match io.read_u32_le() {
                Ok(point) => point,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(Error::BrokenSeekTable {
                        sum: seek_sum,
                        expected: size,
                    })
                }
                Err(e) => return Err(e.into()),
            };
            seek_sum += u64::from(point) + 4;
            seek_points.push(point);
            if seek_sum >= size {
                break;
            }
        }

        debug!(
            channels = header.channels,
            bits_per_sample = header.bits_per_sample,
            sample_rate = header.sample_rate,
            data_length = header.data_length,
            seek_sum,
            size,
            frames = seek_points.len(),
            "tta: header parsed"
        );

        if seek_sum != size {
            return Err(Error::BrokenSeekTable {
                sum: seek_sum,
                expected: size,
            });
        }

        io.skip(4)?; // seek table checksum
        info!("Using the TTA demultiplexer");

        Ok(Self {
            io,
            header,
            seek_points,
            pos: 0,
            sink: None,
            done: false,
        })
    }

    pub fn header(&self) -> &TtaHeader {
        &self.header
    }

    pub fn seek_points(&self) -> &[u32] {
        &self.seek_points
    }

    /// Duration of the final frame in nanoseconds: whatever is left of the
    /// declared sample count after all earlier frames at nominal length.
    fn last_frame_duration(&self) -> i64 {
        let rate = f64::from(self.header.sample_rate);
        let earlier = self.seek_points.len().saturating_sub(1) as f64;
        let samples_left =
            (f64::from(self.header.data_length) - earlier * FRAME_TIME * rate).max(0.0);
        debug!(samples_left, "tta: last frame");
        (samples_left * 1_000_000_000.0 / rate).round() as i64
    }

    fn emit(&mut self, frame: Frame) {
        if let Some(sink) = self.sink.as_mut() {
            sink.process(frame);
        }
    }
}

impl<R: Read + Seek> Reader for TtaReader<R> {
    fn identify(&self) -> Identification {
        let mut id = Identification::new("TTA");
        id.add_track(
            TrackKind::Audio,
            Codec::Tta.name(),
            [
                ("channels".to_string(), self.header.channels.to_string()),
                ("sample_rate".to_string(), self.header.sample_rate.to_string()),
                (
                    "bits_per_sample".to_string(),
                    self.header.bits_per_sample.to_string(),
                ),
            ],
        );
        id
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        vec![TrackInfo {
            index: 0,
            kind: TrackKind::Audio,
            codec: Codec::Tta,
            params: TrackParams::Audio(AudioParams {
                channels: u32::from(self.header.channels),
                sample_rate: self.header.sample_rate,
                bits_per_sample: Some(u32::from(self.header.bits_per_sample)),
                bsid: None,
                codec_header: None,
            }),
            timestamp_offset: None,
        }]
    }

    fn set_sink(&mut self, track: usize, sink: Box<dyn FrameSink>) -> Result<()> {
        if track != 0 {
            return Err(Error::InvalidTrack {
                index: track,
                count: 1,
            });
        }
        self.sink = Some(sink);
        Ok(())
    }

    fn read(&mut self) -> Result<FileStatus> {
        if self.done || self.pos >= self.seek_points.len() {
            return Ok(self.finish());
        }

        let wanted = self.seek_points[self.pos] as usize;
        let data = self.io.read_up_to(wanted)?;
        if data.is_empty() {
            return Ok(self.finish());
        }
        self.pos += 1;

        let last = self.pos >= self.seek_points.len();
        let mut frame = Frame::new(data);
        if last {
            frame = frame.with_duration(Some(self.last_frame_duration()));
        }
        self.emit(frame);

        if last {
            return Ok(self.finish());
        }
        Ok(FileStatus::MoreData)
    }

    fn finish(&mut self) -> FileStatus {
        if !self.done {
            self.done = true;
            if let Some(sink) = self.sink.as_mut() {
                sink.flush();
            }
        }
        FileStatus::Done
    }

    fn progress(&self) -> u8 {
        if self.io.size() == 0 {
            return 100;
        }
        (self.io.position() * 100 / self.io.size()).min(100) as u8
    }
}
