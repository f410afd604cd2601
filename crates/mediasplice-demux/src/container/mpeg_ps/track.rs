//! Program stream tracks and their reassembly buffers.

use std::fmt;

use bytes::BytesMut;

use crate::sink::FrameSink;
use crate::types::{Codec, Frame, FrameExtension, TrackInfo, TrackKind, TrackParams};

/// Stream id plus the private stream 1 / VC-1 sub stream id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PsTrackId {
    pub id: u8,
    pub sub_id: u8,
}

impl PsTrackId {
    pub fn new(id: u8, sub_id: u8) -> Self {
        Self { id, sub_id }
    }

    /// Combined 16 bit identifier.
    pub fn idx(self) -> u16 {
        (u16::from(self.id) << 8) | u16::from(self.sub_id)
    }
}

impl fmt::Display for PsTrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}(0x{:02x})", self.id, self.sub_id)
    }
}

/// Accumulates PES payloads of streams whose frames don't line up with
/// packet boundaries.
#[derive(Debug)]
pub struct ReassemblyBuffer {
    data: BytesMut,
    capacity: usize,
    timestamps: Vec<(i64, usize)>,
}

impl ReassemblyBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            capacity,
            timestamps: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether appending `additional` bytes requires a flush first.
    pub fn would_overflow(&self, additional: usize) -> bool {
        !self.is_empty() && self.data.len() + additional > self.capacity
    }

    /// Append a payload. A single payload larger than the capacity still
    /// fits; the buffer grows.
    pub fn push(&mut self, payload: &[u8], timestamp: Option<i64>) {
        if let Some(ts) = timestamp {
            self.timestamps.push((ts, self.data.len()));
        }
        self.data.extend_from_slice(payload);
    }

    /// Hand out the buffered bytes as one frame and reset.
    pub fn take_frame(&mut self) -> Option<Frame> {
        if self.is_empty() {
            return None;
        }
        let mut frame = Frame::new(self.data.split().freeze());
        if !self.timestamps.is_empty() {
            frame = frame.with_extension(FrameExtension::MultipleTimestamps(std::mem::take(
                &mut self.timestamps,
            )));
        }
        Some(frame)
    }
}

/// One classified elementary stream.
pub struct PsTrack {
    pub id: PsTrackId,
    pub kind: TrackKind,
    pub codec: Codec,
    pub params: TrackParams,
    /// Earliest timestamp seen while probing, later relative to the
    /// earliest track.
    pub timestamp_offset: Option<i64>,
    /// Whether PES timestamps are passed on with unbuffered frames.
    pub provides_timestamps: bool,
    pub buffer: Option<ReassemblyBuffer>,
    pub sink: Option<Box<dyn FrameSink>>,
}

impl fmt::Debug for PsTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PsTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("codec", &self.codec)
            .field("timestamp_offset", &self.timestamp_offset)
            .field("buffer", &self.buffer.as_ref().map(ReassemblyBuffer::len))
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl PsTrack {
    /// Media kind bucket in the high bits, stream id below.
    pub fn sort_key(&self) -> u32 {
        self.kind.sort_bucket() + u32::from(self.id.idx())
    }

    pub fn info(&self, index: usize) -> TrackInfo {
        TrackInfo {
            index,
            kind: self.kind,
            codec: self.codec,
            params: self.params.clone(),
            timestamp_offset: self.timestamp_offset,
        }
    }

    /// Lower the probe-time offset if `timestamp` is earlier.
    pub fn note_timestamp(&mut self, timestamp: Option<i64>) {
        if let Some(ts) = timestamp {
            if self.timestamp_offset.map_or(true, |offset| ts < offset) {
                self.timestamp_offset = Some(ts);
            }
        }
    }

    /// Route one payload either into the reassembly buffer or straight to
    /// the sink. `timestamp` is already offset-adjusted.
    pub fn process_payload(&mut self, payload: Vec<u8>, timestamp: Option<i64>) {
        match self.buffer.as_mut() {
            Some(buffer) => {
                if buffer.would_overflow(payload.len()) {
                    if let (Some(frame), Some(sink)) = (buffer.take_frame(), self.sink.as_mut()) {
                        sink.process(frame);
                    }
                }
                buffer.push(&payload, timestamp);
            }
            None => {
                let timestamp = if self.provides_timestamps {
                    timestamp
                } else {
                    None
                };
                if let Some(sink) = self.sink.as_mut() {
                    sink.process(Frame::new(payload).with_timestamp(timestamp));
                }
            }
        }
    }

    /// Emit whatever is left in the buffer.
    pub fn drain(&mut self) {
        let frame = self.buffer.as_mut().and_then(ReassemblyBuffer::take_frame);
        if let (Some(frame), Some(sink)) = (frame, self.sink.as_mut()) {
            sink.process(frame);
        }
    }
}
