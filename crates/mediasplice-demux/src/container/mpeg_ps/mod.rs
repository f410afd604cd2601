//! MPEG program stream demuxer.
//!
//! Opening a reader runs the classification phase: the first
//! [`PsConfig::probe_size`] bytes are walked header by header, and the first
//! packet of every new stream id is handed to the matching codec sniffer.
//! Streams no sniffer accepts are blacklisted. Afterwards the tracks are
//! sorted (video, audio, subtitles, other; then by id) and their timestamp
//! offsets are made relative to the earliest one.
//!
//! The read phase then pulls one PES packet per [`Reader::read`] call and
//! routes its payload to the track's sink.

pub mod pes;
pub mod track;

use std::collections::{HashMap, HashSet};
use std::io::{self, Read, Seek, SeekFrom};

use tracing::{debug, info, trace};

use self::pes::{EsMap, PesHeader, PesOutcome, StreamMapHint};
use self::track::{PsTrack, PsTrackId, ReassemblyBuffer};
use super::Reader;
use crate::codec::mpeg_video::{self, VideoKind, VideoKindScanner};
use crate::codec::{ac3, avc, dts, is_start_code, mpeg_audio, vc1, Sniff};
use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::sink::FrameSink;
use crate::types::{Codec, FileStatus, Identification, TrackInfo, TrackKind, TrackParams};

pub use self::pes::{PACK_HEADER, PROGRAM_END, PROGRAM_STREAM_MAP, SYSTEM_HEADER};

/// Default classification look-ahead.
pub const DEFAULT_PROBE_SIZE: u64 = 10 * 1024 * 1024;

const MPEG_VIDEO_BUFFER: usize = 128_000;
const AVC_BUFFER: usize = 256_000;
const VC1_BUFFER: usize = 512_000;

/// Settings for the program stream demuxer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsConfig {
    /// Bytes from the start of the file examined during classification.
    pub probe_size: u64,
}

impl Default for PsConfig {
    fn default() -> Self {
        Self {
            probe_size: DEFAULT_PROBE_SIZE,
        }
    }
}

/// Check whether the source starts with a pack header.
///
/// Never fails; the source position is restored.
pub fn probe<S: Read + Seek>(source: &mut S) -> bool {
    let Ok(start) = source.stream_position() else {
        return false;
    };
    let mut magic = [0u8; 4];
    let found = source.seek(SeekFrom::Start(0)).is_ok()
        && source.read_exact(&mut magic).is_ok()
        && u32::from_be_bytes(magic) == PACK_HEADER;
    source.seek(SeekFrom::Start(start)).is_ok() && found
}

/// Codec family a new stream id is tried as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidate {
    Video,
    Vc1,
    MpegAudio,
    Ac3,
    Dts,
    Pcm,
    VobSub,
}

fn candidate_for(id: PsTrackId) -> Option<(TrackKind, Candidate)> {
    match (id.id, id.sub_id) {
        (pes::PRIVATE_STREAM_1, 0x20..=0x3f) => Some((TrackKind::Subtitle, Candidate::VobSub)),
        (pes::PRIVATE_STREAM_1, 0x80..=0x87 | 0xc0..=0xc7) => {
            Some((TrackKind::Audio, Candidate::Ac3))
        }
        (pes::PRIVATE_STREAM_1, 0x88..=0x9f) => Some((TrackKind::Audio, Candidate::Dts)),
        (pes::PRIVATE_STREAM_1, 0xa0..=0xa7) => Some((TrackKind::Audio, Candidate::Pcm)),
        (0xc0..=0xdf, _) => Some((TrackKind::Audio, Candidate::MpegAudio)),
        (0xe0..=0xef, _) => Some((TrackKind::Video, Candidate::Video)),
        (pes::EXTENDED_STREAM, _) => Some((TrackKind::Video, Candidate::Vc1)),
        _ => None,
    }
}

/// What a successful sniffer run contributes to a new track.
struct Classified {
    codec: Codec,
    params: TrackParams,
    buffer_size: Option<usize>,
    provides_timestamps: bool,
}

impl Classified {
    fn audio(codec: Codec, params: crate::types::AudioParams) -> Self {
        Self {
            codec,
            params: TrackParams::Audio(params),
            buffer_size: None,
            provides_timestamps: true,
        }
    }

    fn video(codec: Codec, params: crate::types::VideoParams, buffer_size: usize) -> Self {
        Self {
            codec,
            params: TrackParams::Video(params),
            buffer_size: Some(buffer_size),
            provides_timestamps: codec == Codec::Vc1,
        }
    }
}

/// MPEG-1/2 program stream reader.
pub struct MpegPsReader<R> {
    io: ByteCursor<R>,
    config: PsConfig,
    /// Program stream version from the first pack header.
    version: Option<u8>,
    es_map: EsMap,
    tracks: Vec<PsTrack>,
    id2idx: HashMap<u16, usize>,
    blacklisted: HashSet<u16>,
    /// Earliest timestamp across all tracks, subtracted while reading.
    global_offset: i64,
    done: bool,
}

impl<R: Read + Seek> MpegPsReader<R> {
    pub fn new(source: R) -> Result<Self> {
        Self::with_config(source, PsConfig::default())
    }

    /// Open a source and run the classification phase.
    ///
    /// Only structural errors such as scrambled payloads fail; streams that
    /// cannot be classified are silently dropped.
    pub fn with_config(source: R, config: PsConfig) -> Result<Self> {
        let mut reader = Self {
            io: ByteCursor::new(source)?,
            config,
            version: None,
            es_map: EsMap::default(),
            tracks: Vec::new(),
            id2idx: HashMap::new(),
            blacklisted: HashSet::new(),
            global_offset: 0,
            done: false,
        };

        reader.classify_streams()?;
        reader.sort_tracks();
        reader.normalize_timestamp_offsets();
        reader.io.seek_to(0)?;

        info!("Using the MPEG PS demultiplexer");
        Ok(reader)
    }

    /// 1 or 2 once a pack header was seen.
    pub fn version(&self) -> Option<u8> {
        self.version
    }

    pub fn stream_map_hint(&self, id: u8) -> Option<StreamMapHint> {
        self.es_map.get(id)
    }

    pub fn is_blacklisted(&self, id: PsTrackId) -> bool {
        self.blacklisted.contains(&id.idx())
    }

    /// Classified tracks in sorted order.
    pub fn ps_tracks(&self) -> &[PsTrack] {
        &self.tracks
    }

    // ---- classification phase ----

    fn classify_streams(&mut self) -> Result<()> {
        let mut header = match self.io.read_u32_be() {
            Ok(header) => header,
            Err(_) => return Ok(()),
        };
        let mut done = self.io.eof();

        while !done {
            match self.classify_step(header) {
                Ok(Some(next)) => header = next,
                Ok(None) => break,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("mpeg_ps: header reading phase stopped: {}", e);
                    break;
                }
            }
            done = self.io.eof() || self.io.position() >= self.config.probe_size;
        }
        Ok(())
    }

    /// Handle one header during classification and return the next one.
    fn classify_step(&mut self, header: u32) -> Result<Option<u32>> {
        match header {
            PACK_HEADER => {
                trace!("mpeg_ps: pack header at {}", self.io.position() - 4);
                self.skip_pack_header()?;
                Ok(Some(self.io.read_u32_be()?))
            }
            SYSTEM_HEADER => {
                trace!("mpeg_ps: system header at {}", self.io.position() - 4);
                self.skip_system_header()?;
                Ok(Some(self.io.read_u32_be()?))
            }
            PROGRAM_END => Ok(self.resync(header, Some(self.config.probe_size))),
            PROGRAM_STREAM_MAP => {
                pes::parse_program_stream_map(&mut self.io, &mut self.es_map)?;
                Ok(Some(self.io.read_u32_be()?))
            }
            _ if !is_start_code(header) => {
                trace!(
                    "mpeg_ps: unknown header 0x{:08x} at {}",
                    header,
                    self.io.position() - 4
                );
                Ok(self.resync(header, Some(self.config.probe_size)))
            }
            _ => {
                let stream_id = header as u8;
                self.io.save_pos();
                let found = self.found_new_stream(stream_id);
                self.io.restore_pos()?;
                found?;

                let length = self.io.read_u16_be()?;
                trace!(
                    "mpeg_ps: id 0x{:02x} len {} at {}",
                    stream_id,
                    length,
                    self.io.position() - 6
                );
                self.io.skip(i64::from(length))?;
                Ok(Some(self.io.read_u32_be()?))
            }
        }
    }

    fn skip_pack_header(&mut self) -> io::Result<()> {
        let version = match self.version {
            Some(version) => version,
            None => {
                let byte = self.io.read_u8()?;
                self.io.skip(-1)?;
                let version = if byte & 0xc0 != 0 { 2 } else { 1 };
                self.version = Some(version);
                version
            }
        };

        self.io.skip(8)?;
        if version == 2 {
            self.io.skip(1)?;
            let stuffing = self.io.read_u8()? & 0x07;
            self.io.skip(i64::from(stuffing))?;
        }
        Ok(())
    }

    fn skip_system_header(&mut self) -> io::Result<()> {
        self.io.skip(8)?;
        // P-STD entries start with a byte that has the high bit set
        while self.io.read_u8()? & 0x80 == 0x80 {
            self.io.skip(2)?;
        }
        self.io.skip(-1)
    }

    /// Shift bytes into `header` until it holds a start code. Gives up at
    /// the end of the source or when passing `limit`.
    fn resync(&mut self, mut header: u32, limit: Option<u64>) -> Option<u32> {
        debug!(
            "mpeg_ps: synchronisation lost at {}; looking for start code",
            self.io.position()
        );
        loop {
            if limit.is_some_and(|limit| self.io.position() >= limit) {
                debug!("mpeg_ps: resync failed: probe range exhausted");
                return None;
            }
            match self.io.read_u8() {
                Ok(byte) => header = (header << 8) | u32::from(byte),
                Err(e) => {
                    debug!("mpeg_ps: resync failed: {}", e);
                    return None;
                }
            }
            if is_start_code(header) {
                debug!(
                    "mpeg_ps: resync succeeded at {}, header 0x{:08x}",
                    self.io.position() - 4,
                    header
                );
                return Some(header);
            }
        }
    }

    fn blacklist(&mut self, id: PsTrackId, reason: &str) {
        debug!("mpeg_ps: blacklisting id {}: {}", id, reason);
        self.blacklisted.insert(id.idx());
    }

    /// Look at the packet following a start code during classification.
    /// The caller restores the position afterwards.
    fn found_new_stream(&mut self, stream_id: u8) -> Result<()> {
        trace!("mpeg_ps: stream id 0x{:02x}", stream_id);

        if !matches!(stream_id, 0xc0..=0xef | pes::PRIVATE_STREAM_1 | pes::EXTENDED_STREAM) {
            return Ok(());
        }

        let header = match pes::parse_packet(&mut self.io, stream_id) {
            Ok(PesOutcome::Payload(header)) => header,
            Ok(PesOutcome::Rejected { id, .. }) => {
                self.blacklist(id, "unusable packet header");
                return Ok(());
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.blacklist(PsTrackId::new(stream_id, 0), &e.to_string());
                return Ok(());
            }
        };
        let id = header.id;

        if stream_id == pes::PRIVATE_STREAM_1 {
            trace!("mpeg_ps: audio substream id 0x{:02x}", id.sub_id);
            if id.sub_id == 0 {
                return Ok(());
            }
        }

        if self.blacklisted.contains(&id.idx()) {
            return Ok(());
        }

        if let Some(&index) = self.id2idx.get(&id.idx()) {
            self.tracks[index].note_timestamp(header.timestamp);
            return Ok(());
        }

        let Some((kind, candidate)) = candidate_for(id) else {
            return Ok(());
        };

        debug!("mpeg_ps: new stream {} ({:?})", id, candidate);
        let payload = match self.io.read_vec(header.length) {
            Ok(payload) => payload,
            Err(e) => {
                self.blacklist(id, &e.to_string());
                return Ok(());
            }
        };

        let sniffed = match candidate {
            Candidate::Video => self.sniff_video(id, payload)?,
            Candidate::Vc1 => self.sniff_stream(id, payload, |window| {
                vc1::parse_sequence(window)
                    .map(|(_, params)| Classified::video(Codec::Vc1, params, VC1_BUFFER))
            })?,
            Candidate::MpegAudio => self.sniff_stream(id, payload, |window| {
                mpeg_audio::sniff(window)
                    .map(|(header, params)| Classified::audio(Codec::MpegAudio(header.layer), params))
            })?,
            Candidate::Ac3 => self.sniff_stream(id, payload, |window| {
                ac3::sniff(window).map(|(header, params)| {
                    debug!(
                        "mpeg_ps: first ac3 header bsid {} channels {} sample_rate {} bytes {} samples {}",
                        header.bsid, header.channels, header.sample_rate, header.bytes, header.samples
                    );
                    let codec = if header.is_eac3() { Codec::EAc3 } else { Codec::Ac3 };
                    Classified::audio(codec, params)
                })
            })?,
            Candidate::Dts => self.sniff_stream(id, payload, |window| {
                dts::sniff(window).map(|(_, params)| Classified::audio(Codec::Dts, params))
            })?,
            Candidate::Pcm | Candidate::VobSub => Sniff::Failed("unsupported track type"),
        };

        match sniffed {
            Sniff::Found(classified) => {
                let index = self.tracks.len();
                self.tracks.push(PsTrack {
                    id,
                    kind,
                    codec: classified.codec,
                    params: classified.params,
                    timestamp_offset: header.timestamp,
                    provides_timestamps: classified.provides_timestamps,
                    buffer: classified.buffer_size.map(ReassemblyBuffer::new),
                    sink: None,
                });
                self.id2idx.insert(id.idx(), index);
            }
            Sniff::NeedMore => self.blacklist(id, "probe range exhausted"),
            Sniff::Failed(reason) => self.blacklist(id, reason),
        }
        Ok(())
    }

    /// Feed payloads of `id` to `sniffer` until it stops asking for more.
    fn sniff_stream<T>(
        &mut self,
        id: PsTrackId,
        first: Vec<u8>,
        sniffer: impl Fn(&[u8]) -> Sniff<T>,
    ) -> Result<Sniff<T>> {
        let mut window = first;
        loop {
            match sniffer(&window) {
                Sniff::NeedMore => {}
                other => return Ok(other),
            }
            match self.next_payload_for(id)? {
                Some(more) => window.extend_from_slice(&more),
                None => return Ok(Sniff::NeedMore),
            }
        }
    }

    /// Decide between AVC and MPEG-1/2 first, then extract parameters.
    fn sniff_video(&mut self, id: PsTrackId, first: Vec<u8>) -> Result<Sniff<Classified>> {
        let mut scanner = VideoKindScanner::new();
        let mut kind = scanner.feed(&first);
        let mut window = first;

        while kind.is_none() {
            let Some(more) = self.next_payload_for(id)? else {
                break;
            };
            kind = scanner.feed(&more);
            window.extend_from_slice(&more);
        }

        let kind = kind.or_else(|| match self.es_map.get(id.id) {
            Some(StreamMapHint::Avc) => Some(VideoKind::Avc),
            Some(StreamMapHint::Mpeg1Video | StreamMapHint::Mpeg2Video) => Some(VideoKind::Mpeg12),
            _ => None,
        });
        let Some(kind) = kind else {
            return Ok(Sniff::Failed("no AVC or MPEG-1/2 signature"));
        };
        debug!("mpeg_ps: stream {} looks like {:?}", id, kind);

        self.sniff_stream(id, window, move |window| match kind {
            VideoKind::Mpeg12 => mpeg_video::parse_sequence(window).map(|info| {
                Classified::video(Codec::MpegVideo(info.version), info.params, MPEG_VIDEO_BUFFER)
            }),
            VideoKind::Avc => avc::parse_avc(window)
                .map(|(_, params)| Classified::video(Codec::Avc, params, AVC_BUFFER)),
        })
    }

    /// Payload of the next packet carrying exactly `id`, within the probe
    /// range. Packets of other streams are skipped.
    fn next_payload_for(&mut self, id: PsTrackId) -> Result<Option<Vec<u8>>> {
        let limit = Some(self.config.probe_size);
        loop {
            let stream_id = match self.find_next_packet(limit) {
                Ok(Some(stream_id)) => stream_id,
                Ok(None) | Err(_) => return Ok(None),
            };
            let packet_pos = self.io.position() - 4;

            if stream_id != id.id {
                let skipped = self
                    .io
                    .read_u16_be()
                    .and_then(|length| self.io.skip(i64::from(length)));
                if skipped.is_err() {
                    return Ok(None);
                }
                continue;
            }

            let header = match pes::parse_packet(&mut self.io, stream_id) {
                Ok(PesOutcome::Payload(header)) => header,
                Ok(PesOutcome::Rejected { full_length, .. }) => {
                    if self.skip_packet(packet_pos, full_length).is_err() {
                        return Ok(None);
                    }
                    continue;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => return Ok(None),
            };

            if header.id != id {
                if self.skip_packet(packet_pos, header.full_length).is_err() {
                    return Ok(None);
                }
                continue;
            }
            return Ok(self.io.read_vec(header.length).ok());
        }
    }

    fn skip_packet(&mut self, packet_pos: u64, full_length: usize) -> io::Result<()> {
        self.io.seek_to(packet_pos + 4 + 2 + full_length as u64)
    }

    /// Scan to the next PES packet start code and return its stream id.
    ///
    /// A program end code triggers a resync and the bytes after the new
    /// start code are then read as a program stream map.
    fn find_next_packet(&mut self, limit: Option<u64>) -> io::Result<Option<u8>> {
        let mut header = self.io.read_u32_be()?;
        loop {
            if limit.is_some_and(|limit| self.io.position() > limit) {
                return Ok(None);
            }

            match header {
                PACK_HEADER => {
                    self.skip_pack_header()?;
                    header = self.io.read_u32_be()?;
                }
                SYSTEM_HEADER => {
                    self.skip_system_header()?;
                    header = self.io.read_u32_be()?;
                }
                PROGRAM_END | PROGRAM_STREAM_MAP => {
                    if header == PROGRAM_END && self.resync(header, limit).is_none() {
                        return Ok(None);
                    }
                    pes::parse_program_stream_map(&mut self.io, &mut self.es_map)?;
                    header = self.io.read_u32_be()?;
                }
                _ if !is_start_code(header) => match self.resync(header, limit) {
                    Some(next) => header = next,
                    None => return Ok(None),
                },
                _ => return Ok(Some(header as u8)),
            }
        }
    }

    // ---- post-classification ----

    fn sort_tracks(&mut self) {
        self.tracks.sort_by_key(PsTrack::sort_key);
        self.id2idx = self
            .tracks
            .iter()
            .enumerate()
            .map(|(index, track)| (track.id.idx(), index))
            .collect();

        let ids: Vec<String> = self.tracks.iter().map(|t| t.id.to_string()).collect();
        debug!("mpeg_ps: supported streams, sorted by ID: {}", ids.join(" "));
    }

    fn normalize_timestamp_offsets(&mut self) {
        let Some(min) = self.tracks.iter().filter_map(|t| t.timestamp_offset).min() else {
            return;
        };
        self.global_offset = min;
        for track in &mut self.tracks {
            if let Some(offset) = track.timestamp_offset.as_mut() {
                *offset -= min;
            }
        }

        let offsets: Vec<String> = self
            .tracks
            .iter()
            .map(|t| format!("{}={:?}", t.id, t.timestamp_offset))
            .collect();
        debug!(
            "mpeg_ps: timestamp offset: min was {} {}",
            min,
            offsets.join(" ")
        );
    }

    // ---- read phase ----

    fn process_packet(&mut self, packet_pos: u64, header: PesHeader) -> Result<bool> {
        let Some(&index) = self.id2idx.get(&header.id.idx()) else {
            self.skip_packet(packet_pos, header.full_length)?;
            return Ok(false);
        };
        if self.tracks[index].sink.is_none() {
            self.skip_packet(packet_pos, header.full_length)?;
            return Ok(false);
        }

        trace!(
            "mpeg_ps: packet for {} length {} at {} timestamp {:?}",
            header.id,
            header.length,
            packet_pos,
            header.timestamp
        );

        let timestamp = header
            .timestamp
            .map(|ts| ts - self.global_offset)
            .filter(|ts| *ts >= 0);

        match self.io.read_vec(header.length) {
            Ok(payload) => {
                self.tracks[index].process_payload(payload, timestamp);
                Ok(true)
            }
            Err(e) => {
                debug!("mpeg_ps: file_done: short read: {}", e);
                Ok(false)
            }
        }
    }

    fn read_packet(&mut self) -> Result<FileStatus> {
        loop {
            let stream_id = match self.find_next_packet(None) {
                Ok(Some(stream_id)) => stream_id,
                Ok(None) => {
                    debug!("mpeg_ps: file_done: no further packet");
                    return Ok(self.finish());
                }
                Err(e) => {
                    debug!("mpeg_ps: file_done: {}", e);
                    return Ok(self.finish());
                }
            };
            let packet_pos = self.io.position() - 4;

            let header = match pes::parse_packet(&mut self.io, stream_id) {
                Ok(PesOutcome::Payload(header)) => header,
                Ok(PesOutcome::Rejected { full_length, .. }) => {
                    trace!(
                        "mpeg_ps: packet_parse failed at {}, skipping {}",
                        packet_pos,
                        full_length
                    );
                    self.skip_packet(packet_pos, full_length)?;
                    continue;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("mpeg_ps: file_done: {}", e);
                    return Ok(self.finish());
                }
            };

            let length = header.length;
            if self.process_packet(packet_pos, header)? {
                return Ok(FileStatus::MoreData);
            }
            if self.io.eof() {
                return Ok(self.finish());
            }
            trace!("mpeg_ps: skipped {} payload bytes", length);
        }
    }
}

impl<R: Read + Seek> Reader for MpegPsReader<R> {
    fn identify(&self) -> Identification {
        let container = match self.version {
            Some(version) => format!("MPEG-{} program stream (PS)", version),
            None => "MPEG program stream (PS)".to_string(),
        };
        let mut id = Identification::new(container);

        for track in &self.tracks {
            let mut properties = Vec::new();
            if let TrackParams::Video(video) = &track.params {
                if video.aspect_ratio.is_some() {
                    properties.push((
                        "display_dimensions".to_string(),
                        format!("{}x{}", video.display_width, video.display_height),
                    ));
                }
            }
            if track.codec == Codec::Avc {
                properties.push(("packetizer".to_string(), "mpeg4_p10_es_video".to_string()));
            }
            properties.push(("stream_id".to_string(), format!("{:02x}", track.id.id)));
            properties.push((
                "sub_stream_id".to_string(),
                format!("{:02x}", track.id.sub_id),
            ));
            id.add_track(track.kind, track.codec.name(), properties);
        }
        id
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        self.tracks
            .iter()
            .enumerate()
            .map(|(index, track)| track.info(index))
            .collect()
    }

    fn set_sink(&mut self, track: usize, sink: Box<dyn FrameSink>) -> Result<()> {
        let count = self.tracks.len();
        let slot = self
            .tracks
            .get_mut(track)
            .ok_or(Error::InvalidTrack { index: track, count })?;
        slot.sink = Some(sink);
        Ok(())
    }

    fn read(&mut self) -> Result<FileStatus> {
        if self.done {
            return Ok(FileStatus::Done);
        }
        self.read_packet()
    }

    fn finish(&mut self) -> FileStatus {
        if self.done {
            return FileStatus::Done;
        }
        for track in &mut self.tracks {
            track.drain();
        }
        self.done = true;
        for track in &mut self.tracks {
            if let Some(sink) = track.sink.as_mut() {
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
