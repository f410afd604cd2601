//! PES packet headers and program stream maps.

use std::io::{self, Read, Seek};

use tracing::trace;

use super::track::PsTrackId;
use crate::cursor::{BitCursor, ByteCursor};
use crate::error::{Error, Result};

pub const PACK_HEADER: u32 = 0x0000_01ba;
pub const SYSTEM_HEADER: u32 = 0x0000_01bb;
pub const PROGRAM_END: u32 = 0x0000_01b9;
pub const PROGRAM_STREAM_MAP: u32 = 0x0000_01bc;

pub const PRIVATE_STREAM_1: u8 = 0xbd;
pub const PADDING_STREAM: u8 = 0xbe;
pub const PRIVATE_STREAM_2: u8 = 0xbf;
pub const EXTENDED_STREAM: u8 = 0xfd;

const MAX_STREAM_MAP_LENGTH: u16 = 1018;

/// Convert a 90 kHz clock value to nanoseconds.
pub fn ticks_to_ns(ticks: i64) -> i64 {
    ticks * 100_000 / 9
}

/// Ids whose packets never carry elementary stream payload we can use.
pub fn is_rejected_id(id: u8) -> bool {
    id < 0xbc
        || (id >= 0xf0 && id != EXTENDED_STREAM)
        || id == PADDING_STREAM
        || id == PRIVATE_STREAM_2
}

/// A parsed PES header. The cursor sits at the start of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PesHeader {
    pub id: PsTrackId,
    /// Presentation timestamp in nanoseconds.
    pub timestamp: Option<i64>,
    /// Payload bytes following the header.
    pub length: usize,
    /// Value of the PES packet length field.
    pub full_length: usize,
}

/// Result of parsing one PES packet header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PesOutcome {
    Payload(PesHeader),
    /// The packet is unusable. `id` carries the sub id if it was read.
    Rejected { id: PsTrackId, full_length: usize },
}

/// MPEG-1 style 5 byte timestamp whose first byte was already read.
fn read_timestamp<R: Read + Seek>(io: &mut ByteCursor<R>, c: u8) -> io::Result<Option<i64>> {
    let d = io.read_u16_be()?;
    let e = io.read_u16_be()?;
    if c & 1 != 1 || d & 1 != 1 || e & 1 != 1 {
        return Ok(None);
    }
    let ticks = (i64::from((c >> 1) & 7) << 30) | (i64::from(d >> 1) << 15) | i64::from(e >> 1);
    Ok(Some(ticks_to_ns(ticks)))
}

fn read_timestamp_bits(bc: &mut BitCursor<'_>) -> io::Result<i64> {
    bc.skip_bits(4)?;
    let mut ticks = i64::from(bc.get_bits(3)?);
    bc.skip_bits(1)?;
    ticks = (ticks << 15) | i64::from(bc.get_bits(15)?);
    bc.skip_bits(1)?;
    ticks = (ticks << 15) | i64::from(bc.get_bits(15)?);
    bc.skip_bits(1)?;
    Ok(ticks_to_ns(ticks))
}

/// Walk the MPEG-2 optional header fields: PTS, DTS and, for VC-1, the
/// PES extension whose second extension field carries the sub stream id.
fn parse_optional_header(
    header: &[u8],
    flags: u8,
    stream_id: u8,
    timestamp: &mut Option<i64>,
    sub_id: &mut u8,
) -> io::Result<()> {
    let mut bc = BitCursor::new(header);

    if flags & 0x80 != 0 {
        *timestamp = Some(read_timestamp_bits(&mut bc)?);
    }
    if flags & 0x40 != 0 {
        bc.skip_bits(5 * 8)?;
    }

    if stream_id == EXTENDED_STREAM && flags & 0x01 != 0 {
        let ext_flags = bc.get_bits(8)?;
        if ext_flags & 0x80 != 0 {
            bc.skip_bits(128)?; // PES private data
        }
        if ext_flags & 0x40 != 0 {
            let pack_header_len = bc.get_bits(8)?;
            bc.skip_bits(8 * pack_header_len)?;
        }
        if ext_flags & 0x20 != 0 {
            bc.skip_bits(16)?; // program packet sequence counter
        }
        if ext_flags & 0x10 != 0 {
            bc.skip_bits(16)?; // P-STD buffer
        }
        if ext_flags & 0x01 != 0 {
            bc.skip_bits(1)?;
            let ext2_len = bc.get_bits(7)?;
            if ext2_len > 0 {
                *sub_id = bc.get_bits(8)? as u8;
            }
        }
    }
    Ok(())
}

/// Parse the header of a PES packet whose start code has just been read.
///
/// Fails only on I/O errors and with [`Error::Encrypted`] for scrambled
/// payloads. Everything else that makes a packet unusable is reported as
/// [`PesOutcome::Rejected`].
pub fn parse_packet<R: Read + Seek>(io: &mut ByteCursor<R>, stream_id: u8) -> Result<PesOutcome> {
    let full_length = usize::from(io.read_u16_be()?);
    let mut id = PsTrackId::new(stream_id, 0);
    let rejected = |id: PsTrackId| Ok(PesOutcome::Rejected { id, full_length });

    if is_rejected_id(stream_id) {
        io.skip(full_length as i64)?;
        return rejected(id);
    }
    if full_length == 0 {
        return rejected(id);
    }

    let mut length = full_length as i64;
    let mut timestamp = None;

    let mut c = 0u8;
    while length > 0 {
        c = io.read_u8()?;
        length -= 1;
        if c != 0xff {
            break;
        }
    }

    // STD buffer size
    if c & 0xc0 == 0x40 {
        if length < 2 {
            return rejected(id);
        }
        length -= 2;
        io.skip(1)?;
        c = io.read_u8()?;
    }

    if c & 0xf0 == 0x20 {
        match read_timestamp(io, c)? {
            Some(ts) => timestamp = Some(ts),
            None => return rejected(id),
        }
        length -= 4;
    } else if c & 0xf0 == 0x30 {
        match read_timestamp(io, c)? {
            Some(ts) => timestamp = Some(ts),
            None => return rejected(id),
        }
        io.skip(5)?;
        length -= 4 + 5;
    } else if c & 0xc0 == 0x80 {
        if c & 0x30 != 0 {
            return Err(Error::Encrypted);
        }

        let flags = io.read_u8()?;
        let hdrlen = io.read_u8()?;
        length -= 2;
        if i64::from(hdrlen) > length {
            return rejected(id);
        }
        length -= i64::from(hdrlen);

        let header = io.read_vec(usize::from(hdrlen))?;
        // Missing optional fields only cost us the timestamp.
        let _ = parse_optional_header(&header, flags, stream_id, &mut timestamp, &mut id.sub_id);

        if stream_id == PRIVATE_STREAM_1 {
            if length < 4 {
                return rejected(id);
            }
            id.sub_id = io.read_u8()?;
            length -= 1;

            if id.sub_id & 0xe0 == 0x20 {
                // VobSub
                return rejected(id);
            } else if matches!(id.sub_id, 0x80..=0x8f | 0x98..=0xaf | 0xc0..=0xcf) {
                io.skip(3)?; // number of frames, first access unit
                length -= 3;

                if id.sub_id & 0xe0 == 0xa0 && length >= 3 {
                    io.skip(3)?; // LPCM header
                    length -= 3;
                }
            }
        }
    } else if c != 0x0f {
        return rejected(id);
    }

    if length <= 0 {
        return rejected(id);
    }

    Ok(PesOutcome::Payload(PesHeader {
        id,
        timestamp,
        length: length as usize,
        full_length,
    }))
}

/// Stream types announced by a program stream map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMapHint {
    Mpeg1Video,
    Mpeg2Video,
    MpegAudio,
    Aac,
    Mpeg4Video,
    Avc,
    Ac3,
}

impl StreamMapHint {
    fn from_stream_type(stream_type: u8) -> Option<Self> {
        match stream_type {
            0x01 => Some(Self::Mpeg1Video),
            0x02 => Some(Self::Mpeg2Video),
            0x03 | 0x04 => Some(Self::MpegAudio),
            0x0f | 0x11 => Some(Self::Aac),
            0x10 => Some(Self::Mpeg4Video),
            0x1b => Some(Self::Avc),
            0x81 => Some(Self::Ac3),
            _ => None,
        }
    }
}

const ES_MAP_FIRST_ID: u8 = 0xb0;
const ES_MAP_LAST_ID: u8 = 0xef;

/// Stream types per id 0xb0..=0xef, filled from program stream maps.
#[derive(Debug, Clone)]
pub struct EsMap {
    entries: [Option<StreamMapHint>; (ES_MAP_LAST_ID - ES_MAP_FIRST_ID) as usize + 1],
}

impl Default for EsMap {
    fn default() -> Self {
        Self {
            entries: [None; (ES_MAP_LAST_ID - ES_MAP_FIRST_ID) as usize + 1],
        }
    }
}

impl EsMap {
    pub fn get(&self, id: u8) -> Option<StreamMapHint> {
        if (ES_MAP_FIRST_ID..=ES_MAP_LAST_ID).contains(&id) {
            self.entries[usize::from(id - ES_MAP_FIRST_ID)]
        } else {
            None
        }
    }

    fn set(&mut self, id: u8, hint: StreamMapHint) {
        if (ES_MAP_FIRST_ID..=ES_MAP_LAST_ID).contains(&id) {
            self.entries[usize::from(id - ES_MAP_FIRST_ID)] = Some(hint);
        }
    }
}

/// Parse a program stream map whose start code has just been read and
/// leave the cursor behind it. Malformed maps are skipped.
pub fn parse_program_stream_map<R: Read + Seek>(
    io: &mut ByteCursor<R>,
    es_map: &mut EsMap,
) -> io::Result<()> {
    let len = io.read_u16_be()?;
    let body = io.position();

    if len != 0 && len <= MAX_STREAM_MAP_LENGTH {
        if let Err(e) = read_stream_map_entries(io, es_map, i64::from(len)) {
            trace!("mpeg_ps: truncated program stream map: {}", e);
        }
    }

    io.seek_to(body + u64::from(len))
}

fn read_stream_map_entries<R: Read + Seek>(
    io: &mut ByteCursor<R>,
    es_map: &mut EsMap,
    len: i64,
) -> io::Result<()> {
    if io.read_u8()? & 0x80 == 0 {
        // current_next_indicator not set
        return Ok(());
    }
    io.skip(1)?;

    let prog_len = i64::from(io.read_u16_be()?);
    io.skip(prog_len)?;

    let mut es_map_len = i64::from(io.read_u16_be()?).min(len - prog_len - 8);
    while es_map_len > 0 {
        let stream_type = io.read_u8()?;
        let id = io.read_u8()?;
        if let Some(hint) = StreamMapHint::from_stream_type(stream_type) {
            es_map.set(id, hint);
        }

        let plen = i64::from(io.read_u16_be()?).min(es_map_len);
        io.skip(plen)?;
        es_map_len -= 4 + plen;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn cursor(data: Vec<u8>) -> ByteCursor<Cursor<Vec<u8>>> {
        ByteCursor::new(Cursor::new(data)).unwrap()
    }

    fn pts_bytes(prefix: u8, pts: u64) -> [u8; 5] {
        [
            prefix | (((pts >> 29) & 0x0e) as u8) | 1,
            (pts >> 22) as u8,
            (((pts >> 14) & 0xfe) as u8) | 1,
            (pts >> 7) as u8,
            (((pts << 1) & 0xfe) as u8) | 1,
        ]
    }

    #[test]
    fn test_mpeg2_header_with_pts() {
        let mut data = vec![0x00, 0x0c, 0x80, 0x80, 0x05];
        data.extend_from_slice(&pts_bytes(0x20, 90_000));
        data.extend_from_slice(&[0xaa; 4]);
        let mut io = cursor(data);

        let header = match parse_packet(&mut io, 0xe0).unwrap() {
            PesOutcome::Payload(header) => header,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(header.id, PsTrackId::new(0xe0, 0));
        assert_eq!(header.timestamp, Some(1_000_000_000));
        assert_eq!(header.length, 4);
        assert_eq!(header.full_length, 12);
        assert_eq!(io.position(), 10);
    }

    #[test]
    fn test_private_stream_ac3_sub_id() {
        let mut data = vec![0x00, 0x0c, 0x81, 0x00, 0x00];
        data.extend_from_slice(&[0x80, 0x01, 0x00, 0x01]);
        data.extend_from_slice(&[0x0b, 0x77, 0x00, 0x00, 0x14]);
        let mut io = cursor(data);

        match parse_packet(&mut io, PRIVATE_STREAM_1).unwrap() {
            PesOutcome::Payload(header) => {
                assert_eq!(header.id, PsTrackId::new(0xbd, 0x80));
                assert_eq!(header.timestamp, None);
                assert_eq!(header.length, 5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_vobsub_is_rejected_with_sub_id() {
        let data = vec![0x00, 0x08, 0x81, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x00];
        let outcome = parse_packet(&mut cursor(data), PRIVATE_STREAM_1).unwrap();
        assert_eq!(
            outcome,
            PesOutcome::Rejected {
                id: PsTrackId::new(0xbd, 0x20),
                full_length: 8
            }
        );
    }

    #[test]
    fn test_scrambled_payload_is_fatal() {
        let data = vec![0x00, 0x08, 0x90, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            parse_packet(&mut cursor(data), 0xe0),
            Err(Error::Encrypted)
        ));
    }

    #[test]
    fn test_mpeg1_header_with_stuffing_and_std_buffer() {
        let mut data = vec![0x00, 0x0e, 0xff, 0xff, 0x40, 0x00];
        data.extend_from_slice(&pts_bytes(0x20, 9));
        data.extend_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05]);
        let mut io = cursor(data);
        match parse_packet(&mut io, 0xc0).unwrap() {
            PesOutcome::Payload(header) => {
                assert_eq!(header.timestamp, Some(100_000));
                assert_eq!(header.length, 5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_padding_stream_is_skipped() {
        let mut io = cursor(vec![0x00, 0x03, 0xff, 0xff, 0xff, 0x00]);
        let outcome = parse_packet(&mut io, PADDING_STREAM).unwrap();
        assert!(matches!(outcome, PesOutcome::Rejected { full_length: 3, .. }));
        assert_eq!(io.position(), 5);
    }

    #[test]
    fn test_program_stream_map() {
        let mut data = vec![0x00, 0x12, 0x80, 0x01, 0x00, 0x00, 0x00, 0x08];
        data.extend_from_slice(&[0x1b, 0xe0, 0x00, 0x00]);
        data.extend_from_slice(&[0x81, 0xc0, 0x00, 0x00]);
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // crc
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0xba]);
        let mut io = cursor(data);
        let mut map = EsMap::default();

        parse_program_stream_map(&mut io, &mut map).unwrap();
        assert_eq!(map.get(0xe0), Some(StreamMapHint::Avc));
        assert_eq!(map.get(0xc0), Some(StreamMapHint::Ac3));
        assert_eq!(map.get(0xe1), None);
        assert_eq!(io.read_u32_be().unwrap(), PACK_HEADER);
    }

    #[test]
    fn test_oversized_program_stream_map_is_skipped() {
        let mut data = vec![0x04, 0x00];
        data.extend(std::iter::repeat(0x80).take(0x400));
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0xb9]);
        let mut io = cursor(data);
        let mut map = EsMap::default();
        parse_program_stream_map(&mut io, &mut map).unwrap();
        assert_eq!(io.read_u32_be().unwrap(), PROGRAM_END);
        assert_eq!(map.get(0xe0), None);
    }
}
