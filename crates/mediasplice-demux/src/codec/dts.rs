//! DTS core frame header decoding.

use bytes::Bytes;

use super::Sniff;
use crate::cursor::BitCursor;
use crate::types::AudioParams;

pub const SYNC_WORD: u32 = 0x7ffe_8001;

const SAMPLE_RATES: [u32; 16] = [
    0, 8000, 16000, 32000, 0, 0, 11025, 22050, 44100, 0, 0, 12000, 24000, 48000, 0, 0,
];
const AMODE_CHANNELS: [u32; 16] = [1, 2, 2, 2, 2, 3, 3, 4, 4, 5, 6, 6, 6, 7, 8, 8];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtsHeader {
    pub sample_rate: u32,
    pub channels: u32,
    pub lfe: bool,
    pub frame_bytes: usize,
    pub samples: u32,
    /// Channel arrangement code.
    pub amode: u8,
}

/// Decode a core header starting at `data[0]`.
pub fn decode_header(data: &[u8]) -> Option<DtsHeader> {
    if data.len() < 12 || u32::from_be_bytes([data[0], data[1], data[2], data[3]]) != SYNC_WORD {
        return None;
    }
    let mut bc = BitCursor::new(&data[4..]);
    let parsed = (|| -> std::io::Result<Option<DtsHeader>> {
        bc.skip_bits(1 + 5 + 1)?; // frame type, deficit samples, crc present
        let nblks = bc.get_bits(7)?;
        let fsize = bc.get_bits(14)?;
        let amode = bc.get_bits(6)? as u8;
        let sfreq = bc.get_bits(4)? as usize;
        bc.skip_bits(5 + 1 + 1 + 1 + 1 + 1 + 3 + 1 + 1)?;
        let lff = bc.get_bits(2)?;

        let sample_rate = SAMPLE_RATES[sfreq];
        if sample_rate == 0 || nblks < 5 || fsize < 95 || lff == 3 {
            return Ok(None);
        }
        let lfe = lff != 0;
        let channels = AMODE_CHANNELS
            .get(usize::from(amode))
            .copied()
            .unwrap_or(2)
            + u32::from(lfe);

        Ok(Some(DtsHeader {
            sample_rate,
            channels,
            lfe,
            frame_bytes: fsize as usize + 1,
            samples: (nblks + 1) * 32,
            amode,
        }))
    })();
    parsed.ok().flatten()
}

/// Offset of the first decodable core header in `data`.
pub fn find_header(data: &[u8]) -> Option<(usize, DtsHeader)> {
    (0..data.len().saturating_sub(3))
        .filter(|&pos| data[pos..pos + 4] == SYNC_WORD.to_be_bytes())
        .find_map(|pos| decode_header(&data[pos..]).map(|header| (pos, header)))
}

/// DTS headers may straddle PES packets, so an empty result asks for more.
pub fn sniff(data: &[u8]) -> Sniff<(DtsHeader, AudioParams)> {
    let Some((pos, header)) = find_header(data) else {
        return Sniff::NeedMore;
    };
    let params = AudioParams {
        channels: header.channels,
        sample_rate: header.sample_rate,
        bits_per_sample: None,
        bsid: None,
        codec_header: Some(Bytes::copy_from_slice(&data[pos..pos + 12])),
    };
    Sniff::Found((header, params))
}
