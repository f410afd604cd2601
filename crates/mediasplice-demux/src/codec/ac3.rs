//! AC-3 and E-AC-3 sync frame header decoding.

use bytes::Bytes;

use super::Sniff;
use crate::cursor::BitCursor;
use crate::types::AudioParams;

pub const SYNC_WORD: u16 = 0x0b77;

const SAMPLE_RATES: [u32; 3] = [48000, 44100, 32000];
const REDUCED_SAMPLE_RATES: [u32; 3] = [24000, 22050, 16000];
const BITRATES: [u32; 19] = [
    32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 576, 640,
];
const ACMOD_CHANNELS: [u32; 8] = [2, 1, 2, 3, 3, 4, 4, 5];
const BLOCKS_PER_FRAME: [u32; 4] = [1, 2, 3, 6];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ac3Header {
    pub sample_rate: u32,
    pub bsid: u8,
    pub channels: u32,
    /// Frame length in bytes.
    pub bytes: usize,
    pub samples: u32,
}

impl Ac3Header {
    pub fn is_eac3(&self) -> bool {
        self.bsid > 10
    }
}

fn decode_ac3(bc: &mut BitCursor<'_>) -> std::io::Result<Option<Ac3Header>> {
    let fscod = bc.get_bits(2)? as usize;
    let frmsizecod = bc.get_bits(6)? as usize;
    let bsid = bc.get_bits(5)? as u8;
    bc.skip_bits(3)?; // bsmod
    let acmod = bc.get_bits(3)?;
    if fscod == 3 || frmsizecod >= 2 * BITRATES.len() {
        return Ok(None);
    }
    if acmod & 0x01 != 0 && acmod != 1 {
        bc.skip_bits(2)?; // cmixlev
    }
    if acmod & 0x04 != 0 {
        bc.skip_bits(2)?; // surmixlev
    }
    if acmod == 2 {
        bc.skip_bits(2)?; // dsurmod
    }
    let lfeon = bc.get_bit()?;

    let sample_rate = SAMPLE_RATES[fscod];
    let kbps = BITRATES[frmsizecod >> 1];
    let mut words = kbps * 96000 / sample_rate;
    if sample_rate == 44100 {
        words += (frmsizecod & 1) as u32;
    }

    Ok(Some(Ac3Header {
        sample_rate,
        bsid,
        channels: ACMOD_CHANNELS[acmod as usize] + u32::from(lfeon),
        bytes: words as usize * 2,
        samples: 1536,
    }))
}

fn decode_eac3(bc: &mut BitCursor<'_>) -> std::io::Result<Option<Ac3Header>> {
    let strmtyp = bc.get_bits(2)?;
    bc.skip_bits(3)?; // substreamid
    let frmsiz = bc.get_bits(11)?;
    let fscod = bc.get_bits(2)? as usize;
    let (sample_rate, blocks) = if fscod == 3 {
        let fscod2 = bc.get_bits(2)? as usize;
        if fscod2 == 3 {
            return Ok(None);
        }
        (REDUCED_SAMPLE_RATES[fscod2], 6)
    } else {
        let numblkscod = bc.get_bits(2)? as usize;
        (SAMPLE_RATES[fscod], BLOCKS_PER_FRAME[numblkscod])
    };
    let acmod = bc.get_bits(3)?;
    let lfeon = bc.get_bit()?;
    let bsid = bc.get_bits(5)? as u8;
    if strmtyp == 3 {
        return Ok(None);
    }

    Ok(Some(Ac3Header {
        sample_rate,
        bsid,
        channels: ACMOD_CHANNELS[acmod as usize] + u32::from(lfeon),
        bytes: (frmsiz as usize + 1) * 2,
        samples: blocks * 256,
    }))
}

/// Decode the header of a frame starting at `data[0]`.
pub fn decode_header(data: &[u8]) -> Option<Ac3Header> {
    if data.len() < 8 || u16::from_be_bytes([data[0], data[1]]) != SYNC_WORD {
        return None;
    }
    let bsid = data[5] >> 3;
    let result = if bsid <= 10 {
        decode_ac3(&mut BitCursor::new(&data[4..]))
    } else if bsid <= 16 {
        decode_eac3(&mut BitCursor::new(&data[2..]))
    } else {
        return None;
    };
    result.ok().flatten()
}

/// Offset of the first decodable header in `data`.
pub fn find_header(data: &[u8]) -> Option<(usize, Ac3Header)> {
    (0..data.len().saturating_sub(1))
        .filter(|&pos| data[pos] == 0x0b && data[pos + 1] == 0x77)
        .find_map(|pos| decode_header(&data[pos..]).map(|header| (pos, header)))
}

pub fn sniff(data: &[u8]) -> Sniff<(Ac3Header, AudioParams)> {
    if data.len() < 8 {
        return Sniff::NeedMore;
    }
    let Some((pos, header)) = find_header(data) else {
        return Sniff::Failed("no AC-3 header found");
    };
    let params = AudioParams {
        channels: header.channels,
        sample_rate: header.sample_rate,
        bits_per_sample: None,
        bsid: Some(header.bsid),
        codec_header: Some(Bytes::copy_from_slice(&data[pos..(pos + 8).min(data.len())])),
    };
    Sniff::Found((header, params))
}
