//! MPEG-1/2/2.5 audio frame header decoding.

use bytes::Bytes;

use super::Sniff;
use crate::types::AudioParams;

const BITRATES_V1: [[u32; 15]; 3] = [
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
];

const BITRATES_V2: [[u32; 15]; 3] = [
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
];

const SAMPLE_RATES: [u32; 3] = [44100, 48000, 32000];

/// MPEG audio version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpegAudioHeader {
    pub version: Version,
    pub layer: u8,
    pub protected: bool,
    /// kbit/s; 0 means free format.
    pub bitrate: u32,
    pub sample_rate: u32,
    pub padding: bool,
    pub channels: u32,
    pub frame_length: usize,
    pub samples_per_frame: u32,
}

/// Decode a 4 byte frame header.
pub fn decode_header(bytes: [u8; 4]) -> Option<MpegAudioHeader> {
    let word = u32::from_be_bytes(bytes);
    if word & 0xffe0_0000 != 0xffe0_0000 {
        return None;
    }
    let version = match (word >> 19) & 0x03 {
        0 => Version::Mpeg25,
        2 => Version::Mpeg2,
        3 => Version::Mpeg1,
        _ => return None,
    };
    let layer = match (word >> 17) & 0x03 {
        1 => 3,
        2 => 2,
        3 => 1,
        _ => return None,
    };
    let protected = (word >> 16) & 0x01 == 0;
    let bitrate_index = ((word >> 12) & 0x0f) as usize;
    let rate_index = ((word >> 10) & 0x03) as usize;
    if bitrate_index == 15 || rate_index == 3 {
        return None;
    }
    let padding = (word >> 9) & 0x01 == 1;
    let channels = if (word >> 6) & 0x03 == 3 { 1 } else { 2 };

    let table = match version {
        Version::Mpeg1 => &BITRATES_V1,
        _ => &BITRATES_V2,
    };
    let bitrate = table[usize::from(layer - 1)][bitrate_index];
    let sample_rate = match version {
        Version::Mpeg1 => SAMPLE_RATES[rate_index],
        Version::Mpeg2 => SAMPLE_RATES[rate_index] / 2,
        Version::Mpeg25 => SAMPLE_RATES[rate_index] / 4,
    };

    let pad = u32::from(padding);
    let frame_length = match (layer, version) {
        (1, _) => (12 * bitrate * 1000 / sample_rate + pad) * 4,
        (3, Version::Mpeg2 | Version::Mpeg25) => 72 * bitrate * 1000 / sample_rate + pad,
        _ => 144 * bitrate * 1000 / sample_rate + pad,
    } as usize;
    let samples_per_frame = match (layer, version) {
        (1, _) => 384,
        (3, Version::Mpeg2 | Version::Mpeg25) => 576,
        _ => 1152,
    };

    Some(MpegAudioHeader {
        version,
        layer,
        protected,
        bitrate,
        sample_rate,
        padding,
        channels,
        frame_length,
        samples_per_frame,
    })
}

/// Offset of the first valid frame header in `data`.
pub fn find_header(data: &[u8]) -> Option<(usize, MpegAudioHeader)> {
    data.windows(4).enumerate().find_map(|(pos, window)| {
        decode_header([window[0], window[1], window[2], window[3]]).map(|header| (pos, header))
    })
}

/// Locate an MPEG audio header in the first payload of a stream.
pub fn sniff(data: &[u8]) -> Sniff<(MpegAudioHeader, AudioParams)> {
    if data.len() < 4 {
        return Sniff::NeedMore;
    }
    let Some((pos, header)) = find_header(data) else {
        return Sniff::Failed("no MPEG audio header found");
    };
    let params = AudioParams {
        channels: header.channels,
        sample_rate: header.sample_rate,
        bits_per_sample: None,
        bsid: None,
        codec_header: Some(Bytes::copy_from_slice(&data[pos..pos + 4])),
    };
    Sniff::Found((header, params))
}
