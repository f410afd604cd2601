//! MPEG-1/2 video sequence header sniffing and AVC/MPEG disambiguation.

use bytes::Bytes;

use super::{is_start_code, start_code_offsets, Sniff};
use crate::cursor::BitCursor;
use crate::types::VideoParams;

pub const SEQUENCE_HEADER: u8 = 0xb3;
pub const PICTURE: u8 = 0x00;
pub const EXTENSION: u8 = 0xb5;
pub const GROUP_OF_PICTURES: u8 = 0xb8;
pub const SEQUENCE_END: u8 = 0xb7;

const FRAME_RATES: [f64; 9] = [
    0.0,
    24000.0 / 1001.0,
    24.0,
    25.0,
    30000.0 / 1001.0,
    30.0,
    50.0,
    60000.0 / 1001.0,
    60.0,
];

/// MPEG-1 pel aspect ratios (pel height / pel width) by aspect code.
const MPEG1_PEL_ASPECT: [f64; 16] = [
    0.0, 1.0, 0.6735, 0.7031, 0.7615, 0.8055, 0.8437, 0.8935, 0.9157, 0.9815, 1.0255, 1.0695,
    1.0950, 1.1575, 1.2015, 0.0,
];

/// Which video syntax a 0xe0..0xef stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoKind {
    Mpeg12,
    Avc,
}

const NALU_NON_IDR_SLICE: u64 = 1;
const NALU_IDR_SLICE: u64 = 5;
const NALU_SPS: u64 = 7;
const NALU_PPS: u64 = 8;
const NALU_ACCESS_UNIT: u64 = 9;

/// Incremental scanner that looks for AVC and MPEG-1/2 signatures in the
/// same byte window and commits to whichever completes first.
#[derive(Debug, Default)]
pub struct VideoKindScanner {
    marker: u64,
    mpeg_seq_header: bool,
    mpeg_picture: bool,
    avc_sps: bool,
    avc_pps: bool,
    avc_slice: bool,
    avc_access_unit: bool,
}

impl VideoKindScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume more bytes. Returns the detected kind once a complete
    /// signature set was seen.
    pub fn feed(&mut self, data: &[u8]) -> Option<VideoKind> {
        for &byte in data {
            self.marker = (self.marker << 8) | u64::from(byte);

            if (self.marker >> 8) & 0xffff_ffff == 0x0000_0001 {
                match self.marker & 0x1f {
                    NALU_SPS => self.avc_sps = true,
                    NALU_PPS => self.avc_pps = true,
                    NALU_NON_IDR_SLICE..=NALU_IDR_SLICE => self.avc_slice = true,
                    NALU_ACCESS_UNIT => self.avc_access_unit = true,
                    _ => {}
                }
                if self.avc_sps && self.avc_pps && (self.avc_slice || self.avc_access_unit) {
                    return Some(VideoKind::Avc);
                }
            }

            let word = self.marker as u32;
            if is_start_code(word) {
                match word as u8 {
                    SEQUENCE_HEADER => self.mpeg_seq_header = true,
                    PICTURE => self.mpeg_picture = true,
                    _ => {}
                }
                if self.mpeg_seq_header && self.mpeg_picture {
                    return Some(VideoKind::Mpeg12);
                }
            }
        }
        None
    }
}

/// MPEG-1/2 stream parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct MpegVideoInfo {
    /// 1 or 2.
    pub version: u8,
    pub aspect_code: u8,
    pub params: VideoParams,
}

/// Parse the first sequence header in `data`.
///
/// Succeeds only once the window also holds one complete picture, i.e. a
/// picture start code followed by another picture, GOP, sequence header or
/// sequence end start code.
pub fn parse_sequence(data: &[u8]) -> Sniff<MpegVideoInfo> {
    let offsets = start_code_offsets(data);
    let Some(seq_idx) = offsets
        .iter()
        .position(|&o| data.get(o) == Some(&SEQUENCE_HEADER))
    else {
        return Sniff::NeedMore;
    };
    let seq_off = offsets[seq_idx];

    let mut bc = BitCursor::new(&data[seq_off + 1..]);
    let header = (|| -> std::io::Result<(u32, u32, u8, u8)> {
        let width = bc.get_bits(12)?;
        let height = bc.get_bits(12)?;
        let aspect_code = bc.get_bits(4)? as u8;
        let rate_code = bc.get_bits(4)? as u8;
        bc.skip_bits(18 + 1 + 10 + 1)?;
        if bc.get_bit()? {
            bc.skip_bits(64 * 8)?;
        }
        if bc.get_bit()? {
            bc.skip_bits(64 * 8)?;
        }
        Ok((width, height, aspect_code, rate_code))
    })();
    let Ok((width, height, aspect_code, rate_code)) = header else {
        return Sniff::NeedMore;
    };
    if width == 0 || height == 0 {
        return Sniff::Failed("sequence header with zero dimensions");
    }

    let mut version = 1;
    let mut private_end = None;
    let mut picture_idx = None;
    for (idx, &off) in offsets.iter().enumerate().skip(seq_idx + 1) {
        let Some(&code) = data.get(off) else {
            return Sniff::NeedMore;
        };
        if code == EXTENSION {
            if picture_idx.is_none() && data.get(off + 1).is_some_and(|b| b >> 4 == 1) {
                version = 2;
            }
            continue;
        }
        if private_end.is_none() {
            private_end = Some(off - 3);
        }
        if code == PICTURE {
            picture_idx = Some(idx);
            break;
        }
    }
    let Some(picture_idx) = picture_idx else {
        return Sniff::NeedMore;
    };
    let complete = offsets[picture_idx + 1..].iter().any(|&off| {
        matches!(
            data.get(off),
            Some(&PICTURE) | Some(&GROUP_OF_PICTURES) | Some(&SEQUENCE_HEADER) | Some(&SEQUENCE_END)
        )
    });
    if !complete {
        return Sniff::NeedMore;
    }

    let aspect_ratio = display_aspect(version, aspect_code, width, height);
    let display_width = match aspect_ratio {
        Some(aspect) if aspect > 0.0 && aspect != 1.0 => (f64::from(height) * aspect).round() as u32,
        _ => width,
    };
    let frame_rate = FRAME_RATES
        .get(usize::from(rate_code))
        .copied()
        .filter(|&r| r > 0.0);
    let private_end = private_end.unwrap_or(data.len());

    Sniff::Found(MpegVideoInfo {
        version,
        aspect_code,
        params: VideoParams {
            width,
            height,
            display_width,
            display_height: height,
            frame_rate,
            aspect_ratio,
            codec_private: Some(Bytes::copy_from_slice(&data[seq_off - 3..private_end])),
        },
    })
}

fn display_aspect(version: u8, code: u8, width: u32, height: u32) -> Option<f64> {
    if version == 2 {
        return match code {
            2 => Some(4.0 / 3.0),
            3 => Some(16.0 / 9.0),
            4 => Some(2.21),
            _ => None,
        };
    }
    let pel = MPEG1_PEL_ASPECT[usize::from(code & 0x0f)];
    if code == 1 || pel == 0.0 {
        return None;
    }
    Some(f64::from(width) / (f64::from(height) * pel))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mpeg2_stream() -> Vec<u8> {
        let mut data = vec![
            0x00, 0x00, 0x01, 0xb3, 0x2d, 0x02, 0x40, 0x33, 0xff, 0xff, 0xe0, 0x00,
        ];
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0xb5, 0x14, 0x8a, 0x00, 0x01, 0x00, 0x00]);
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x00, 0x0f, 0xff, 0xf8]);
        data.extend_from_slice(&[0x12; 32]);
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x00, 0x4f, 0xff, 0xf8]);
        data
    }

    #[test]
    fn test_parse_mpeg2_sequence() {
        let info = parse_sequence(&mpeg2_stream()).found().unwrap();
        assert_eq!(info.version, 2);
        assert_eq!(info.params.width, 720);
        assert_eq!(info.params.height, 576);
        assert_eq!(info.params.display_width, 1024);
        assert_eq!(info.params.display_height, 576);
        assert_eq!(info.params.frame_rate, Some(25.0));
        // sequence header plus its extension
        assert_eq!(info.params.codec_private.unwrap().len(), 22);
    }

    #[test]
    fn test_incomplete_picture_needs_more() {
        let data = mpeg2_stream();
        assert_eq!(parse_sequence(&data[..40]), Sniff::NeedMore);
        assert_eq!(parse_sequence(&data[..6]), Sniff::NeedMore);
    }

    #[test]
    fn test_mpeg1_without_extension() {
        let mut data = vec![
            0x00, 0x00, 0x01, 0xb3, 0x16, 0x00, 0xf0, 0x13, 0xff, 0xff, 0xe0, 0x00,
        ];
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0xb8, 0x00, 0x08, 0x00, 0x00]);
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0x00, 0x00, 0x0f, 0xff, 0xf8]);
        data.extend_from_slice(&[0x00, 0x00, 0x01, 0xb7]);
        let info = parse_sequence(&data).found().unwrap();
        assert_eq!(info.version, 1);
        assert_eq!((info.params.width, info.params.height), (352, 240));
        assert_eq!(info.params.display_width, 352);
        assert_eq!(info.params.frame_rate, Some(25.0));
    }

    #[test]
    fn test_scanner_detects_mpeg() {
        let mut scanner = VideoKindScanner::new();
        assert_eq!(scanner.feed(&mpeg2_stream()), Some(VideoKind::Mpeg12));
    }

    #[test]
    fn test_scanner_detects_avc_across_feeds() {
        let mut scanner = VideoKindScanner::new();
        assert_eq!(scanner.feed(&[0x00, 0x00, 0x00, 0x01, 0x67, 0x42]), None);
        assert_eq!(scanner.feed(&[0x00, 0x00, 0x00, 0x01, 0x68, 0xce]), None);
        assert_eq!(scanner.feed(&[0x00, 0x00, 0x00]), None);
        assert_eq!(scanner.feed(&[0x01, 0x65, 0x88]), Some(VideoKind::Avc));
    }
}
