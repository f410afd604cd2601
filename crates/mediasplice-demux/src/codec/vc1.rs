//! VC-1 advanced profile sequence header sniffing.

use std::io;

use bytes::Bytes;

use super::{start_code_offsets, Sniff};
use crate::cursor::BitCursor;
use crate::types::VideoParams;

pub const SEQUENCE_HEADER: u8 = 0x0f;
pub const ENTRY_POINT: u8 = 0x0e;

const PROFILE_ADVANCED: u32 = 3;

const FRAME_RATE_NR: [f64; 7] = [24.0, 25.0, 30.0, 50.0, 60.0, 48.0, 72.0];
const FRAME_RATE_DR: [f64; 2] = [1000.0, 1001.0];

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceHeader {
    pub level: u8,
    pub width: u32,
    pub height: u32,
    pub display_width: Option<u32>,
    pub display_height: Option<u32>,
    pub frame_rate: Option<f64>,
}

fn parse_header_bits(data: &[u8]) -> io::Result<Option<SequenceHeader>> {
    let mut bc = BitCursor::new(data);
    if bc.get_bits(2)? != PROFILE_ADVANCED {
        return Ok(None);
    }
    let level = bc.get_bits(3)? as u8;
    bc.skip_bits(2 + 3 + 5 + 1)?; // colordiff, frmrtq, bitrtq, postprocflag
    let width = (bc.get_bits(12)? + 1) * 2;
    let height = (bc.get_bits(12)? + 1) * 2;
    bc.skip_bits(6)?; // pulldown, interlace, tfcntr, finterp, reserved, psf

    let mut header = SequenceHeader {
        level,
        width,
        height,
        display_width: None,
        display_height: None,
        frame_rate: None,
    };

    if bc.get_bit()? {
        header.display_width = Some(bc.get_bits(14)? + 1);
        header.display_height = Some(bc.get_bits(14)? + 1);
        if bc.get_bit()? && bc.get_bits(4)? == 15 {
            bc.skip_bits(16)?;
        }
        if bc.get_bit()? {
            header.frame_rate = if bc.get_bit()? {
                Some(f64::from(bc.get_bits(16)? + 1) / 32.0)
            } else {
                let nr = bc.get_bits(8)? as usize;
                let dr = bc.get_bits(4)? as usize;
                match (nr.checked_sub(1), dr.checked_sub(1)) {
                    (Some(nr), Some(dr)) if nr < FRAME_RATE_NR.len() && dr < FRAME_RATE_DR.len() => {
                        Some(FRAME_RATE_NR[nr] * 1000.0 / FRAME_RATE_DR[dr])
                    }
                    _ => None,
                }
            };
        }
    }
    Ok(Some(header))
}

/// Find and parse the first advanced profile sequence header.
pub fn parse_sequence(data: &[u8]) -> Sniff<(SequenceHeader, VideoParams)> {
    let offsets = start_code_offsets(data);
    let Some(idx) = offsets
        .iter()
        .position(|&o| data.get(o) == Some(&SEQUENCE_HEADER))
    else {
        return Sniff::NeedMore;
    };
    let start = offsets[idx];
    let Some(&next) = offsets.get(idx + 1) else {
        return Sniff::NeedMore;
    };
    let end = next - 3;

    let header = match parse_header_bits(&data[start + 1..end]) {
        Ok(Some(header)) => header,
        Ok(None) => return Sniff::Failed("not an advanced profile sequence header"),
        Err(_) => return Sniff::Failed("truncated sequence header"),
    };

    let params = VideoParams {
        width: header.width,
        height: header.height,
        display_width: header.display_width.unwrap_or(header.width),
        display_height: header.display_height.unwrap_or(header.height),
        frame_rate: header.frame_rate,
        aspect_ratio: None,
        codec_private: Some(Bytes::copy_from_slice(&data[start - 3..end])),
    };
    Sniff::Found((header, params))
}
