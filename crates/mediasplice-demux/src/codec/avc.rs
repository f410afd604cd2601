//! AVC/h.264 elementary stream header parsing.

use std::io;

use bytes::{BufMut, Bytes, BytesMut};

use super::Sniff;
use crate::cursor::BitCursor;
use crate::types::VideoParams;

/// AVC NAL unit types used during classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalUnitType {
    Slice,
    SliceDataPartitionA,
    SliceDataPartitionB,
    SliceDataPartitionC,
    IdrSlice,
    Sei,
    Sps,
    Pps,
    AccessUnitDelimiter,
    Other(u8),
}

impl From<u8> for NalUnitType {
    fn from(value: u8) -> Self {
        match value & 0x1f {
            1 => NalUnitType::Slice,
            2 => NalUnitType::SliceDataPartitionA,
            3 => NalUnitType::SliceDataPartitionB,
            4 => NalUnitType::SliceDataPartitionC,
            5 => NalUnitType::IdrSlice,
            6 => NalUnitType::Sei,
            7 => NalUnitType::Sps,
            8 => NalUnitType::Pps,
            9 => NalUnitType::AccessUnitDelimiter,
            v => NalUnitType::Other(v),
        }
    }
}

/// Split an Annex B byte stream into NAL units (without start codes).
///
/// The last unit is only returned if `include_last` is set, since in a
/// growing window it may still be incomplete.
pub fn split_nal_units(data: &[u8], include_last: bool) -> Vec<&[u8]> {
    let mut starts = Vec::new();
    let mut i = 0;
    while i + 2 < data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            starts.push(i + 3);
            i += 3;
        } else {
            i += 1;
        }
    }

    let mut units = Vec::with_capacity(starts.len());
    for (idx, &start) in starts.iter().enumerate() {
        let end = match starts.get(idx + 1) {
            Some(&next) => {
                // drop the start code and any zero_byte before it
                let mut end = next - 3;
                while end > start && data[end - 1] == 0 {
                    end -= 1;
                }
                end
            }
            None if include_last => data.len(),
            None => break,
        };
        if start < end {
            units.push(&data[start..end]);
        }
    }
    units
}

/// Remove emulation prevention bytes (`00 00 03` → `00 00`).
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut zeros = 0;
    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
        result.push(byte);
    }
    result
}

/// Fields of a sequence parameter set relevant for muxing.
#[derive(Debug, Clone, PartialEq)]
pub struct Sps {
    pub profile_idc: u8,
    pub constraint_flags: u8,
    pub level_idc: u8,
    pub width: u32,
    pub height: u32,
    /// Sample aspect ratio, if the VUI signals one.
    pub sar: Option<(u32, u32)>,
    pub frame_rate: Option<f64>,
}

const SAR_TABLE: [(u32, u32); 17] = [
    (0, 0),
    (1, 1),
    (12, 11),
    (10, 11),
    (16, 11),
    (40, 33),
    (24, 11),
    (20, 11),
    (32, 11),
    (80, 33),
    (18, 11),
    (15, 11),
    (64, 33),
    (160, 99),
    (4, 3),
    (3, 2),
    (2, 1),
];

const EXTENDED_SAR: u32 = 255;

fn has_chroma_info(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    )
}

fn skip_scaling_list(bc: &mut BitCursor<'_>, size: usize) -> io::Result<()> {
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta = bc.get_signed_golomb()?;
            next_scale = (last_scale + delta + 256) % 256;
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
    Ok(())
}

/// Parse an SPS NAL unit (including its one byte NAL header).
pub fn parse_sps(nal: &[u8]) -> Option<Sps> {
    if nal.len() < 4 || NalUnitType::from(nal[0]) != NalUnitType::Sps {
        return None;
    }
    let rbsp = remove_emulation_prevention(&nal[1..]);
    parse_sps_rbsp(&rbsp).ok()
}

fn parse_sps_rbsp(rbsp: &[u8]) -> io::Result<Sps> {
    let mut bc = BitCursor::new(rbsp);

    let profile_idc = bc.get_bits(8)? as u8;
    let constraint_flags = bc.get_bits(8)? as u8;
    let level_idc = bc.get_bits(8)? as u8;
    bc.get_unsigned_golomb()?; // seq_parameter_set_id

    let mut chroma_format_idc = 1;
    let mut separate_colour_plane = false;
    if has_chroma_info(profile_idc) {
        chroma_format_idc = bc.get_unsigned_golomb()?;
        if chroma_format_idc == 3 {
            separate_colour_plane = bc.get_bit()?;
        }
        bc.get_unsigned_golomb()?; // bit_depth_luma_minus8
        bc.get_unsigned_golomb()?; // bit_depth_chroma_minus8
        bc.skip_bits(1)?; // qpprime_y_zero_transform_bypass_flag
        if bc.get_bit()? {
            let lists = if chroma_format_idc == 3 { 12 } else { 8 };
            for i in 0..lists {
                if bc.get_bit()? {
                    skip_scaling_list(&mut bc, if i < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    bc.get_unsigned_golomb()?; // log2_max_frame_num_minus4
    match bc.get_unsigned_golomb()? {
        0 => {
            bc.get_unsigned_golomb()?;
        }
        1 => {
            bc.skip_bits(1)?;
            bc.get_signed_golomb()?;
            bc.get_signed_golomb()?;
            let cycle = bc.get_unsigned_golomb()?;
            for _ in 0..cycle {
                bc.get_signed_golomb()?;
            }
        }
        _ => {}
    }

    bc.get_unsigned_golomb()?; // max_num_ref_frames
    bc.skip_bits(1)?; // gaps_in_frame_num_value_allowed_flag
    let width_mbs = bc.get_unsigned_golomb()? + 1;
    let height_map_units = bc.get_unsigned_golomb()? + 1;
    let frame_mbs_only = bc.get_bit()?;
    if !frame_mbs_only {
        bc.skip_bits(1)?; // mb_adaptive_frame_field_flag
    }
    bc.skip_bits(1)?; // direct_8x8_inference_flag

    let field_factor = if frame_mbs_only { 1 } else { 2 };
    let mut width = width_mbs * 16;
    let mut height = field_factor * height_map_units * 16;

    if bc.get_bit()? {
        let left = bc.get_unsigned_golomb()?;
        let right = bc.get_unsigned_golomb()?;
        let top = bc.get_unsigned_golomb()?;
        let bottom = bc.get_unsigned_golomb()?;

        let chroma_array_type = if separate_colour_plane {
            0
        } else {
            chroma_format_idc
        };
        let (crop_x, crop_y) = if chroma_array_type == 0 {
            (1, field_factor)
        } else {
            let sub_width = if chroma_format_idc == 3 { 1 } else { 2 };
            let sub_height = if chroma_format_idc == 1 { 2 } else { 1 };
            (sub_width, sub_height * field_factor)
        };
        width = width.saturating_sub((left + right) * crop_x);
        height = height.saturating_sub((top + bottom) * crop_y);
    }

    let mut sps = Sps {
        profile_idc,
        constraint_flags,
        level_idc,
        width,
        height,
        sar: None,
        frame_rate: None,
    };

    if bc.get_bit()? {
        // A truncated VUI only costs us the optional fields.
        let _ = parse_vui(&mut bc, &mut sps);
    }

    Ok(sps)
}

fn parse_vui(bc: &mut BitCursor<'_>, sps: &mut Sps) -> io::Result<()> {
    if bc.get_bit()? {
        let idc = bc.get_bits(8)?;
        let sar = if idc == EXTENDED_SAR {
            (bc.get_bits(16)?, bc.get_bits(16)?)
        } else {
            SAR_TABLE.get(idc as usize).copied().unwrap_or((0, 0))
        };
        if sar.0 != 0 && sar.1 != 0 {
            sps.sar = Some(sar);
        }
    }
    if bc.get_bit()? {
        bc.skip_bits(1)?; // overscan_appropriate_flag
    }
    if bc.get_bit()? {
        bc.skip_bits(3 + 1)?; // video_format, video_full_range_flag
        if bc.get_bit()? {
            bc.skip_bits(24)?; // colour description
        }
    }
    if bc.get_bit()? {
        bc.get_unsigned_golomb()?;
        bc.get_unsigned_golomb()?;
    }
    if bc.get_bit()? {
        let num_units_in_tick = bc.get_bits(32)?;
        let time_scale = bc.get_bits(32)?;
        if num_units_in_tick > 0 && time_scale > 0 {
            sps.frame_rate = Some(f64::from(time_scale) / (2.0 * f64::from(num_units_in_tick)));
        }
    }
    Ok(())
}

/// Build an `AVCDecoderConfigurationRecord` from raw SPS/PPS NAL units.
pub fn build_avcc(sps_units: &[&[u8]], pps_units: &[&[u8]]) -> Option<Bytes> {
    let first = sps_units.first()?;
    if first.len() < 4 || sps_units.len() > 31 || pps_units.len() > 255 {
        return None;
    }

    let mut avcc = BytesMut::new();
    avcc.put_u8(1);
    avcc.put_u8(first[1]);
    avcc.put_u8(first[2]);
    avcc.put_u8(first[3]);
    avcc.put_u8(0xff); // 4 byte NAL size fields
    avcc.put_u8(0xe0 | sps_units.len() as u8);
    for sps in sps_units {
        avcc.put_u16(u16::try_from(sps.len()).ok()?);
        avcc.put_slice(sps);
    }
    avcc.put_u8(pps_units.len() as u8);
    for pps in pps_units {
        avcc.put_u16(u16::try_from(pps.len()).ok()?);
        avcc.put_slice(pps);
    }
    Some(avcc.freeze())
}

/// Extract AVC stream parameters from an Annex B window.
///
/// Needs at least one SPS and one PPS; the avcC record collects every
/// distinct parameter set seen in the window.
pub fn parse_avc(data: &[u8]) -> Sniff<(Sps, VideoParams)> {
    let units = split_nal_units(data, false);
    let mut sps_units: Vec<&[u8]> = Vec::new();
    let mut pps_units: Vec<&[u8]> = Vec::new();
    for unit in units {
        match NalUnitType::from(unit[0]) {
            NalUnitType::Sps if !sps_units.contains(&unit) => sps_units.push(unit),
            NalUnitType::Pps if !pps_units.contains(&unit) => pps_units.push(unit),
            _ => {}
        }
    }
    if sps_units.is_empty() || pps_units.is_empty() {
        return Sniff::NeedMore;
    }

    let Some(sps) = parse_sps(sps_units[0]) else {
        return Sniff::Failed("unparsable sequence parameter set");
    };
    if sps.width == 0 || sps.height == 0 {
        return Sniff::Failed("sequence parameter set with zero dimensions");
    }
    let Some(avcc) = build_avcc(&sps_units, &pps_units) else {
        return Sniff::Failed("parameter sets do not fit an avcC record");
    };

    let (display_width, display_height, aspect_ratio) = display_dimensions(&sps);
    let params = VideoParams {
        width: sps.width,
        height: sps.height,
        display_width,
        display_height,
        frame_rate: sps.frame_rate,
        aspect_ratio,
        codec_private: Some(avcc),
    };
    Sniff::Found((sps, params))
}

fn display_dimensions(sps: &Sps) -> (u32, u32, Option<f64>) {
    let Some((sar_num, sar_den)) = sps.sar else {
        return (sps.width, sps.height, None);
    };
    let width = f64::from(sps.width);
    let height = f64::from(sps.height);
    let aspect = width / height * f64::from(sar_num) / f64::from(sar_den);
    if aspect > width / height {
        ((height * aspect).round() as u32, sps.height, Some(aspect))
    } else {
        (sps.width, (width / aspect).round() as u32, Some(aspect))
    }
}
