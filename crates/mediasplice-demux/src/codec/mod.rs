//! Elementary stream header sniffers.
//!
//! Every sniffer inspects a byte window accumulated from one stream's PES
//! payloads and answers with a [`Sniff`]: it either found the parameters it
//! needs, needs more bytes, or gave up for good.

pub mod ac3;
pub mod avc;
pub mod dts;
pub mod mpeg_audio;
pub mod mpeg_video;
pub mod vc1;

/// Outcome of one classification attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Sniff<T> {
    /// Parameters were extracted.
    Found(T),
    /// The window is too short to decide; feed more payload and retry.
    NeedMore,
    /// The data cannot be this codec.
    Failed(&'static str),
}

impl<T> Sniff<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sniff<U> {
        match self {
            Sniff::Found(value) => Sniff::Found(f(value)),
            Sniff::NeedMore => Sniff::NeedMore,
            Sniff::Failed(reason) => Sniff::Failed(reason),
        }
    }

    /// Collapse into an `Option`, treating `NeedMore` as a failure.
    pub fn found(self) -> Option<T> {
        match self {
            Sniff::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// `true` for any `00 00 01 xx` start code.
#[inline]
pub fn is_start_code(word: u32) -> bool {
    word & 0xffff_ff00 == 0x0000_0100
}

/// Offsets of the byte following each `00 00 01` prefix in `data`.
pub fn start_code_offsets(data: &[u8]) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut i = 0;
    while i + 2 < data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            offsets.push(i + 3);
            i += 3;
        } else {
            i += 1;
        }
    }
    offsets
}
