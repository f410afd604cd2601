//! Container format detection and the reader interface

pub mod id3;
pub mod mpeg_ps;
pub mod tta;

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::sink::FrameSink;
use crate::types::{FileStatus, Identification, TrackInfo};

pub use mpeg_ps::{MpegPsReader, PsConfig};
pub use tta::TtaReader;

/// Supported container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// MPEG-1/2 program stream (.mpg, .vob, .evo)
    MpegPs,
    /// True Audio (.tta)
    Tta,
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Container::MpegPs => write!(f, "MPEG program stream"),
            Container::Tta => write!(f, "TTA"),
        }
    }
}

/// A demuxer that has finished classifying its tracks.
///
/// Callers attach a sink per wanted track, then call [`Reader::read`]
/// until it reports [`FileStatus::Done`]. Tracks without a sink are
/// skipped while reading.
pub trait Reader {
    /// Summary of the container and its tracks.
    fn identify(&self) -> Identification;

    /// Classified tracks in their final order.
    fn tracks(&self) -> Vec<TrackInfo>;

    /// Route the frames of track `track` to `sink`.
    fn set_sink(&mut self, track: usize, sink: Box<dyn FrameSink>) -> Result<()>;

    /// Demux the next packet.
    fn read(&mut self) -> Result<FileStatus>;

    /// Emit pending frames and flush all sinks. Only the first call has an
    /// effect.
    fn finish(&mut self) -> FileStatus;

    /// Percentage of the source consumed so far.
    fn progress(&self) -> u8;
}

/// Detect the container format of a seekable source.
///
/// Probes run in a fixed order, TTA before MPEG PS. The source position is
/// left unchanged.
pub fn detect_container<S: Read + Seek>(source: &mut S) -> Option<Container> {
    if tta::probe(source) {
        return Some(Container::Tta);
    }
    if mpeg_ps::probe(source) {
        return Some(Container::MpegPs);
    }
    None
}

/// Probe `source` and open the matching reader.
pub fn open_reader<R>(source: R, ps_config: PsConfig) -> Result<Box<dyn Reader>>
where
    R: Read + Seek + 'static,
{
    let mut source = source;
    let container = detect_container(&mut source).ok_or(Error::UnknownFormat)?;
    debug!("Detected container: {}", container);

    match container {
        Container::Tta => Ok(Box::new(TtaReader::new(source)?)),
        Container::MpegPs => Ok(Box::new(MpegPsReader::with_config(source, ps_config)?)),
    }
}

/// Open a file and hand it to [`open_reader`].
pub fn open_file(path: impl AsRef<Path>, ps_config: PsConfig) -> Result<Box<dyn Reader>> {
    let file = File::open(path.as_ref())?;
    open_reader(BufReader::new(file), ps_config)
}

/// Get container type from file extension (fallback)
pub fn container_from_extension(path: &Path) -> Option<Container> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "mpg" | "mpeg" | "vob" | "evo" | "m2p" | "ps" => Some(Container::MpegPs),
        "tta" => Some(Container::Tta),
        _ => None,
    }
}
