//! # mediasplice-demux
//!
//! Demultiplexers for MPEG program streams and TTA audio.
//!
//! A reader walks a seekable source, classifies the elementary streams it
//! carries and then hands out their payloads frame by frame to per-track
//! sinks. Nothing is decoded; the crate only locates, classifies and
//! timestamps frame boundaries.
//!
//! ## Features
//!
//! - MPEG-1/2 program streams with MPEG-1/2 video, AVC/h.264, VC-1, MPEG
//!   audio, AC-3/E-AC-3 and DTS tracks
//! - TTA lossless audio with seek table validation and ID3 tag skipping
//! - Resynchronisation after garbage or truncated packets
//! - Identification summaries, serializable with the `serialize` feature
//!
//! ## Example
//!
//! ```no_run
//! use mediasplice_demux::{open_file, FileStatus, MemorySink, PsConfig};
//!
//! let mut reader = open_file("movie.vob", PsConfig::default()).unwrap();
//!
//! let identification = reader.identify();
//! println!("Container: {}", identification.container);
//!
//! let sink = MemorySink::new();
//! reader.set_sink(0, Box::new(sink.clone())).unwrap();
//! while reader.read().unwrap() == FileStatus::MoreData {}
//!
//! println!("{} frames, {} bytes", sink.frame_count(), sink.total_bytes());
//! ```

pub mod codec;
pub mod container;
pub mod cursor;
pub mod error;
pub mod sink;
pub mod types;

pub use container::mpeg_ps::DEFAULT_PROBE_SIZE;
pub use container::{
    detect_container, open_file, open_reader, Container, MpegPsReader, PsConfig, Reader,
    TtaReader,
};
pub use error::{Error, Result};
pub use sink::{FrameSink, MemorySink};
pub use types::*;
