//! Sinks writing demuxed tracks to disk.

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use mediasplice_demux::{Frame, FrameSink, TrackInfo};

/// Counters of one written track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackStats {
    pub frames: u64,
    pub bytes: u64,
    /// First write error. Later frames are dropped once this is set.
    pub error: Option<String>,
}

/// Writes the raw payload of every frame into one file.
pub struct FileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    stats: Rc<RefCell<TrackStats>>,
}

impl FileSink {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file =
            File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            stats: Rc::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Handle to the counters, valid after the sink is boxed and moved.
    pub fn stats(&self) -> Rc<RefCell<TrackStats>> {
        Rc::clone(&self.stats)
    }

    fn fail(&mut self, err: std::io::Error) {
        tracing::error!("Writing {:?} failed: {}", self.path, err);
        self.stats.borrow_mut().error = Some(err.to_string());
        self.writer = None;
    }
}

impl FrameSink for FileSink {
    fn process(&mut self, frame: Frame) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(err) = writer.write_all(&frame.data) {
            self.fail(err);
            return;
        }
        let mut stats = self.stats.borrow_mut();
        stats.frames += 1;
        stats.bytes += frame.len() as u64;
    }

    fn flush(&mut self) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if let Err(err) = writer.flush() {
            self.fail(err);
        }
    }
}

/// Output file name for a track: `track<N>.<ext>`.
pub fn track_file_name(track: &TrackInfo) -> String {
    format!("track{}.{}", track.index, track.codec.file_extension())
}
