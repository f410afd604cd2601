//! Downstream frame consumers.

use std::cell::RefCell;
use std::rc::Rc;

use crate::types::Frame;

/// Per-track consumer of demuxed frames.
///
/// Ownership of each frame passes to the sink. `flush` is called exactly
/// once when the demuxer reaches the end of its input.
pub trait FrameSink {
    fn process(&mut self, frame: Frame);
    fn flush(&mut self);
}

/// State shared between a [`MemorySink`] and its handles.
#[derive(Debug, Default)]
pub struct MemorySinkState {
    pub frames: Vec<Frame>,
    pub flush_count: usize,
}

/// Sink that keeps every frame in memory.
///
/// Clones share the same storage, so a handle can be kept by the caller
/// while a boxed clone is handed to the demuxer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Rc<RefCell<MemorySinkState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all frames received so far.
    pub fn frames(&self) -> Vec<Frame> {
        self.state.borrow().frames.clone()
    }

    pub fn frame_count(&self) -> usize {
        self.state.borrow().frames.len()
    }

    /// Total payload bytes received.
    pub fn total_bytes(&self) -> usize {
        self.state.borrow().frames.iter().map(Frame::len).sum()
    }

    pub fn flush_count(&self) -> usize {
        self.state.borrow().flush_count
    }
}

impl FrameSink for MemorySink {
    fn process(&mut self, frame: Frame) {
        self.state.borrow_mut().frames.push(frame);
    }

    fn flush(&mut self) {
        self.state.borrow_mut().flush_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_handles_share_state() {
        let handle = MemorySink::new();
        let mut boxed: Box<dyn FrameSink> = Box::new(handle.clone());

        boxed.process(Frame::new(vec![1u8, 2, 3]));
        boxed.process(Frame::new(vec![4u8]));
        boxed.flush();

        assert_eq!(handle.frame_count(), 2);
        assert_eq!(handle.total_bytes(), 4);
        assert_eq!(handle.flush_count(), 1);
    }
}
