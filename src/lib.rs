//! Mediasplice - demultiplexing and chapter editing
//!
//! This library crate exposes the command line plumbing for integration
//! testing.

pub mod config;
pub mod output;
pub mod report;
pub mod timecode;
