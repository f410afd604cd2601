use clap::{Parser, Subcommand};
use mediasplice::timecode::{parse_signed_timecode, parse_timecode};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediasplice")]
#[command(author, version, about = "Demultiplex MPEG program streams and TTA audio, edit chapters")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify a media file and list its tracks
    Identify {
        /// File to identify
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract every track of a media file into raw elementary streams
    Demux {
        /// File to demux
        #[arg(required = true)]
        file: PathBuf,

        /// Directory receiving track<N>.<ext> files
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Parse a chapter file and apply timeframe and timecode edits
    Chapters {
        /// Chapter file to read
        #[arg(required = true)]
        file: PathBuf,

        /// Drop chapters starting before this timecode ([[HH:]MM:]SS[.fff])
        #[arg(long, value_parser = parse_timecode)]
        min: Option<u64>,

        /// Drop chapters starting after this timecode
        #[arg(long, value_parser = parse_timecode)]
        max: Option<u64>,

        /// Subtract this timecode from every kept chapter
        #[arg(long, value_parser = parse_timecode)]
        offset: Option<u64>,

        /// Shift all timecodes, may be negative
        #[arg(long, value_parser = parse_signed_timecode, allow_hyphen_values = true)]
        adjust: Option<i64>,

        /// Merge chapters sharing a UID
        #[arg(long)]
        merge: bool,

        /// Language of the chapter names
        #[arg(short, long)]
        language: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
