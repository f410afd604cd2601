use mediasplice_chapters::ChapterDefaults;
use mediasplice_demux::{PsConfig, DEFAULT_PROBE_SIZE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub demux: DemuxConfig,

    #[serde(default)]
    pub chapters: ChaptersConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DemuxConfig {
    /// Bytes of a program stream inspected while classifying tracks
    #[serde(default = "default_probe_size")]
    pub probe_size: u64,
}

fn default_probe_size() -> u64 {
    DEFAULT_PROBE_SIZE
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            probe_size: default_probe_size(),
        }
    }
}

impl DemuxConfig {
    pub fn ps_config(&self) -> PsConfig {
        PsConfig {
            probe_size: self.probe_size,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ChaptersConfig {
    /// Language for chapter names when neither the file nor the command
    /// line names one
    #[serde(default)]
    pub default_language: Option<String>,

    #[serde(default)]
    pub default_country: Option<String>,

    /// Seed for generated UIDs. Random when unset.
    #[serde(default)]
    pub uid_seed: Option<u64>,
}

impl ChaptersConfig {
    pub fn defaults(&self) -> ChapterDefaults {
        ChapterDefaults {
            language: self.default_language.clone(),
            country: self.default_country.clone(),
        }
    }
}
