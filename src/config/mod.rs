mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Smallest accepted classification look-ahead
pub const MIN_PROBE_SIZE: u64 = 4096;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./mediasplice.toml", "~/.config/mediasplice/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.demux.probe_size < MIN_PROBE_SIZE {
        anyhow::bail!(
            "demux.probe_size must be at least {} bytes, got {}",
            MIN_PROBE_SIZE,
            config.demux.probe_size
        );
    }

    for (key, value) in [
        ("chapters.default_language", &config.chapters.default_language),
        ("chapters.default_country", &config.chapters.default_country),
    ] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            anyhow::bail!("{} cannot be empty", key);
        }
    }

    Ok(())
}
