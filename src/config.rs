use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use log::warn;

const DEFAULT_SIZE_MB: usize = 8;
const DEFAULT_INTERVAL_MS: u64 = 500;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct BufferConfig {
    #[serde(default)]
    pub size_mb: Option<usize>,
    /// Exact capacity; wins over `size_mb`.
    #[serde(default)]
    pub size_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct StatusConfig {
    #[serde(default)]
    pub interval_ms: Option<u64>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Values given on the command line. They take precedence over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub size_mb: Option<usize>,
    pub size_bytes: Option<usize>,
    pub interval_ms: Option<u64>,
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub capacity: usize,
    pub interval: Duration,
    pub status_enabled: bool,
}

pub fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(format!("{}/.config/fv/config.toml", home))
    } else {
        PathBuf::from("/etc/fv/config.toml")
    }
}

pub fn load_config(path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

    let cfg: Config = toml::from_str(&content)
        .map_err(|e| format!("Failed to parse TOML config {}: {}", path.display(), e))?;

    log::info!("Config loaded from: {}", path.display());
    Ok(cfg)
}

/// Load the config named on the command line, or the default one if present.
///
/// Only an explicitly named file has to exist.
pub fn load_settings(
    explicit: Option<&Path>,
    overrides: &Overrides,
) -> Result<Settings, Box<dyn std::error::Error>> {
    let cfg = match explicit {
        Some(path) => load_config(path)?,
        None => {
            let path = default_config_path();
            if path.exists() {
                load_config(&path)?
            } else {
                log::debug!("No config at {}, using defaults", path.display());
                Config::default()
            }
        }
    };
    resolve(cfg, overrides)
}

pub fn resolve(cfg: Config, overrides: &Overrides) -> Result<Settings, Box<dyn std::error::Error>> {
    let capacity = match (overrides.size_bytes, overrides.size_mb) {
        (Some(bytes), _) => bytes,
        (None, Some(mb)) => megabytes(mb)?,
        (None, None) => match (cfg.buffer.size_bytes, cfg.buffer.size_mb) {
            (Some(bytes), _) => bytes,
            (None, mb) => megabytes(mb.unwrap_or(DEFAULT_SIZE_MB))?,
        },
    };
    if capacity == 0 {
        return Err("Buffer size must be at least one byte".into());
    }
    if capacity < 8 {
        warn!("Buffer of {} bytes is tiny - every write will be a single byte", capacity);
    }

    let interval_ms = overrides
        .interval_ms
        .or(cfg.status.interval_ms)
        .unwrap_or(DEFAULT_INTERVAL_MS);
    if interval_ms == 0 {
        return Err("Status interval must be at least 1 ms".into());
    }

    let status_enabled = !overrides.quiet && cfg.status.enabled.unwrap_or(true);

    Ok(Settings {
        capacity,
        interval: Duration::from_millis(interval_ms),
        status_enabled,
    })
}

fn megabytes(mb: usize) -> Result<usize, Box<dyn std::error::Error>> {
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| format!("Buffer size of {} MB is too large", mb).into())
}
