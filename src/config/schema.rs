//! Configuration schema for prompt-pulse
//!
//! Configuration is stored at `~/.config/prompt-pulse/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Key/value cache settings
    pub cache: CacheConfig,

    /// Image source and rendered-image cache settings
    pub images: ImagesConfig,

    /// External renderer settings
    pub render: RenderConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Key/value cache configuration
///
/// Values are kept signed so that out-of-range settings can be coerced to
/// defaults instead of failing to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory (default: `<cache dir>/prompt-pulse/kv`)
    pub dir: Option<PathBuf>,

    /// Total payload budget in MB (≤ 0 = 50)
    pub max_size_mb: i64,

    /// TTL for entries stored without one (< 0 = 3600, 0 = never expire)
    pub default_ttl_secs: i64,

    /// Seconds between expiry sweeps (≤ 0 = 300)
    pub cleanup_interval_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_size_mb: 50,
            default_ttl_secs: 3600,
            cleanup_interval_secs: 300,
        }
    }
}

/// Image configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Directory of source images to pick from
    pub dir: Option<PathBuf>,

    /// Rendered-image cache directory (default: `<cache dir>/prompt-pulse/images`)
    pub cache_dir: Option<PathBuf>,

    /// Rendered-image cache budget in MB, enforced by prune
    pub max_size_mb: u64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: None,
            cache_dir: None,
            max_size_mb: 100,
        }
    }
}

/// External renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Renderer program
    pub program: String,

    /// Argument template; `{path}`, `{width}`, `{height}` and `{protocol}`
    /// are substituted
    pub args: Vec<String>,

    /// Protocol tag used for cache keys and the `{protocol}` placeholder
    pub protocol: String,

    /// Default render width in terminal cells
    pub width: u32,

    /// Default render height in terminal cells
    pub height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            program: "chafa".to_string(),
            args: vec![
                "--format={protocol}".to_string(),
                "--size={width}x{height}".to_string(),
                "{path}".to_string(),
            ],
            protocol: "symbols".to_string(),
            width: 40,
            height: 20,
        }
    }
}
