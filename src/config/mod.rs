//! Configuration management for prompt-pulse
//!
//! Settings come from one TOML file; a missing file means all defaults.
//! Directory settings are optional and resolve against the platform cache,
//! config and picture directories.

pub mod schema;

pub use schema::{CacheConfig, Config, GeneralConfig, ImagesConfig, RenderConfig};

use crate::cache::atomic::{atomic_write, TempPattern};
use crate::error::{PulseError, PulseResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Application directory name under the platform directories
const APP_DIR: &str = "prompt-pulse";

/// Loads and saves the config file
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for the default config location
    pub fn new() -> Self {
        Self::with_path(Self::default_config_path())
    }

    /// Manager for an explicit config file (`--config`)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// `<config dir>/prompt-pulse/config.toml`
    pub fn default_config_path() -> PathBuf {
        platform_dir(dirs::config_dir()).join("config.toml")
    }

    /// `<cache dir>/prompt-pulse`, parent of both caches by default
    pub fn cache_root() -> PathBuf {
        platform_dir(dirs::cache_dir())
    }

    /// Key/value cache directory, honoring `[cache] dir`
    pub fn kv_dir(config: &Config) -> PathBuf {
        match &config.cache.dir {
            Some(dir) => dir.clone(),
            None => Self::cache_root().join("kv"),
        }
    }

    /// Rendered-image cache directory, honoring `[images] cache_dir`
    pub fn image_cache_dir(config: &Config) -> PathBuf {
        match &config.images.cache_dir {
            Some(dir) => dir.clone(),
            None => Self::cache_root().join("images"),
        }
    }

    /// Source image directory, honoring `[images] dir`
    pub fn image_dir(config: &Config) -> PathBuf {
        match &config.images.dir {
            Some(dir) => dir.clone(),
            None => dirs::picture_dir()
                .map(|pictures| pictures.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from("images")),
        }
    }

    /// Read the config file; a missing file yields the defaults
    pub async fn load(&self) -> PulseResult<Config> {
        match fs::try_exists(&self.config_path).await {
            Ok(true) => self.load_from_file(&self.config_path).await,
            _ => {
                debug!(
                    "No config at {}, using defaults",
                    self.config_path.display()
                );
                Ok(Config::default())
            }
        }
    }

    /// Parse a specific TOML file
    pub async fn load_from_file(&self, path: &Path) -> PulseResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PulseError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| PulseError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Write the config file atomically, creating its directory
    pub async fn save(&self, config: &Config) -> PulseResult<()> {
        let parent = match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .await
            .map_err(|e| PulseError::ConfigDirCreate {
                path: parent.clone(),
                source: e,
            })?;

        let content = toml::to_string_pretty(config)?;
        atomic_write(
            &self.config_path,
            content.as_bytes(),
            &parent,
            TempPattern::CONFIG,
        )
        .await?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn platform_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}
