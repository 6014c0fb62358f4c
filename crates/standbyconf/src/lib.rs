//! Configuration loading for standby.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/standby/config.toml` (system)
//! 2. `~/.config/standby/config.toml` (user)
//! 3. `./standby.toml`, or the file given with `--config`
//! 4. Environment variables (`STANDBY_*`)
//!
//! Command-line flags are applied by the binary on top of all of these.
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! output_dir = "/srv/transcoder/out"
//!
//! [watch]
//! pattern = '\.(m3u8|ts|vtt)$'
//! settle_delay_ms = 500
//! request_timeout_ms = 0
//!
//! [bind]
//! host = "0.0.0.0"
//! http_port = 8080
//!
//! [key]
//! prefix = ""
//! info_hash = "08ada5a7a6183aae1e09d831df6748d566095a10"
//! origin_path = "/Sintel/Sintel.mp4"
//!
//! [telemetry]
//! log_level = "info"
//! otlp_endpoint = ""
//! ```

pub mod infra;
pub mod loader;

pub use infra::{BindConfig, KeyConfig, PathsConfig, TelemetryConfig, WatchConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete standby configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StandbyConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub key: KeyConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl StandbyConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` stand in for `./standby.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = StandbyConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let overlay = loader::load_from_file(&path)?;
            loader::merge_overlay(&mut config, overlay);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let body = toml::to_string_pretty(self).unwrap_or_default();
        format!("# standby configuration\n\n{}", body)
    }
}
