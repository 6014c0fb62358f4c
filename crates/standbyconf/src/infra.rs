//! Configuration sections.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Filesystem locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory artifacts are written to and served from.
    /// Default: ./out
    #[serde(default = "PathsConfig::default_output_dir")]
    pub output_dir: PathBuf,
}

impl PathsConfig {
    fn default_output_dir() -> PathBuf {
        PathBuf::from("out")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: Self::default_output_dir(),
        }
    }
}

/// Which artifacts to wait for and for how long.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Regular expression matched against artifact base names.
    /// Default: playlists, segments and subtitles
    #[serde(default = "WatchConfig::default_pattern")]
    pub pattern: String,

    /// Delay between a filesystem event and releasing waiters.
    /// Default: 500
    #[serde(default = "WatchConfig::default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Longest a request may wait for its artifact. 0 waits until the client leaves.
    /// Default: 0
    #[serde(default)]
    pub request_timeout_ms: u64,
}

impl WatchConfig {
    fn default_pattern() -> String {
        r"\.(m3u8|ts|vtt)$".to_string()
    }

    fn default_settle_delay_ms() -> u64 {
        500
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            pattern: Self::default_pattern(),
            settle_delay_ms: Self::default_settle_delay_ms(),
            request_timeout_ms: 0,
        }
    }
}

/// HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Default: 0.0.0.0
    #[serde(default = "BindConfig::default_host")]
    pub host: String,

    /// Default: 8080
    #[serde(default = "BindConfig::default_http_port")]
    pub http_port: u16,
}

impl BindConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_http_port() -> u16 {
        8080
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            http_port: Self::default_http_port(),
        }
    }
}

/// Inputs to the cache key derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfig {
    #[serde(default)]
    pub prefix: String,

    #[serde(default)]
    pub info_hash: String,

    #[serde(default)]
    pub origin_path: String,
}

/// Logging and export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint. Empty disables export.
    #[serde(default)]
    pub otlp_endpoint: String,

    /// Log filter (trace, debug, info, warn, error, or an EnvFilter directive).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: String::new(),
            log_level: Self::default_log_level(),
        }
    }
}
