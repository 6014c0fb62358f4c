//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, StandbyConfig};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/standby/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("standby/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("standby.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// What a single file sets. Absent keys leave the base config alone.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigOverlay {
    paths: PathsOverlay,
    watch: WatchOverlay,
    bind: BindOverlay,
    key: KeyOverlay,
    telemetry: TelemetryOverlay,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PathsOverlay {
    output_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WatchOverlay {
    pattern: Option<String>,
    settle_delay_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BindOverlay {
    host: Option<String>,
    http_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KeyOverlay {
    prefix: Option<String>,
    info_hash: Option<String>,
    origin_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TelemetryOverlay {
    otlp_endpoint: Option<String>,
    log_level: Option<String>,
}

/// Load the keys set by a TOML file.
pub fn load_from_file(path: &Path) -> Result<ConfigOverlay, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

fn parse_toml(contents: &str, path: &Path) -> Result<ConfigOverlay, ConfigError> {
    toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Apply the keys set in `overlay` on top of `config`.
pub fn merge_overlay(config: &mut StandbyConfig, overlay: ConfigOverlay) {
    if let Some(v) = overlay.paths.output_dir {
        config.paths.output_dir = expand_path(&v);
    }

    if let Some(v) = overlay.watch.pattern {
        config.watch.pattern = v;
    }
    if let Some(v) = overlay.watch.settle_delay_ms {
        config.watch.settle_delay_ms = v;
    }
    if let Some(v) = overlay.watch.request_timeout_ms {
        config.watch.request_timeout_ms = v;
    }

    if let Some(v) = overlay.bind.host {
        config.bind.host = v;
    }
    if let Some(v) = overlay.bind.http_port {
        config.bind.http_port = v;
    }

    if let Some(v) = overlay.key.prefix {
        config.key.prefix = v;
    }
    if let Some(v) = overlay.key.info_hash {
        config.key.info_hash = v;
    }
    if let Some(v) = overlay.key.origin_path {
        config.key.origin_path = v;
    }

    if let Some(v) = overlay.telemetry.otlp_endpoint {
        config.telemetry.otlp_endpoint = v;
    }
    if let Some(v) = overlay.telemetry.log_level {
        config.telemetry.log_level = v;
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut StandbyConfig, sources: &mut ConfigSources) {
    apply_overrides(config, sources, |name| env::var(name).ok());
}

/// Apply overrides from any variable lookup. Split out so tests don't touch the process env.
pub(crate) fn apply_overrides(
    config: &mut StandbyConfig,
    sources: &mut ConfigSources,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let mut vars = EnvLookup {
        lookup,
        applied: &mut sources.env_overrides,
    };

    if let Some(v) = vars.text("STANDBY_OUTPUT_DIR") {
        config.paths.output_dir = expand_path(&v);
    }

    if let Some(v) = vars.text("STANDBY_PATTERN") {
        config.watch.pattern = v;
    }
    if let Some(v) = vars.parsed("STANDBY_SETTLE_DELAY_MS") {
        config.watch.settle_delay_ms = v;
    }
    if let Some(v) = vars.parsed("STANDBY_REQUEST_TIMEOUT_MS") {
        config.watch.request_timeout_ms = v;
    }

    if let Some(v) = vars.text("STANDBY_HOST") {
        config.bind.host = v;
    }
    if let Some(v) = vars.parsed("STANDBY_HTTP_PORT") {
        config.bind.http_port = v;
    }

    if let Some(v) = vars.text("STANDBY_KEY_PREFIX") {
        config.key.prefix = v;
    }
    if let Some(v) = vars.text("STANDBY_INFO_HASH") {
        config.key.info_hash = v;
    }
    if let Some(v) = vars.text("STANDBY_ORIGIN_PATH") {
        config.key.origin_path = v;
    }

    if let Some(v) = vars.text("STANDBY_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
    }
    // Also support standard OTEL env var
    if let Some(v) = vars.text("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
    }
    if let Some(v) = vars.text("STANDBY_LOG_LEVEL") {
        config.telemetry.log_level = v;
    }
    if let Some(v) = vars.text("RUST_LOG") {
        config.telemetry.log_level = v;
    }
}

/// Variable lookup that only records a name once its value is applied.
struct EnvLookup<'a, F> {
    lookup: F,
    applied: &'a mut Vec<String>,
}

impl<F: Fn(&str) -> Option<String>> EnvLookup<'_, F> {
    fn text(&mut self, name: &str) -> Option<String> {
        let value = (self.lookup)(name)?;
        self.applied.push(name.to_string());
        Some(value)
    }

    /// Unparsable values are skipped and not recorded.
    fn parsed<T: FromStr>(&mut self, name: &str) -> Option<T> {
        let value = (self.lookup)(name)?.parse().ok()?;
        self.applied.push(name.to_string());
        Some(value)
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(stripped);
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        let (var_name, rest) = stripped.split_once('/').unwrap_or((stripped, ""));
        if let Ok(var_value) = env::var(var_name) {
            return PathBuf::from(var_value).join(rest);
        }
    }

    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let expanded = expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_path_unknown_var_is_literal() {
        let expanded = expand_path("$STANDBY_SURELY_UNSET_VAR/out");
        assert_eq!(expanded, PathBuf::from("$STANDBY_SURELY_UNSET_VAR/out"));
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[paths]
output_dir = "/srv/out"
"#;
        let overlay = parse_toml(toml, Path::new("test.toml")).unwrap();
        let mut config = StandbyConfig::default();
        merge_overlay(&mut config, overlay);

        assert_eq!(config.paths.output_dir, PathBuf::from("/srv/out"));
        // Other values should be defaults
        assert_eq!(config.bind.http_port, 8080);
        assert_eq!(config.watch.settle_delay_ms, 500);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[paths]
output_dir = "/data/out"

[watch]
pattern = '^output-.*\.dat$'
settle_delay_ms = 250
request_timeout_ms = 30000

[bind]
host = "127.0.0.1"
http_port = 9000

[key]
prefix = "cache-"
info_hash = "08ada5a7a6183aae1e09d831df6748d566095a10"
origin_path = "/Sintel/Sintel.mp4"

[telemetry]
log_level = "debug"
otlp_endpoint = "127.0.0.1:4317"
"#;
        let overlay = parse_toml(toml, Path::new("test.toml")).unwrap();
        let mut config = StandbyConfig::default();
        merge_overlay(&mut config, overlay);

        assert_eq!(config.paths.output_dir, PathBuf::from("/data/out"));
        assert_eq!(config.watch.pattern, r"^output-.*\.dat$");
        assert_eq!(config.watch.settle_delay_ms, 250);
        assert_eq!(config.watch.request_timeout_ms, 30000);
        assert_eq!(config.bind.addr(), "127.0.0.1:9000");
        assert_eq!(config.key.prefix, "cache-");
        assert_eq!(config.key.origin_path, "/Sintel/Sintel.mp4");
        assert_eq!(config.telemetry.log_level, "debug");
        assert_eq!(config.telemetry.otlp_endpoint, "127.0.0.1:4317");
    }

    #[test]
    fn test_later_overlay_wins_only_where_set() {
        let mut config = StandbyConfig::default();
        let system = parse_toml(
            "[bind]\nhttp_port = 9000\n[watch]\nsettle_delay_ms = 100\n",
            Path::new("system.toml"),
        )
        .unwrap();
        let local = parse_toml("[bind]\nhttp_port = 9100\n", Path::new("local.toml")).unwrap();

        merge_overlay(&mut config, system);
        merge_overlay(&mut config, local);

        assert_eq!(config.bind.http_port, 9100);
        assert_eq!(config.watch.settle_delay_ms, 100);
    }

    #[test]
    fn test_parse_error_names_file() {
        let result = parse_toml("[bind]\nhttp_port = \"not a port\"\n", Path::new("bad.toml"));
        match result {
            Err(ConfigError::Parse { path, .. }) => assert_eq!(path, PathBuf::from("bad.toml")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_env_overrides_are_recorded() {
        let vars: HashMap<&str, &str> = [
            ("STANDBY_OUTPUT_DIR", "/env/out"),
            ("STANDBY_HTTP_PORT", "7000"),
            ("STANDBY_SETTLE_DELAY_MS", "not-a-number"),
            ("STANDBY_INFO_HASH", "abc"),
        ]
        .into_iter()
        .collect();

        let mut config = StandbyConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides(&mut config, &mut sources, |name| {
            vars.get(name).map(|v| v.to_string())
        });

        assert_eq!(config.paths.output_dir, PathBuf::from("/env/out"));
        assert_eq!(config.bind.http_port, 7000);
        assert_eq!(config.watch.settle_delay_ms, 500);
        assert_eq!(config.key.info_hash, "abc");
        assert!(sources.env_overrides.contains(&"STANDBY_HTTP_PORT".to_string()));
        assert!(!sources.env_overrides.contains(&"STANDBY_HOST".to_string()));
        // Ignored values are not reported as overrides
        assert!(!sources
            .env_overrides
            .contains(&"STANDBY_SETTLE_DELAY_MS".to_string()));
    }
}
