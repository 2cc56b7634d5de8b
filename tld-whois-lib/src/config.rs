//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files, reading
//! `TW_*` environment variables, and merging configurations with proper
//! precedence rules.

use crate::error::TldWhoisError;
use crate::types::{DispatchMode, MAX_CONCURRENCY};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration loaded from TOML files.
///
/// ```toml
/// [query]
/// endpoint = "whois.iana.org:43"
/// connect_timeout = "10s"
///
/// [engine]
/// concurrency = 50
/// mode = "pool"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Query endpoint and deadlines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryConfig>,

    /// Identifier feed location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<FeedConfig>,

    /// Output table settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,

    /// Concurrency and termination settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct QueryConfig {
    /// WHOIS endpoint as `host:port`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Prefix of the result line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,

    /// Connect deadline (e.g., "10s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<String>,

    /// Read deadline (e.g., "20s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_timeout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FeedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Local feed file, takes precedence over `url`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OutputConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Write rows in feed order instead of completion order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordered: Option<bool>,

    /// Write rows for failed lookups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_failures: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier_column: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_column: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EngineConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Collector safety net (e.g., "60s", "off")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactivity_window: Option<String>,

    /// "per-item" or "pool"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl QueryConfig {
    fn merge(self, higher: Self) -> Self {
        Self {
            endpoint: higher.endpoint.or(self.endpoint),
            marker: higher.marker.or(self.marker),
            connect_timeout: higher.connect_timeout.or(self.connect_timeout),
            read_timeout: higher.read_timeout.or(self.read_timeout),
        }
    }
}

impl FeedConfig {
    fn merge(self, higher: Self) -> Self {
        Self {
            url: higher.url.or(self.url),
            file: higher.file.or(self.file),
        }
    }
}

impl OutputConfig {
    fn merge(self, higher: Self) -> Self {
        Self {
            path: higher.path.or(self.path),
            ordered: higher.ordered.or(self.ordered),
            include_failures: higher.include_failures.or(self.include_failures),
            identifier_column: higher.identifier_column.or(self.identifier_column),
            attribute_column: higher.attribute_column.or(self.attribute_column),
        }
    }
}

impl EngineConfig {
    fn merge(self, higher: Self) -> Self {
        Self {
            concurrency: higher.concurrency.or(self.concurrency),
            inactivity_window: higher.inactivity_window.or(self.inactivity_window),
            mode: higher.mode.or(self.mode),
        }
    }
}

/// Merge two optional sections, field by field when both are present.
fn merge_section<T>(lower: Option<T>, higher: Option<T>, merge: fn(T, T) -> T) -> Option<T> {
    match (lower, higher) {
        (Some(lower), Some(higher)) => Some(merge(lower, higher)),
        (lower, higher) => higher.or(lower),
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to report which config files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `FileError` if the file is missing or unreadable, and
    /// `ConfigError` if it is not valid TOML or fails validation.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, TldWhoisError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(TldWhoisError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            TldWhoisError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            TldWhoisError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config < global (`$HOME`) config < local (current directory)
    /// config. Files that fail to load are skipped.
    pub fn discover_and_load(&self) -> Result<FileConfig, TldWhoisError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring config file");
                }
            }
        }

        if self.verbose && loaded_files.len() > 1 {
            let files: Vec<String> = loaded_files
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            tracing::info!(
                files = ?files,
                "multiple config files found, later files take precedence"
            );
        }

        Ok(merged_config)
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./tld-whois.toml", "./.tld-whois.toml"]
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".tld-whois.toml", "tld-whois.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("tld-whois").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations; values from `higher` win.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            query: merge_section(lower.query, higher.query, QueryConfig::merge),
            feed: merge_section(lower.feed, higher.feed, FeedConfig::merge),
            output: merge_section(lower.output, higher.output, OutputConfig::merge),
            engine: merge_section(lower.engine, higher.engine, EngineConfig::merge),
        }
    }

    fn validate_config(&self, config: &FileConfig) -> Result<(), TldWhoisError> {
        if let Some(query) = &config.query {
            if let Some(endpoint) = &query.endpoint {
                validate_endpoint(endpoint)?;
            }
            if let Some(marker) = &query.marker {
                if marker.trim().is_empty() {
                    return Err(TldWhoisError::config("Marker cannot be empty"));
                }
            }
            for timeout in [&query.connect_timeout, &query.read_timeout].into_iter().flatten() {
                validate_duration(timeout)?;
            }
        }

        if let Some(engine) = &config.engine {
            if let Some(concurrency) = engine.concurrency {
                validate_concurrency(concurrency)?;
            }
            if let Some(window) = &engine.inactivity_window {
                parse_window_string(window).ok_or_else(|| {
                    TldWhoisError::config(format!(
                        "Invalid inactivity window '{}'. Use a duration like '60s' or 'off'",
                        window
                    ))
                })?;
            }
            if let Some(mode) = &engine.mode {
                mode.parse::<DispatchMode>().map_err(TldWhoisError::config)?;
            }
        }

        if let Some(output) = &config.output {
            for column in [&output.identifier_column, &output.attribute_column]
                .into_iter()
                .flatten()
            {
                if column.trim().is_empty() {
                    return Err(TldWhoisError::config("Column names cannot be empty"));
                }
            }
        }

        Ok(())
    }
}

/// Check that an endpoint looks like `host:port`.
pub fn validate_endpoint(endpoint: &str) -> Result<(), TldWhoisError> {
    let valid = endpoint
        .rsplit_once(':')
        .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
        .unwrap_or(false);

    if valid {
        Ok(())
    } else {
        Err(TldWhoisError::config(format!(
            "Invalid endpoint '{}'. Use host:port, e.g. 'whois.iana.org:43'",
            endpoint
        )))
    }
}

pub fn validate_concurrency(concurrency: usize) -> Result<(), TldWhoisError> {
    if concurrency == 0 || concurrency > MAX_CONCURRENCY {
        return Err(TldWhoisError::config(format!(
            "Concurrency must be between 1 and {}",
            MAX_CONCURRENCY
        )));
    }
    Ok(())
}

/// Timeouts must parse and be positive.
fn validate_duration(value: &str) -> Result<(), TldWhoisError> {
    match parse_duration_string(value) {
        Some(duration) if !duration.is_zero() => Ok(()),
        Some(_) => Err(TldWhoisError::config(format!(
            "Timeout '{}' must be greater than zero",
            value
        ))),
        None => Err(TldWhoisError::config(format!(
            "Invalid duration '{}'. Use format like '500ms', '5s', '2m'",
            value
        ))),
    }
}

/// Environment variable configuration that mirrors CLI options.
///
/// This represents configuration values that can be set via TW_* environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub endpoint: Option<String>,
    pub feed_url: Option<String>,
    pub feed_file: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    /// `Some(None)` means the safety net was explicitly disabled
    pub inactivity_window: Option<Option<Duration>>,
    pub mode: Option<DispatchMode>,
    pub ordered: Option<bool>,
    pub config: Option<PathBuf>,
}

/// Load configuration from environment variables.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config() -> EnvConfig {
    load_env_from(|name| env::var(name).ok())
}

/// Same as [`load_env_config`], reading variables through `lookup`.
pub fn load_env_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut env_config = EnvConfig::default();

    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    // TW_ENDPOINT - WHOIS endpoint host:port
    if let Some(endpoint) = non_empty("TW_ENDPOINT") {
        match validate_endpoint(&endpoint) {
            Ok(()) => env_config.endpoint = Some(endpoint),
            Err(e) => tracing::warn!(error = %e, "ignoring TW_ENDPOINT"),
        }
    }

    env_config.feed_url = non_empty("TW_FEED_URL");
    env_config.feed_file = non_empty("TW_FEED_FILE").map(PathBuf::from);
    env_config.output = non_empty("TW_OUTPUT").map(PathBuf::from);
    env_config.config = non_empty("TW_CONFIG").map(PathBuf::from);

    // TW_CONCURRENCY - concurrent queries
    if let Some(val) = non_empty("TW_CONCURRENCY") {
        match val.trim().parse::<usize>() {
            Ok(concurrency) if validate_concurrency(concurrency).is_ok() => {
                env_config.concurrency = Some(concurrency);
            }
            _ => tracing::warn!(
                value = %val,
                "invalid TW_CONCURRENCY, must be 1-{}",
                MAX_CONCURRENCY
            ),
        }
    }

    for (name, slot) in [
        ("TW_CONNECT_TIMEOUT", &mut env_config.connect_timeout),
        ("TW_READ_TIMEOUT", &mut env_config.read_timeout),
    ] {
        if let Some(val) = non_empty(name) {
            match parse_duration_string(&val) {
                Some(duration) if !duration.is_zero() => *slot = Some(duration),
                Some(_) => tracing::warn!(value = %val, "{} must be greater than zero", name),
                None => tracing::warn!(value = %val, "invalid {}, use format like '5s'", name),
            }
        }
    }

    // TW_INACTIVITY_WINDOW - collector safety net, "off" disables it
    if let Some(val) = non_empty("TW_INACTIVITY_WINDOW") {
        match parse_window_string(&val) {
            Some(window) => env_config.inactivity_window = Some(window),
            None => tracing::warn!(value = %val, "invalid TW_INACTIVITY_WINDOW"),
        }
    }

    // TW_MODE - per-item or pool
    if let Some(val) = non_empty("TW_MODE") {
        match val.parse::<DispatchMode>() {
            Ok(mode) => env_config.mode = Some(mode),
            Err(e) => tracing::warn!(error = %e, "ignoring TW_MODE"),
        }
    }

    // TW_ORDERED - write rows in feed order
    if let Some(val) = non_empty("TW_ORDERED") {
        match parse_bool(&val) {
            Some(ordered) => env_config.ordered = Some(ordered),
            None => tracing::warn!(value = %val, "invalid TW_ORDERED, use true/false"),
        }
    }

    env_config
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a duration string like "500ms", "5s", "2m", or bare seconds.
///
/// # Returns
///
/// The parsed duration, or None if parsing fails.
pub fn parse_duration_string(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = value.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .map(|m| Duration::from_secs(m * 60))
    } else {
        // Assume seconds if no unit
        value.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// Parse an inactivity window: a duration, or "off"/"none"/"0" to disable it.
pub fn parse_window_string(value: &str) -> Option<Option<Duration>> {
    match value.trim().to_lowercase().as_str() {
        "off" | "none" | "disabled" => Some(None),
        other => parse_duration_string(other).map(|d| (!d.is_zero()).then_some(d)),
    }
}
