//! Core data types for TLD WHOIS resolution.
//!
//! This module defines the outcome of a single query, the run configuration
//! and the summary returned at the end of a scan.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default query endpoint (IANA WHOIS).
pub const DEFAULT_ENDPOINT: &str = "whois.iana.org:43";

/// Default identifier feed (IANA TLD list).
pub const DEFAULT_FEED_URL: &str = "https://data.iana.org/TLD/tlds-alpha-by-domain.txt";

/// Default output table path.
pub const DEFAULT_OUTPUT_PATH: &str = "README.md";

/// Prefix of the response line carrying the WHOIS server.
pub const DEFAULT_MARKER: &str = "whois:";

/// Upper bound accepted for the concurrency cap.
pub const MAX_CONCURRENCY: usize = 1000;

/// Status of a single query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// The marker line was found and carried a value
    Success,

    /// The response ended without a marker line
    NotFound,

    /// Connect, write or read failed (including deadlines)
    NetworkError,

    /// The marker line was present but malformed
    ProtocolError,
}

/// Result of resolving one identifier.
///
/// Exactly one outcome is produced per submitted identifier. `attribute` is
/// empty unless `status` is [`QueryStatus::Success`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryOutcome {
    /// The identifier that was queried (e.g., "COM")
    pub identifier: String,

    /// The resolved attribute (e.g., "whois.verisign-grs.com")
    pub attribute: String,

    /// How the query ended
    pub status: QueryStatus,

    /// Position of the identifier in the submitted sequence
    pub index: usize,

    /// Failure detail, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// How long the query took
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_duration: Option<Duration>,
}

impl QueryOutcome {
    /// Build a successful outcome.
    pub fn success(identifier: &str, index: usize, attribute: String) -> Self {
        Self {
            identifier: identifier.to_string(),
            attribute,
            status: QueryStatus::Success,
            index,
            error_message: None,
            query_duration: None,
        }
    }

    /// Build a failed outcome with an empty attribute.
    pub fn failure(identifier: &str, index: usize, status: QueryStatus, message: String) -> Self {
        Self {
            identifier: identifier.to_string(),
            attribute: String::new(),
            status,
            index,
            error_message: Some(message),
            query_duration: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }
}

/// How workers are scheduled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One task per identifier, gated by a concurrency slot
    #[default]
    PerItem,

    /// A fixed set of workers pulling identifiers from a shared queue
    Pool,
}

/// Order in which rows reach the sink.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputOrder {
    /// Rows are written as outcomes arrive
    #[default]
    Completion,

    /// Rows are buffered and written in feed order once collection stops
    Submission,
}

/// Why the collector stopped listening.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every worker finished and the channel closed
    Completed,

    /// The inactivity window elapsed with workers possibly still running
    Inactivity,
}

/// Configuration for a scan.
///
/// Built once at startup and passed to the scanner; nothing in the library
/// reads process-wide state.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// WHOIS endpoint as `host:port`
    pub endpoint: String,

    /// URL of the identifier feed
    pub feed_url: String,

    /// Local feed file, used instead of `feed_url` when set
    pub feed_file: Option<PathBuf>,

    /// Where the output table is written
    pub output_path: PathBuf,

    /// Maximum number of concurrently executing queries
    /// Default: 100, Range: 1-1000
    pub concurrency: usize,

    /// Deadline for establishing the TCP connection
    pub connect_timeout: Duration,

    /// Deadline for sending the request and reading the response
    pub read_timeout: Duration,

    /// Safety net: stop collecting after this long without an outcome.
    /// `None` waits for every worker.
    pub inactivity_window: Option<Duration>,

    /// Prefix of the response line carrying the attribute
    pub marker: String,

    pub mode: DispatchMode,

    pub order: OutputOrder,

    /// Header of the identifier column
    pub identifier_column: String,

    /// Header of the attribute column
    pub attribute_column: String,

    /// Whether failed outcomes produce a row with an empty attribute
    pub include_failures: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            feed_url: DEFAULT_FEED_URL.to_string(),
            feed_file: None,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            concurrency: 100,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(20),
            inactivity_window: Some(Duration::from_secs(60)),
            marker: DEFAULT_MARKER.to_string(),
            mode: DispatchMode::PerItem,
            order: OutputOrder::Completion,
            identifier_column: "TLD".to_string(),
            attribute_column: "WHOIS SERVER".to_string(),
            include_failures: true,
        }
    }
}

impl ScanConfig {
    /// Set the concurrency cap, clamped to 1..=1000.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }

    pub fn with_endpoint<E: Into<String>>(mut self, endpoint: E) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_feed_url<U: Into<String>>(mut self, url: U) -> Self {
        self.feed_url = url.into();
        self
    }

    pub fn with_feed_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.feed_file = Some(path.into());
        self
    }

    pub fn with_output_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set or disable (`None`) the collector safety net.
    pub fn with_inactivity_window(mut self, window: Option<Duration>) -> Self {
        self.inactivity_window = window;
        self
    }

    pub fn with_marker<M: Into<String>>(mut self, marker: M) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_order(mut self, order: OutputOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_columns<I: Into<String>, A: Into<String>>(
        mut self,
        identifier: I,
        attribute: A,
    ) -> Self {
        self.identifier_column = identifier.into();
        self.attribute_column = attribute.into();
        self
    }

    pub fn with_include_failures(mut self, enabled: bool) -> Self {
        self.include_failures = enabled;
        self
    }
}

/// Summary of a finished scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanSummary {
    /// Identifiers submitted to the dispatcher
    pub total: usize,

    /// Workers spawned (one per identifier)
    pub spawned: usize,

    /// Outcomes received by the collector
    pub received: usize,

    /// Rows written to the sink
    pub written: usize,

    pub succeeded: usize,
    pub not_found: usize,
    pub network_errors: usize,
    pub protocol_errors: usize,

    /// Outcomes that never reached the collector
    pub dropped: usize,

    pub stop_reason: StopReason,

    pub elapsed: Duration,
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryStatus::Success => write!(f, "success"),
            QueryStatus::NotFound => write!(f, "not found"),
            QueryStatus::NetworkError => write!(f, "network error"),
            QueryStatus::ProtocolError => write!(f, "protocol error"),
        }
    }
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchMode::PerItem => write!(f, "per-item"),
            DispatchMode::Pool => write!(f, "pool"),
        }
    }
}

impl std::str::FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "per-item" | "per_item" | "peritem" => Ok(DispatchMode::PerItem),
            "pool" => Ok(DispatchMode::Pool),
            other => Err(format!(
                "Unknown dispatch mode '{}', use 'per-item' or 'pool'",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.endpoint, "whois.iana.org:43");
        assert_eq!(config.concurrency, 100);
        assert_eq!(config.marker, "whois:");
        assert_eq!(config.mode, DispatchMode::PerItem);
        assert_eq!(config.order, OutputOrder::Completion);
        assert!(config.include_failures);
    }

    #[test]
    fn test_concurrency_clamped() {
        assert_eq!(ScanConfig::default().with_concurrency(0).concurrency, 1);
        assert_eq!(
            ScanConfig::default().with_concurrency(5000).concurrency,
            MAX_CONCURRENCY
        );
        assert_eq!(ScanConfig::default().with_concurrency(7).concurrency, 7);
    }

    #[test]
    fn test_dispatch_mode_from_str() {
        assert_eq!("pool".parse::<DispatchMode>(), Ok(DispatchMode::Pool));
        assert_eq!("Per-Item".parse::<DispatchMode>(), Ok(DispatchMode::PerItem));
        assert!("fanout".parse::<DispatchMode>().is_err());
    }

    #[test]
    fn test_failure_outcome_has_empty_attribute() {
        let outcome = QueryOutcome::failure("com", 3, QueryStatus::NotFound, "none".into());
        assert!(outcome.attribute.is_empty());
        assert!(!outcome.is_success());
        assert_eq!(outcome.index, 3);
    }
}
