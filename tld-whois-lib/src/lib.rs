//! # TLD WHOIS Library
//!
//! Resolves the WHOIS server of every top-level domain in a feed and writes
//! the results as a Markdown table.
//!
//! The library fans out one query per identifier under a fixed concurrency
//! cap, funnels every outcome through a single collector, and knows it is
//! done when the last worker drops its end of the outcome channel.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tld_whois_lib::{ScanConfig, WhoisScanner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scanner = WhoisScanner::new(ScanConfig::default());
//!     let outcome = scanner.resolve("com").await;
//!
//!     println!("{} -> {} ({})", outcome.identifier, outcome.attribute, outcome.status);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Bounded fan-out**: per-item tasks gated by a semaphore, or a fixed worker pool
//! - **Explicit outcomes**: success, not found, network and protocol errors
//! - **Deterministic completion**: the collector stops when the channel closes
//! - **Configurable**: TOML files, `TW_*` environment variables, builder API

// Re-export main public API types and functions
pub use collector::{CollectReport, Collector};
pub use config::{
    load_env_config, load_env_from, parse_duration_string, parse_window_string,
    validate_concurrency, validate_endpoint, ConfigManager, EngineConfig, EnvConfig, FeedConfig,
    FileConfig, OutputConfig, QueryConfig,
};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::TldWhoisError;
pub use feed::{parse_feed, FeedClient, FeedSource};
pub use protocols::{find_marker_value, WhoisClient, MAX_LINE_LENGTH};
pub use scanner::WhoisScanner;
pub use sink::TableSink;
pub use types::{
    DispatchMode, OutputOrder, QueryOutcome, QueryStatus, ScanConfig, ScanSummary, StopReason,
    DEFAULT_ENDPOINT, DEFAULT_FEED_URL, DEFAULT_MARKER, DEFAULT_OUTPUT_PATH, MAX_CONCURRENCY,
};

// Internal modules, exposed through the re-exports above
mod collector;
mod config;
mod dispatcher;
mod error;
mod feed;
mod protocols;
mod scanner;
mod sink;
mod types;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, TldWhoisError>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
