//! TLD WHOIS CLI Application
//!
//! Fetches the IANA TLD list, resolves the WHOIS server of every TLD and
//! writes the results as a Markdown table. This binary is a thin layer over
//! tld-whois-lib: argument parsing, configuration precedence, logging setup
//! and the end-of-run summary.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use console::Term;
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use tld_whois_lib::{
    load_env_config, parse_duration_string, parse_window_string, validate_concurrency,
    validate_endpoint, ConfigManager, DispatchMode, EnvConfig, FileConfig, OutputOrder,
    ScanConfig, ScanSummary, WhoisScanner, MAX_CONCURRENCY,
};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for tld-whois
#[derive(Parser, Debug)]
#[command(name = "tld-whois")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve the WHOIS server of every IANA TLD into a Markdown table")]
#[command(
    long_about = "Fetch the IANA list of top-level domains, ask the IANA WHOIS server for each one's WHOIS server, and write the results as a Markdown table.\n\nQueries run concurrently under a fixed cap. Per-TLD failures become empty cells and never stop the run."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Output file for the Markdown table [default: README.md]
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help_heading = "Input / Output"
    )]
    pub output: Option<PathBuf>,

    /// URL of the TLD feed
    #[arg(long = "feed-url", value_name = "URL", help_heading = "Input / Output")]
    pub feed_url: Option<String>,

    /// Read TLDs from a local file instead of the feed URL
    #[arg(long = "feed-file", value_name = "FILE", help_heading = "Input / Output")]
    pub feed_file: Option<PathBuf>,

    /// Write rows in feed order instead of completion order
    #[arg(long = "ordered", help_heading = "Input / Output")]
    pub ordered: bool,

    /// Omit rows for TLDs whose lookup failed
    #[arg(long = "skip-failures", help_heading = "Input / Output")]
    pub skip_failures: bool,

    /// Print the run summary as JSON on stdout
    #[arg(short = 'j', long = "json", help_heading = "Input / Output")]
    pub json: bool,

    /// WHOIS endpoint as host:port [default: whois.iana.org:43]
    #[arg(long = "endpoint", value_name = "HOST:PORT", help_heading = "Query")]
    pub endpoint: Option<String>,

    /// Deadline for connecting (e.g. 10s, 500ms)
    #[arg(long = "connect-timeout", value_name = "DURATION", help_heading = "Query")]
    pub connect_timeout: Option<String>,

    /// Deadline for the request/response exchange (e.g. 20s)
    #[arg(long = "read-timeout", value_name = "DURATION", help_heading = "Query")]
    pub read_timeout: Option<String>,

    /// Max concurrent queries (default: 100, max: 1000)
    #[arg(
        short = 'c',
        long = "concurrency",
        value_name = "N",
        help_heading = "Performance"
    )]
    pub concurrency: Option<usize>,

    /// Scheduling mode: per-item or pool
    #[arg(long = "mode", value_name = "MODE", help_heading = "Performance")]
    pub mode: Option<String>,

    /// Stop collecting after this long without a result ("off" to wait for all)
    #[arg(
        long = "inactivity-window",
        value_name = "DURATION",
        help_heading = "Performance"
    )]
    pub inactivity_window: Option<String>,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short = 'q', long = "quiet", help_heading = "Configuration")]
    pub quiet: bool,
}

/// Machine-readable run report for `--json`.
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    output: String,
    endpoint: &'a str,
    concurrency: usize,
    mode: String,
    elapsed_ms: u128,
    #[serde(flatten)]
    summary: &'a ScanSummary,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_logging(&args);

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Install the stderr log subscriber.
///
/// `--verbose` and `--quiet` override `RUST_LOG`; otherwise `RUST_LOG` is
/// honored. Without it the level is `info`, or `warn` while the spinner
/// owns the stderr line.
fn init_logging(args: &Args) {
    let spinner_visible = shows_progress(args) && Term::stderr().is_term();
    let filter = match log_level(args) {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| default_log_level(spinner_visible).into()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn default_log_level(spinner_visible: bool) -> &'static str {
    if spinner_visible {
        "warn"
    } else {
        "info"
    }
}

/// Header and spinner are shown only for plain interactive output.
fn shows_progress(args: &Args) -> bool {
    !args.json && !args.quiet && !args.verbose
}

fn log_level(args: &Args) -> Option<&'static str> {
    if args.verbose {
        Some("debug")
    } else if args.quiet {
        Some("warn")
    } else {
        None
    }
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if args.verbose && args.quiet {
        return Err("Cannot specify both --verbose and --quiet".to_string());
    }

    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 || concurrency > MAX_CONCURRENCY {
            return Err(format!(
                "Concurrency must be between 1 and {}",
                MAX_CONCURRENCY
            ));
        }
    }

    if let Some(endpoint) = &args.endpoint {
        validate_endpoint(endpoint).map_err(|e| e.to_string())?;
    }

    for (flag, value) in [
        ("--connect-timeout", &args.connect_timeout),
        ("--read-timeout", &args.read_timeout),
    ] {
        if let Some(value) = value {
            match parse_duration_string(value) {
                Some(duration) if !duration.is_zero() => {}
                _ => {
                    return Err(format!(
                        "Invalid {} '{}'. Use format like '500ms', '5s', '2m'",
                        flag, value
                    ))
                }
            }
        }
    }

    if let Some(window) = &args.inactivity_window {
        if parse_window_string(window).is_none() {
            return Err(format!(
                "Invalid --inactivity-window '{}'. Use a duration like '60s' or 'off'",
                window
            ));
        }
    }

    if let Some(mode) = &args.mode {
        mode.parse::<DispatchMode>()?;
    }

    if let (Some(_), Some(_)) = (&args.feed_url, &args.feed_file) {
        return Err("Cannot specify both --feed-url and --feed-file".to_string());
    }

    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(&args)?;
    let show_progress = shows_progress(&args);

    if show_progress {
        ui::print_header(&config);
    }
    let spinner = show_progress.then(|| ui::Spinner::start("Resolving WHOIS servers...".to_string()));

    let scanner = WhoisScanner::new(config);
    let result = scanner.scan().await;

    if let Some(spinner) = spinner {
        spinner.stop().await;
    }
    let summary = result?;

    if args.json {
        display_json_summary(scanner.config(), &summary)?;
    } else if !args.quiet {
        ui::print_summary(scanner.config(), &summary);
    }

    Ok(())
}

fn display_json_summary(
    config: &ScanConfig,
    summary: &ScanSummary,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = JsonReport {
        output: config.output_path.display().to_string(),
        endpoint: &config.endpoint,
        concurrency: config.concurrency,
        mode: config.mode.to_string(),
        elapsed_ms: summary.elapsed.as_millis(),
        summary,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Build the scan configuration: CLI > environment > config file > defaults.
fn build_config(args: &Args) -> Result<ScanConfig, Box<dyn std::error::Error>> {
    let env_config = load_env_config();
    let file_config = load_file_config(args, &env_config)?;
    resolve_config(args, file_config, env_config)
}

/// Load the explicit config file if one was given, otherwise discover one.
fn load_file_config(
    args: &Args,
    env_config: &EnvConfig,
) -> Result<FileConfig, Box<dyn std::error::Error>> {
    let config_manager = ConfigManager::new(args.verbose);

    let explicit = args
        .config
        .as_ref()
        .map(|path| (path, "--config"))
        .or_else(|| env_config.config.as_ref().map(|path| (path, "TW_CONFIG")));

    match explicit {
        Some((path, origin)) => {
            tracing::debug!(path = %path.display(), origin, "using explicit config file");
            config_manager
                .load_file(path)
                .map_err(|e| -> Box<dyn std::error::Error> {
                    format!("Failed to load config file '{}': {}", path.display(), e).into()
                })
        }
        None => {
            tracing::debug!("discovering config files");
            Ok(config_manager.discover_and_load()?)
        }
    }
}

fn resolve_config(
    args: &Args,
    file_config: FileConfig,
    env_config: EnvConfig,
) -> Result<ScanConfig, Box<dyn std::error::Error>> {
    let config = merge_file_config_into_scan_config(ScanConfig::default(), file_config)?;
    let config = apply_environment_config(config, env_config);
    apply_cli_args_to_config(config, args)
}

/// Merge FileConfig into ScanConfig
fn merge_file_config_into_scan_config(
    mut config: ScanConfig,
    file_config: FileConfig,
) -> Result<ScanConfig, Box<dyn std::error::Error>> {
    if let Some(query) = file_config.query {
        if let Some(endpoint) = query.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(marker) = query.marker {
            config.marker = marker;
        }
        if let Some(timeout) = query.connect_timeout {
            config.connect_timeout = duration_setting("connect_timeout", &timeout)?;
        }
        if let Some(timeout) = query.read_timeout {
            config.read_timeout = duration_setting("read_timeout", &timeout)?;
        }
    }

    if let Some(feed) = file_config.feed {
        if let Some(url) = feed.url {
            config.feed_url = url;
        }
        if let Some(file) = feed.file {
            config.feed_file = Some(file);
        }
    }

    if let Some(output) = file_config.output {
        if let Some(path) = output.path {
            config.output_path = path;
        }
        if let Some(ordered) = output.ordered {
            config.order = order_from_flag(ordered);
        }
        if let Some(include_failures) = output.include_failures {
            config.include_failures = include_failures;
        }
        let identifier_column = output
            .identifier_column
            .unwrap_or_else(|| config.identifier_column.clone());
        let attribute_column = output
            .attribute_column
            .unwrap_or_else(|| config.attribute_column.clone());
        config = config.with_columns(identifier_column, attribute_column);
    }

    if let Some(engine) = file_config.engine {
        if let Some(concurrency) = engine.concurrency {
            validate_concurrency(concurrency)?;
            config.concurrency = concurrency;
        }
        if let Some(window) = engine.inactivity_window {
            config.inactivity_window = parse_window_string(&window)
                .ok_or_else(|| format!("Invalid inactivity_window '{}'", window))?;
        }
        if let Some(mode) = engine.mode {
            config.mode = mode.parse::<DispatchMode>()?;
        }
    }

    Ok(config)
}

/// Apply TW_* environment variables (already validated by the library).
fn apply_environment_config(mut config: ScanConfig, env_config: EnvConfig) -> ScanConfig {
    if let Some(endpoint) = env_config.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(url) = env_config.feed_url {
        config.feed_url = url;
        // A URL from a higher layer wins over a file from the config file.
        config.feed_file = None;
    }
    if let Some(file) = env_config.feed_file {
        config.feed_file = Some(file);
    }
    if let Some(output) = env_config.output {
        config.output_path = output;
    }
    if let Some(concurrency) = env_config.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(timeout) = env_config.connect_timeout {
        config.connect_timeout = timeout;
    }
    if let Some(timeout) = env_config.read_timeout {
        config.read_timeout = timeout;
    }
    if let Some(window) = env_config.inactivity_window {
        config.inactivity_window = window;
    }
    if let Some(mode) = env_config.mode {
        config.mode = mode;
    }
    if let Some(ordered) = env_config.ordered {
        config.order = order_from_flag(ordered);
    }

    config
}

/// Apply CLI arguments to config (highest precedence).
///
/// Only options the user actually passed override lower layers; boolean
/// flags can only switch their behavior on.
fn apply_cli_args_to_config(
    mut config: ScanConfig,
    args: &Args,
) -> Result<ScanConfig, Box<dyn std::error::Error>> {
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(url) = &args.feed_url {
        config.feed_url = url.clone();
        config.feed_file = None;
    }
    if let Some(file) = &args.feed_file {
        config.feed_file = Some(file.clone());
    }
    if let Some(output) = &args.output {
        config.output_path = output.clone();
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(timeout) = &args.connect_timeout {
        config.connect_timeout = duration_setting("--connect-timeout", timeout)?;
    }
    if let Some(timeout) = &args.read_timeout {
        config.read_timeout = duration_setting("--read-timeout", timeout)?;
    }
    if let Some(window) = &args.inactivity_window {
        config.inactivity_window = parse_window_string(window)
            .ok_or_else(|| format!("Invalid --inactivity-window '{}'", window))?;
    }
    if let Some(mode) = &args.mode {
        config.mode = mode.parse::<DispatchMode>()?;
    }
    if args.ordered {
        config.order = OutputOrder::Submission;
    }
    if args.skip_failures {
        config.include_failures = false;
    }

    Ok(config)
}

fn duration_setting(name: &str, value: &str) -> Result<std::time::Duration, String> {
    match parse_duration_string(value) {
        Some(duration) if !duration.is_zero() => Ok(duration),
        Some(_) => Err(format!("{} '{}' must be greater than zero", name, value)),
        None => Err(format!("Invalid {} '{}'. Use format like '5s'", name, value)),
    }
}

fn order_from_flag(ordered: bool) -> OutputOrder {
    if ordered {
        OutputOrder::Submission
    } else {
        OutputOrder::Completion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tld_whois_lib::{EngineConfig, FeedConfig, OutputConfig, QueryConfig};

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("tld-whois").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_without_any_layer() {
        let config =
            resolve_config(&parse(&[]), FileConfig::default(), EnvConfig::default()).unwrap();
        assert_eq!(config, ScanConfig::default());
    }

    #[test]
    fn test_validate_args() {
        assert!(validate_args(&parse(&[])).is_ok());
        assert!(validate_args(&parse(&["-c", "0"])).is_err());
        assert!(validate_args(&parse(&["-c", "1001"])).is_err());
        assert!(validate_args(&parse(&["--endpoint", "no-port"])).is_err());
        assert!(validate_args(&parse(&["--read-timeout", "soon"])).is_err());
        assert!(validate_args(&parse(&["--connect-timeout", "0s"])).is_err());
        assert!(validate_args(&parse(&["--mode", "fanout"])).is_err());
        assert!(validate_args(&parse(&["--inactivity-window", "off"])).is_ok());
        assert!(validate_args(&parse(&["-v", "-q"])).is_err());
        assert!(validate_args(&parse(&["--feed-url", "http://x", "--feed-file", "f"])).is_err());
    }

    #[test]
    fn test_precedence_cli_over_env_over_file() {
        let file_config = FileConfig {
            query: Some(QueryConfig {
                endpoint: Some("file.example:43".to_string()),
                read_timeout: Some("7s".to_string()),
                ..Default::default()
            }),
            engine: Some(EngineConfig {
                concurrency: Some(10),
                mode: Some("pool".to_string()),
                ..Default::default()
            }),
            output: Some(OutputConfig {
                path: Some(PathBuf::from("file.md")),
                ..Default::default()
            }),
            ..Default::default()
        };
        let env_config = EnvConfig {
            endpoint: Some("env.example:43".to_string()),
            concurrency: Some(20),
            ..Default::default()
        };
        let args = parse(&["-c", "30", "--ordered"]);

        let config = resolve_config(&args, file_config, env_config).unwrap();

        assert_eq!(config.concurrency, 30); // CLI
        assert_eq!(config.endpoint, "env.example:43"); // env
        assert_eq!(config.read_timeout, Duration::from_secs(7)); // file
        assert_eq!(config.mode, DispatchMode::Pool); // file
        assert_eq!(config.output_path, PathBuf::from("file.md")); // file
        assert_eq!(config.order, OutputOrder::Submission); // CLI
        assert_eq!(config.marker, "whois:"); // default
    }

    #[test]
    fn test_feed_url_overrides_lower_feed_file() {
        let file_config = FileConfig {
            feed: Some(FeedConfig {
                file: Some(PathBuf::from("tlds.txt")),
                ..Default::default()
            }),
            ..Default::default()
        };
        let args = parse(&["--feed-url", "http://feed.example/tlds.txt"]);

        let config = resolve_config(&args, file_config, EnvConfig::default()).unwrap();
        assert_eq!(config.feed_file, None);
        assert_eq!(config.feed_url, "http://feed.example/tlds.txt");
    }

    #[test]
    fn test_inactivity_window_can_be_disabled() {
        let env_config = EnvConfig {
            inactivity_window: Some(Some(Duration::from_secs(5))),
            ..Default::default()
        };
        let args = parse(&["--inactivity-window", "off"]);

        let config = resolve_config(&args, FileConfig::default(), env_config).unwrap();
        assert_eq!(config.inactivity_window, None);
    }

    #[test]
    fn test_file_output_settings() {
        let file_config = FileConfig {
            output: Some(OutputConfig {
                include_failures: Some(false),
                attribute_column: Some("SERVER".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = resolve_config(&parse(&[]), file_config, EnvConfig::default()).unwrap();
        assert!(!config.include_failures);
        assert_eq!(config.identifier_column, "TLD");
        assert_eq!(config.attribute_column, "SERVER");
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(&parse(&["-v"])), Some("debug"));
        assert_eq!(log_level(&parse(&["--quiet"])), Some("warn"));
        assert_eq!(log_level(&parse(&[])), None);
    }

    #[test]
    fn test_spinner_lowers_default_log_level() {
        assert!(shows_progress(&parse(&[])));
        assert!(!shows_progress(&parse(&["--json"])));
        assert!(!shows_progress(&parse(&["-q"])));
        assert!(!shows_progress(&parse(&["-v"])));
        assert_eq!(default_log_level(true), "warn");
        assert_eq!(default_log_level(false), "info");
    }

    #[test]
    fn test_zero_timeout_from_file_rejected() {
        let file_config = FileConfig {
            query: Some(QueryConfig {
                read_timeout: Some("0s".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let err = resolve_config(&parse(&[]), file_config, EnvConfig::default()).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }
}
