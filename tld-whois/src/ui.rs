//! Terminal display logic for the tld-whois CLI.
//!
//! Header, progress spinner and the end-of-run summary. Uses only the
//! `console` crate.

use console::{style, Term};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tld_whois_lib::{ScanConfig, ScanSummary, StopReason};

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// An async braille-dot spinner that writes to stderr so stdout stays clean.
///
/// Draws nothing when stderr is not a terminal.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    pub fn start(message: String) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        if !Term::stderr().is_term() {
            return Self {
                running,
                handle: None,
            };
        }

        let running_clone = Arc::clone(&running);
        let handle = tokio::spawn(async move {
            let term = Term::stderr();
            let mut idx = 0usize;
            while running_clone.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let _ = term.clear_line();
                let _ = term.write_str(&format!("{} {}", style(frame).cyan(), message));
                idx += 1;
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let _ = term.clear_line();
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

pub fn print_header(config: &ScanConfig) {
    println!(
        "{} {}",
        style("tld-whois").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
    );

    let source = match &config.feed_file {
        Some(path) => path.display().to_string(),
        None => config.feed_url.clone(),
    };
    let window = match config.inactivity_window {
        Some(window) => format!("{:?}", window),
        None => "off".to_string(),
    };
    let meta_parts = [
        format!("Feed: {}", source),
        format!("Endpoint: {}", config.endpoint),
        format!("Concurrency: {} ({})", config.concurrency, config.mode),
        format!("Inactivity window: {}", window),
    ];

    println!("{}", style(meta_parts.join(" | ")).dim());
    println!();
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary bar with colored counts.
pub fn print_summary(config: &ScanConfig, summary: &ScanSummary) {
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} TLD{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(summary.total).bold(),
        if summary.total == 1 { "" } else { "s" },
        summary.elapsed.as_secs_f64(),
        style("|").dim(),
        style(format!("{} resolved", summary.succeeded)).green(),
        style("|").dim(),
        style(format!("{} not found", summary.not_found)).yellow(),
        style("|").dim(),
        style(format!("{} failed", failed(summary))).red(),
    );
    println!(
        "  {} row{} written to {}",
        style(summary.written).bold(),
        if summary.written == 1 { "" } else { "s" },
        style(config.output_path.display()).cyan(),
    );

    if let Some(warning) = incomplete_warning(summary) {
        println!("  {}", style(warning).yellow().bold());
    }
}

fn failed(summary: &ScanSummary) -> usize {
    summary.network_errors + summary.protocol_errors
}

/// Describe outcomes that never reached the table, if any.
fn incomplete_warning(summary: &ScanSummary) -> Option<String> {
    match (summary.stop_reason, summary.dropped) {
        (StopReason::Inactivity, dropped) => Some(format!(
            "Stopped after the inactivity window: {} TLD{} missing from the table",
            dropped,
            if dropped == 1 { "" } else { "s" }
        )),
        (StopReason::Completed, 0) => None,
        (StopReason::Completed, dropped) => Some(format!(
            "{} TLD{} missing from the table",
            dropped,
            if dropped == 1 { "" } else { "s" }
        )),
    }
}
