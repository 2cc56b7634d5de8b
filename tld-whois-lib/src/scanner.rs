//! Main scanner implementation.
//!
//! This module provides the `WhoisScanner` struct that wires the feed, the
//! dispatcher, the collector and the sink together for one run.

use crate::collector::Collector;
use crate::dispatcher::Dispatcher;
use crate::error::TldWhoisError;
use crate::feed::{FeedClient, FeedSource};
use crate::protocols::WhoisClient;
use crate::sink::TableSink;
use crate::types::{QueryOutcome, ScanConfig, ScanSummary, StopReason};
use futures_util::stream::{self, Stream, StreamExt};
use std::io::Write;
use std::time::Instant;
use tokio::sync::mpsc;

/// Scanner that resolves the WHOIS server of every identifier in the feed.
///
/// # Example
///
/// ```rust,no_run
/// use tld_whois_lib::{ScanConfig, WhoisScanner};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let scanner = WhoisScanner::new(ScanConfig::default().with_concurrency(50));
///     let summary = scanner.scan().await?;
///     println!("{} rows written", summary.written);
///     Ok(())
/// }
/// ```
pub struct WhoisScanner {
    /// Configuration settings for this scanner instance
    config: ScanConfig,
    /// Client used for single and streamed lookups
    client: WhoisClient,
}

impl WhoisScanner {
    pub fn new(config: ScanConfig) -> Self {
        let client = WhoisClient::with_config(&config);
        Self { config, client }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run a full scan: fetch the feed, create the output file, resolve all.
    ///
    /// The feed is fetched before the output file is touched, so a feed
    /// failure leaves any previous output intact.
    ///
    /// # Errors
    ///
    /// Returns `TldWhoisError` if:
    /// - The feed cannot be fetched (`FeedError`)
    /// - The output file cannot be created or written (`SinkError`)
    pub async fn scan(&self) -> Result<ScanSummary, TldWhoisError> {
        let feed = FeedClient::new(FeedSource::from_config(&self.config))?;
        let identifiers = feed.fetch_identifiers().await?;

        let mut sink = TableSink::create(&self.config.output_path)?;
        self.scan_identifiers(identifiers, &mut sink).await
    }

    /// Resolve an already materialized identifier list into `sink`.
    ///
    /// Writes the header, runs the dispatcher and the collector side by side,
    /// and waits for every worker before returning.
    ///
    /// # Errors
    ///
    /// Returns `TldWhoisError::SinkError` if the sink fails. Queries not yet
    /// started are never issued and in-flight ones are cancelled.
    pub async fn scan_identifiers<W: Write>(
        &self,
        identifiers: Vec<String>,
        sink: &mut TableSink<W>,
    ) -> Result<ScanSummary, TldWhoisError> {
        let start_time = Instant::now();
        let total = identifiers.len();

        sink.write_header(&self.config.identifier_column, &self.config.attribute_column)?;

        tracing::info!(
            total,
            concurrency = self.config.concurrency,
            mode = %self.config.mode,
            endpoint = %self.config.endpoint,
            "starting whois scan"
        );

        let (sender, receiver) = mpsc::channel(self.config.concurrency.max(1));
        let dispatcher = Dispatcher::with_config(&self.config);
        let collector = Collector::with_config(&self.config);

        let dispatch = dispatcher.dispatch(identifiers, sender);
        let collect = collector.run(receiver, sink);
        tokio::pin!(dispatch);
        tokio::pin!(collect);

        // A failed sink aborts the run: dropping the dispatch future drops
        // its JoinSet, which cancels every query still in flight.
        let (dispatch, collected) = tokio::select! {
            collected = &mut collect => match collected {
                Ok(collected) => (dispatch.await, collected),
                Err(e) => {
                    tracing::error!(error = %e, "output failed, cancelling outstanding queries");
                    return Err(e);
                }
            },
            report = &mut dispatch => (report, collect.await?),
        };

        let summary = ScanSummary {
            total,
            spawned: dispatch.started,
            received: collected.received,
            written: collected.written,
            succeeded: collected.succeeded,
            not_found: collected.not_found,
            network_errors: collected.network_errors,
            protocol_errors: collected.protocol_errors,
            dropped: total.saturating_sub(collected.received),
            stop_reason: collected.stop_reason,
            elapsed: start_time.elapsed(),
        };

        if summary.stop_reason == StopReason::Inactivity || summary.dropped > 0 {
            tracing::warn!(
                dropped = summary.dropped,
                stop_reason = ?summary.stop_reason,
                "scan finished with outcomes missing from the output"
            );
        }
        tracing::info!(
            written = summary.written,
            succeeded = summary.succeeded,
            not_found = summary.not_found,
            network_errors = summary.network_errors,
            protocol_errors = summary.protocol_errors,
            peak_in_flight = dispatch.peak_in_flight,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "whois scan finished"
        );

        Ok(summary)
    }

    /// Resolve a single identifier.
    pub async fn resolve(&self, identifier: &str) -> QueryOutcome {
        self.client.resolve(identifier, 0).await
    }

    /// Resolve identifiers and yield outcomes as they complete.
    ///
    /// At most `concurrency` queries run at once. Outcomes arrive in
    /// completion order; `index` gives the feed position.
    pub fn resolve_stream(
        &self,
        identifiers: Vec<String>,
    ) -> impl Stream<Item = QueryOutcome> + Send + '_ {
        stream::iter(identifiers.into_iter().enumerate())
            .map(move |(index, identifier)| async move {
                self.client.resolve(&identifier, index).await
            })
            .buffer_unordered(self.config.concurrency.max(1))
    }
}

impl Default for WhoisScanner {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}
