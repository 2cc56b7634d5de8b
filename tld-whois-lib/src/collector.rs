//! Result collection.
//!
//! The collector is the only writer of the sink. It listens on the outcome
//! channel and stops when either:
//!
//! - the channel closes, meaning every worker has finished and dropped its
//!   sender (`StopReason::Completed`), or
//! - the optional inactivity window elapses without an arrival
//!   (`StopReason::Inactivity`). This is a safety net: outcomes still in
//!   flight at that point are lost, so it is logged as abnormal.

use crate::error::TldWhoisError;
use crate::sink::TableSink;
use crate::types::{OutputOrder, QueryOutcome, QueryStatus, ScanConfig, StopReason};
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;

/// What the collector saw during one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectReport {
    pub received: usize,
    pub written: usize,
    pub succeeded: usize,
    pub not_found: usize,
    pub network_errors: usize,
    pub protocol_errors: usize,
    pub stop_reason: StopReason,
}

impl CollectReport {
    fn new() -> Self {
        Self {
            received: 0,
            written: 0,
            succeeded: 0,
            not_found: 0,
            network_errors: 0,
            protocol_errors: 0,
            stop_reason: StopReason::Completed,
        }
    }

    fn record(&mut self, outcome: &QueryOutcome) {
        self.received += 1;
        match outcome.status {
            QueryStatus::Success => self.succeeded += 1,
            QueryStatus::NotFound => self.not_found += 1,
            QueryStatus::NetworkError => self.network_errors += 1,
            QueryStatus::ProtocolError => self.protocol_errors += 1,
        }
    }
}

/// Receives outcomes and writes them to a [`TableSink`].
#[derive(Debug, Clone)]
pub struct Collector {
    inactivity_window: Option<Duration>,
    order: OutputOrder,
    include_failures: bool,
}

impl Collector {
    /// Create a collector that writes in completion order, failures included.
    pub fn new(inactivity_window: Option<Duration>) -> Self {
        Self {
            inactivity_window,
            order: OutputOrder::Completion,
            include_failures: true,
        }
    }

    pub fn with_config(config: &ScanConfig) -> Self {
        Self {
            inactivity_window: config.inactivity_window,
            order: config.order,
            include_failures: config.include_failures,
        }
    }

    pub fn with_order(mut self, order: OutputOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_include_failures(mut self, enabled: bool) -> Self {
        self.include_failures = enabled;
        self
    }

    /// Listen until completion or inactivity, writing rows as configured.
    ///
    /// The receiver is dropped as soon as listening stops, so late senders
    /// fail fast instead of waiting for a reader that will never come.
    ///
    /// # Errors
    ///
    /// Returns `TldWhoisError::SinkError` if a row cannot be written.
    pub async fn run<W: Write>(
        &self,
        mut outcomes: mpsc::Receiver<QueryOutcome>,
        sink: &mut TableSink<W>,
    ) -> Result<CollectReport, TldWhoisError> {
        let mut report = CollectReport::new();
        let mut buffered = Vec::new();

        report.stop_reason = loop {
            let next = match self.inactivity_window {
                Some(window) => match tokio::time::timeout(window, outcomes.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::warn!(
                            window_ms = window.as_millis() as u64,
                            received = report.received,
                            "no outcome within inactivity window, stopped listening with workers possibly still running"
                        );
                        break StopReason::Inactivity;
                    }
                },
                None => outcomes.recv().await,
            };

            let Some(outcome) = next else {
                break StopReason::Completed;
            };

            report.record(&outcome);
            match self.order {
                OutputOrder::Completion => self.write(sink, &outcome, &mut report)?,
                OutputOrder::Submission => buffered.push(outcome),
            }
        };
        drop(outcomes);

        if self.order == OutputOrder::Submission {
            buffered.sort_by_key(|outcome| outcome.index);
            for outcome in &buffered {
                self.write(sink, outcome, &mut report)?;
            }
        }

        sink.flush()?;
        Ok(report)
    }

    fn write<W: Write>(
        &self,
        sink: &mut TableSink<W>,
        outcome: &QueryOutcome,
        report: &mut CollectReport,
    ) -> Result<(), TldWhoisError> {
        if !self.include_failures && !outcome.is_success() {
            return Ok(());
        }
        sink.write_row(&outcome.identifier, &outcome.attribute)?;
        report.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(sink: TableSink<Vec<u8>>) -> String {
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[tokio::test]
    async fn test_stops_when_all_senders_drop() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(QueryOutcome::success("COM", 0, "whois.verisign-grs.com".into()))
            .await
            .unwrap();
        tx.send(QueryOutcome::failure("BAD", 1, QueryStatus::NotFound, "none".into()))
            .await
            .unwrap();
        drop(tx);

        let mut sink = TableSink::new(Vec::new());
        let report = Collector::new(None).run(rx, &mut sink).await.unwrap();

        assert_eq!(report.stop_reason, StopReason::Completed);
        assert_eq!(report.received, 2);
        assert_eq!(report.written, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.not_found, 1);
        assert_eq!(table(sink), "|COM|whois.verisign-grs.com|\n|BAD||\n");
    }

    #[tokio::test]
    async fn test_inactivity_window_stops_listening() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(QueryOutcome::success("COM", 0, "a".into())).await.unwrap();

        let mut sink = TableSink::new(Vec::new());
        let report = Collector::new(Some(Duration::from_millis(50)))
            .run(rx, &mut sink)
            .await
            .unwrap();

        assert_eq!(report.stop_reason, StopReason::Inactivity);
        assert_eq!(report.received, 1);
        // The receiver is gone once the collector returns.
        assert!(tx.send(QueryOutcome::success("ORG", 1, "b".into())).await.is_err());
    }

    #[tokio::test]
    async fn test_submission_order_sorts_by_index() {
        let (tx, rx) = mpsc::channel(4);
        for (index, id) in [(2, "C"), (0, "A"), (1, "B")] {
            tx.send(QueryOutcome::success(id, index, id.to_lowercase()))
                .await
                .unwrap();
        }
        drop(tx);

        let mut sink = TableSink::new(Vec::new());
        Collector::new(None)
            .with_order(OutputOrder::Submission)
            .run(rx, &mut sink)
            .await
            .unwrap();

        assert_eq!(table(sink), "|A|a|\n|B|b|\n|C|c|\n");
    }

    #[tokio::test]
    async fn test_failures_can_be_skipped() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(QueryOutcome::failure("X", 0, QueryStatus::NetworkError, "refused".into()))
            .await
            .unwrap();
        tx.send(QueryOutcome::success("Y", 1, "y".into())).await.unwrap();
        drop(tx);

        let mut sink = TableSink::new(Vec::new());
        let report = Collector::new(None)
            .with_include_failures(false)
            .run(rx, &mut sink)
            .await
            .unwrap();

        assert_eq!(report.received, 2);
        assert_eq!(report.written, 1);
        assert_eq!(report.network_errors, 1);
        assert_eq!(table(sink), "|Y|y|\n");
    }
}
