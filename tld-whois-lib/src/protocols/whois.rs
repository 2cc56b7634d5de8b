//! WHOIS protocol implementation for resolving a TLD's WHOIS server.
//!
//! A query is one TCP round-trip: connect to the endpoint, send the
//! identifier followed by `\r\n`, then read the line-oriented response until
//! a line starts with the marker prefix (`whois:` for IANA). The attribute is
//! the last whitespace-delimited field of that line.
//!
//! ```text
//! domain:       COM
//! whois:        whois.verisign-grs.com
//! ```

use crate::error::TldWhoisError;
use crate::types::{QueryOutcome, QueryStatus, ScanConfig, DEFAULT_MARKER};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Longest response line accepted, excluding the newline.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// WHOIS client that talks to a single fixed endpoint.
///
/// The client holds no connection state; every query opens its own
/// connection, which is dropped on every exit path.
#[derive(Debug, Clone)]
pub struct WhoisClient {
    /// Endpoint as `host:port`
    endpoint: String,
    /// Prefix identifying the result line
    marker: String,
    /// Deadline for the TCP connect
    connect_timeout: Duration,
    /// Deadline for the request/response exchange
    read_timeout: Duration,
}

impl WhoisClient {
    /// Create a client for `endpoint` with default marker and deadlines.
    pub fn new<E: Into<String>>(endpoint: E) -> Self {
        let defaults = ScanConfig::default();
        Self {
            endpoint: endpoint.into(),
            marker: DEFAULT_MARKER.to_string(),
            connect_timeout: defaults.connect_timeout,
            read_timeout: defaults.read_timeout,
        }
    }

    /// Create a client from a scan configuration.
    pub fn with_config(config: &ScanConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            marker: config.marker.clone(),
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
        }
    }

    /// Override both deadlines.
    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Query the endpoint for `identifier` and return the attribute.
    ///
    /// # Errors
    ///
    /// Returns `TldWhoisError` if:
    /// - The connection cannot be established (`NetworkError`, `Timeout`)
    /// - Writing or reading fails or exceeds the read deadline
    /// - The response ends without a marker line (`NotFound`)
    /// - The marker line carries no value (`ProtocolError`)
    pub async fn query(&self, identifier: &str) -> Result<String, TldWhoisError> {
        let connect = TcpStream::connect(self.endpoint.as_str());
        let stream = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(TldWhoisError::network_with_source(
                    format!("Failed to connect to {}", self.endpoint),
                    e.to_string(),
                ))
            }
            Err(_) => {
                return Err(TldWhoisError::timeout(
                    format!("connect to {}", self.endpoint),
                    self.connect_timeout,
                ))
            }
        };

        match tokio::time::timeout(self.read_timeout, self.exchange(stream, identifier)).await {
            Ok(result) => result,
            Err(_) => Err(TldWhoisError::timeout(
                format!("WHOIS exchange for '{}'", identifier),
                self.read_timeout,
            )),
        }
    }

    /// Send the request frame and scan the response.
    async fn exchange(&self, mut stream: TcpStream, identifier: &str) -> Result<String, TldWhoisError> {
        let request = format!("{}\r\n", identifier);
        stream.write_all(request.as_bytes()).await.map_err(|e| {
            TldWhoisError::network_with_source("Failed to send WHOIS request", e.to_string())
        })?;

        find_marker_value(BufReader::new(stream), identifier, &self.marker).await
    }

    /// Resolve one identifier into an outcome. Never fails and never retries.
    pub async fn resolve(&self, identifier: &str, index: usize) -> QueryOutcome {
        let start_time = Instant::now();

        let mut outcome = match self.query(identifier).await {
            Ok(attribute) => {
                tracing::debug!(identifier, server = %attribute, "resolved whois server");
                QueryOutcome::success(identifier, index, attribute)
            }
            Err(e) => {
                let status = e.status();
                if status == QueryStatus::NotFound {
                    tracing::info!(identifier, error = %e, "no whois server found");
                } else {
                    tracing::warn!(identifier, error = %e, "whois query failed");
                }
                QueryOutcome::failure(identifier, index, status, e.to_string())
            }
        };

        outcome.query_duration = Some(start_time.elapsed());
        outcome
    }
}

/// Scan a line-oriented response for the first line starting with `marker`.
///
/// The first matching line wins and reading stops there. The value is the
/// last whitespace-delimited field after the marker. Non-UTF-8 bytes are
/// replaced rather than rejected. A line longer than [`MAX_LINE_LENGTH`]
/// is a protocol error.
pub async fn find_marker_value<R>(
    mut reader: R,
    identifier: &str,
    marker: &str,
) -> Result<String, TldWhoisError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_LINE_LENGTH as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| {
                TldWhoisError::network_with_source("Failed to read WHOIS response", e.to_string())
            })?;

        if read == 0 {
            return Err(TldWhoisError::not_found(identifier, marker));
        }
        if read > MAX_LINE_LENGTH && buf.last() != Some(&b'\n') {
            return Err(TldWhoisError::protocol(
                identifier,
                format!("response line exceeds {} bytes", MAX_LINE_LENGTH),
            ));
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');

        if let Some(rest) = line.strip_prefix(marker) {
            return rest
                .split_whitespace()
                .last()
                .map(str::to_string)
                .ok_or_else(|| {
                    TldWhoisError::protocol(identifier, format!("'{}' line carries no value", marker))
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    fn scan(response: &str) -> Result<String, TldWhoisError> {
        block_on(find_marker_value(response.as_bytes(), "com", "whois:"))
    }

    #[test]
    fn test_marker_value_is_last_field() {
        let response = "% IANA WHOIS server\r\n\r\ndomain:       COM\r\nwhois:        whois.verisign-grs.com\r\nstatus:       ACTIVE\r\n";
        assert_eq!(scan(response).unwrap(), "whois.verisign-grs.com");
    }

    #[test]
    fn test_first_match_wins() {
        let response = "whois: first.example\nwhois: second.example\n";
        assert_eq!(scan(response).unwrap(), "first.example");
    }

    #[test]
    fn test_last_field_of_multi_field_line() {
        let response = "whois: ignored middle last.example\n";
        assert_eq!(scan(response).unwrap(), "last.example");
    }

    #[test]
    fn test_final_line_without_newline() {
        assert_eq!(scan("domain: COM\nwhois: tail.example").unwrap(), "tail.example");
    }

    #[test]
    fn test_missing_marker_is_not_found() {
        let err = scan("domain: TEST\nstatus: ACTIVE\n").unwrap_err();
        assert_eq!(err.status(), QueryStatus::NotFound);
    }

    #[test]
    fn test_empty_response_is_not_found() {
        let err = scan("").unwrap_err();
        assert_eq!(err.status(), QueryStatus::NotFound);
    }

    #[test]
    fn test_marker_without_value_is_protocol_error() {
        let err = scan("whois:\nwhois: later.example\n").unwrap_err();
        assert_eq!(err.status(), QueryStatus::ProtocolError);

        let err = scan("whois:    \r\n").unwrap_err();
        assert_eq!(err.status(), QueryStatus::ProtocolError);
    }

    #[test]
    fn test_oversized_line_is_protocol_error() {
        let response = format!("{}\nwhois: after.example\n", "a".repeat(MAX_LINE_LENGTH + 10));
        let err = scan(&response).unwrap_err();
        assert_eq!(err.status(), QueryStatus::ProtocolError);
        assert!(err.to_string().contains("exceeds 65536 bytes"));
    }

    #[test]
    fn test_line_at_length_limit_is_accepted() {
        let response = format!("{}\nwhois: after.example\n", "a".repeat(MAX_LINE_LENGTH));
        assert_eq!(scan(&response).unwrap(), "after.example");
    }

    #[test]
    fn test_marker_must_start_the_line() {
        let err = scan("  whois: indented.example\nrefer: other\n").unwrap_err();
        assert_eq!(err.status(), QueryStatus::NotFound);
    }

    #[test]
    fn test_client_creation() {
        let client = WhoisClient::new("127.0.0.1:4343");
        assert_eq!(client.endpoint(), "127.0.0.1:4343");
        assert_eq!(client.marker, "whois:");

        let config = ScanConfig::default()
            .with_endpoint("whois.example:43")
            .with_marker("refer:")
            .with_connect_timeout(Duration::from_secs(2));
        let client = WhoisClient::with_config(&config);
        assert_eq!(client.endpoint(), "whois.example:43");
        assert_eq!(client.marker, "refer:");
        assert_eq!(client.connect_timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_error() {
        // Bind then drop to get a local port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = WhoisClient::new(addr.to_string());
        let outcome = client.resolve("com", 0).await;
        assert_eq!(outcome.status, QueryStatus::NetworkError);
        assert!(outcome.attribute.is_empty());
        assert!(outcome.error_message.is_some());
    }
}
