//! Identifier feed.
//!
//! The feed is a plain text document with one identifier per line. Lines
//! starting with `#` are comments and blank lines are ignored. It is fetched
//! over HTTP, or read from a local file when one is configured.

use crate::error::TldWhoisError;
use crate::types::ScanConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where identifiers come from.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedSource {
    Url(String),
    File(PathBuf),
}

impl FeedSource {
    /// Pick the source from a scan configuration; a feed file wins over the URL.
    pub fn from_config(config: &ScanConfig) -> Self {
        match &config.feed_file {
            Some(path) => FeedSource::File(path.clone()),
            None => FeedSource::Url(config.feed_url.clone()),
        }
    }

    /// Human-readable location for logs and errors.
    pub fn location(&self) -> String {
        match self {
            FeedSource::Url(url) => url.clone(),
            FeedSource::File(path) => path.display().to_string(),
        }
    }
}

/// Fetches and filters the identifier feed.
pub struct FeedClient {
    source: FeedSource,
    http_client: reqwest::Client,
}

impl FeedClient {
    /// Create a feed client for `source`.
    ///
    /// # Errors
    ///
    /// Returns `TldWhoisError::FeedError` if the HTTP client cannot be built.
    pub fn new(source: FeedSource) -> Result<Self, TldWhoisError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("tld-whois/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                TldWhoisError::feed(source.location(), format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            source,
            http_client,
        })
    }

    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    /// Fetch the feed and return its identifiers in feed order.
    ///
    /// Duplicates are kept; each one is a separate unit of work.
    ///
    /// # Errors
    ///
    /// Returns `TldWhoisError::FeedError` on transport failure, a non-success
    /// HTTP status, or a file that cannot be read.
    pub async fn fetch_identifiers(&self) -> Result<Vec<String>, TldWhoisError> {
        let body = match &self.source {
            FeedSource::Url(url) => self.fetch_url(url).await?,
            FeedSource::File(path) => read_feed_file(path).await?,
        };

        let identifiers = parse_feed(&body);
        tracing::info!(
            source = %self.source.location(),
            count = identifiers.len(),
            "loaded identifier feed"
        );
        Ok(identifiers)
    }

    async fn fetch_url(&self, url: &str) -> Result<String, TldWhoisError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| TldWhoisError::feed(url, TldWhoisError::from(e).to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TldWhoisError::feed(
                url,
                format!("HTTP {} from feed", status.as_u16()),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| TldWhoisError::feed(url, format!("Failed to read feed body: {}", e)))
    }
}

async fn read_feed_file(path: &Path) -> Result<String, TldWhoisError> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        TldWhoisError::feed(
            path.display().to_string(),
            format!("Failed to read feed file: {}", e),
        )
    })
}

/// Extract identifiers from feed text.
///
/// Surrounding whitespace (including `\r`) is trimmed; comment lines and
/// blank lines are dropped.
pub fn parse_feed(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_feed_skips_comments_and_blanks() {
        let body = "# Version 2024010100, Last Updated Mon Jan  1 07:07:01 2024 UTC\nAAA\n\nCOM\r\n  \nXN--P1AI\n";
        assert_eq!(parse_feed(body), vec!["AAA", "COM", "XN--P1AI"]);
    }

    #[test]
    fn test_parse_feed_keeps_duplicates_in_order() {
        assert_eq!(parse_feed("a\na\nb\n"), vec!["a", "a", "b"]);
    }

    #[test]
    fn test_parse_feed_empty() {
        assert!(parse_feed("").is_empty());
        assert!(parse_feed("# only a comment\n\n").is_empty());
    }

    #[test]
    fn test_source_from_config() {
        let config = ScanConfig::default();
        assert_eq!(
            FeedSource::from_config(&config),
            FeedSource::Url(config.feed_url.clone())
        );

        let config = config.with_feed_file("tlds.txt");
        assert_eq!(
            FeedSource::from_config(&config),
            FeedSource::File(PathBuf::from("tlds.txt"))
        );
    }

    #[tokio::test]
    async fn test_fetch_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"# header\nCOM\nORG\n").unwrap();
        file.flush().unwrap();

        let client = FeedClient::new(FeedSource::File(file.path().to_path_buf())).unwrap();
        let identifiers = client.fetch_identifiers().await.unwrap();
        assert_eq!(identifiers, vec!["COM", "ORG"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_feed_error() {
        let client = FeedClient::new(FeedSource::File(PathBuf::from(
            "/nonexistent/tld-whois/feed.txt",
        )))
        .unwrap();
        let err = client.fetch_identifiers().await.unwrap_err();
        assert!(matches!(err, TldWhoisError::FeedError { .. }));
        assert!(err.is_setup_error());
    }
}
