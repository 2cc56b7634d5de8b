//! Protocol implementations.
//!
//! Only the WHOIS query protocol lives here; the feed is plain HTTP and is
//! handled by [`crate::feed`].

/// WHOIS protocol implementation
pub mod whois;

pub use whois::{find_marker_value, WhoisClient, MAX_LINE_LENGTH};
