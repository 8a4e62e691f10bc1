//! Temporal correlation of two timestamped event streams
//!
//! Pairs every log event with every node event that carries the same IP and
//! whose timestamp lies within a symmetric window. Typical use: matching
//! security log entries against Tor relay observations.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Accepted timestamp layouts, tried in order
const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%SZ"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("unsupported timestamp format: {0}")]
    InvalidTimestampFormat(String),
}

/// An event observed for an IP at a point in time
///
/// Fields other than `ip` and `timestamp` are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ip: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TimestampedEvent {
    pub fn new(ip: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            timestamp: timestamp.into(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// A log event matched to a node event
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrelationPair<'a> {
    pub log: &'a TimestampedEvent,
    pub node: &'a TimestampedEvent,
}

/// Parse a timestamp in one of the accepted layouts
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, CorrelationError> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| CorrelationError::InvalidTimestampFormat(value.to_string()))
}

/// Match log events to node events by IP and time proximity
///
/// All timestamps are validated before any pair is produced; the first bad
/// one (logs first, then nodes) fails the whole call. Pairs come out in
/// (log, node) input order.
pub fn correlate<'a>(
    logs: &'a [TimestampedEvent],
    nodes: &'a [TimestampedEvent],
    window_seconds: u64,
) -> Result<Vec<CorrelationPair<'a>>, CorrelationError> {
    let log_times = parse_all(logs)?;
    let node_times = parse_all(nodes)?;

    let mut pairs = Vec::new();
    for (log, log_time) in logs.iter().zip(&log_times) {
        for (node, node_time) in nodes.iter().zip(&node_times) {
            if log.ip != node.ip {
                continue;
            }
            let diff = (*log_time - *node_time).num_seconds().unsigned_abs();
            if diff <= window_seconds {
                pairs.push(CorrelationPair { log, node });
            }
        }
    }

    Ok(pairs)
}

fn parse_all(events: &[TimestampedEvent]) -> Result<Vec<NaiveDateTime>, CorrelationError> {
    events.iter().map(|e| parse_timestamp(&e.timestamp)).collect()
}
