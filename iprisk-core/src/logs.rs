//! Incident extraction from raw security logs
//!
//! Recognizes lines of the form
//! `YYYY-MM-DD HH:MM:SS  INCIDENT ... a.b.c.d[:port]` and keeps the first
//! occurrence of each (ip, port, timestamp, incident) tuple.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

static LOG_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<timestamp>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\s+(?P<incident>[A-Z]+).*?(?P<ip>\d{1,3}(?:\.\d{1,3}){3})(?::(?P<port>\d+))?",
    )
    .unwrap()
});

/// One incident extracted from a log line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogEntry {
    pub ip: String,
    /// Destination port, when the line carries one
    #[serde(default)]
    pub port: Option<u16>,
    pub timestamp: String,
    #[serde(rename = "incidentType")]
    pub incident_type: String,
}

impl LogEntry {
    /// Parse a single line; `None` when it is not an incident line
    pub fn parse_line(line: &str) -> Option<Self> {
        let caps = LOG_LINE_REGEX.captures(line)?;

        Some(Self {
            ip: caps["ip"].to_string(),
            port: caps.name("port").and_then(|m| m.as_str().parse().ok()),
            timestamp: caps["timestamp"].to_string(),
            incident_type: caps["incident"].to_string(),
        })
    }
}

/// Extract unique incidents in first-seen order
pub fn extract_log_entries(text: &str) -> Vec<LogEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for entry in text.lines().filter_map(LogEntry::parse_line) {
        if seen.insert(entry.clone()) {
            entries.push(entry);
        }
    }

    entries
}
