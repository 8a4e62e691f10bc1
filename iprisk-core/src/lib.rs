//! iprisk Core - IP risk scoring and event correlation
//!
//! This crate holds the deterministic, side-effect-free parts of iprisk:
//! - Signal sets describing everything known about one IP
//! - The risk scoring engine (score, level, confidence, explanations)
//! - The temporal correlation matcher for two timestamped event streams
//! - Heuristic signal derivations and log line extraction
//!
//! Nothing in here performs I/O, logs, or holds shared state.

pub mod addr;
pub mod correlation;
pub mod heuristics;
pub mod logs;
pub mod scoring;
pub mod signals;

pub use addr::*;
pub use correlation::*;
pub use heuristics::*;
pub use logs::*;
pub use scoring::*;
pub use signals::*;

// Score contributions. Each one is independent of the others.

/// Contribution of a blocklist hit
pub const WEIGHT_BLOCKLIST: f64 = 0.10;

/// Contribution of Tor exit membership
pub const WEIGHT_TOR_EXIT: f64 = 0.30;

/// Contribution of VPN detection
pub const WEIGHT_VPN: f64 = 0.25;

/// Contribution of proxy detection
pub const WEIGHT_PROXY: f64 = 0.25;

/// Divisor applied to port activity magnitude
pub const PORT_ACTIVITY_DIVISOR: f64 = 200.0;

/// Cap on the port activity contribution
pub const PORT_ACTIVITY_CAP: f64 = 0.08;

/// Divisor applied to history magnitude
pub const HISTORY_DIVISOR: f64 = 200.0;

/// Cap on the history contribution
pub const HISTORY_CAP: f64 = 0.08;

/// Contribution of a bad ASN reputation
pub const WEIGHT_BAD_ASN: f64 = 0.30;

/// Contribution of a risky provider category (vpn, hosting, datacenter)
pub const WEIGHT_RISKY_PROVIDER: f64 = 0.20;

/// Contribution of activity outside normal hours
pub const WEIGHT_OFF_HOURS: f64 = 0.05;

/// Contribution of repeated failed logins
pub const WEIGHT_FAILED_LOGINS: f64 = 0.05;

/// Contribution of port scanning
pub const WEIGHT_PORT_SCAN: f64 = 0.10;

/// Contribution of a traffic spike
pub const WEIGHT_TRAFFIC_SPIKE: f64 = 0.05;

// Trigger thresholds

/// Hours strictly before this are off-hours
pub const OFF_HOURS_BEFORE: u8 = 6;

/// Hours strictly after this are off-hours
pub const OFF_HOURS_AFTER: u8 = 22;

/// Failed logins at or above this count are a signal
pub const FAILED_LOGIN_THRESHOLD: u32 = 5;

/// Distinct scanned ports at or above this count are a signal
pub const PORT_SCAN_THRESHOLD: u32 = 5;

/// Port activity strictly above this counts as a signal
pub const PORT_ACTIVITY_SIGNAL: f64 = 50.0;

/// History magnitude strictly above this counts as a signal
pub const HISTORY_SIGNAL: f64 = 30.0;

/// Abuse score at or above this counts toward confidence
pub const ABUSE_SIGNAL_THRESHOLD: u8 = 40;

/// Abuse score at or above this is reported as severe
pub const ABUSE_SEVERE_THRESHOLD: u8 = 80;

/// Abuse score at or above this is treated as a blocklist hit
pub const BLOCKLIST_THRESHOLD: u8 = 70;

// Level and confidence buckets

/// Minimum score for the High level
pub const HIGH_RISK_SCORE: f64 = 0.65;

/// Minimum score for the Medium level
pub const MEDIUM_RISK_SCORE: f64 = 0.25;

/// Minimum signal count for High confidence
pub const HIGH_CONFIDENCE_SIGNALS: u32 = 4;

/// Default correlation window in seconds
pub const DEFAULT_CORRELATION_WINDOW_SECS: u64 = 300;
