//! Risk scoring engine
//!
//! Turns a [`SignalSet`] into a [`RiskAssessment`]:
//! - Weighted, individually capped contributions summed into a score
//! - Score bucketed into a risk level
//! - Independent triggered-signal count mapped to a confidence tag
//! - Ordered, human-readable explanations of every signal
//!
//! The engine is total: any well-typed signal set produces an assessment.

use serde::{Deserialize, Serialize};

use crate::{
    SignalSet, ABUSE_SEVERE_THRESHOLD, ABUSE_SIGNAL_THRESHOLD, HIGH_CONFIDENCE_SIGNALS,
    HIGH_RISK_SCORE, HISTORY_CAP, HISTORY_DIVISOR, MEDIUM_RISK_SCORE, PORT_ACTIVITY_CAP,
    PORT_ACTIVITY_DIVISOR, WEIGHT_BAD_ASN, WEIGHT_BLOCKLIST, WEIGHT_FAILED_LOGINS,
    WEIGHT_OFF_HOURS, WEIGHT_PORT_SCAN, WEIGHT_PROXY, WEIGHT_RISKY_PROVIDER, WEIGHT_TOR_EXIT,
    WEIGHT_TRAFFIC_SPIKE, WEIGHT_VPN,
};
use crate::signals::AsnReputation;

/// Risk level derived from the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Bucket a score; lower bounds are inclusive
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_RISK_SCORE {
            Self::High
        } else if score >= MEDIUM_RISK_SCORE {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// How many independent indicators back the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_signal_count(count: u32) -> Self {
        match count {
            c if c >= HIGH_CONFIDENCE_SIGNALS => Self::High,
            3 => Self::Medium,
            2 => Self::Low,
            _ => Self::VeryLow,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VeryLow => write!(f, "Very Low"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Individual contribution of every scoring term
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub abuse_score: f64,
    pub blocklist: f64,
    pub tor_exit: f64,
    pub vpn: f64,
    pub proxy: f64,
    pub port_activity: f64,
    pub history: f64,
    pub asn: f64,
    pub provider_category: f64,
    pub off_hours: f64,
    pub failed_logins: f64,
    pub port_scan: f64,
    pub traffic_spike: f64,
}

impl ScoreBreakdown {
    fn from_signals(s: &SignalSet) -> Self {
        let weight = |on: bool, w: f64| if on { w } else { 0.0 };

        Self {
            abuse_score: f64::from(s.abuse_score.min(100)) / 100.0,
            blocklist: weight(s.blocklist_hit, WEIGHT_BLOCKLIST),
            tor_exit: weight(s.tor_exit, WEIGHT_TOR_EXIT),
            vpn: weight(s.vpn_detected, WEIGHT_VPN),
            proxy: weight(s.proxy_detected, WEIGHT_PROXY),
            port_activity: (s.port_activity.max(0.0) / PORT_ACTIVITY_DIVISOR)
                .min(PORT_ACTIVITY_CAP),
            history: (s.history_score.max(0.0) / HISTORY_DIVISOR).min(HISTORY_CAP),
            asn: weight(s.has_bad_asn(), WEIGHT_BAD_ASN),
            provider_category: weight(s.has_risky_provider(), WEIGHT_RISKY_PROVIDER),
            off_hours: weight(s.is_off_hours(), WEIGHT_OFF_HOURS),
            failed_logins: weight(s.has_failed_logins(), WEIGHT_FAILED_LOGINS),
            port_scan: weight(s.has_port_scan(), WEIGHT_PORT_SCAN),
            traffic_spike: weight(s.traffic_spike, WEIGHT_TRAFFIC_SPIKE),
        }
    }

    /// Sum of all terms, starting from the abuse score
    pub fn sum(&self) -> f64 {
        [
            self.blocklist,
            self.tor_exit,
            self.vpn,
            self.proxy,
            self.port_activity,
            self.history,
            self.asn,
            self.provider_category,
            self.off_hours,
            self.failed_logins,
            self.port_scan,
            self.traffic_spike,
        ]
        .iter()
        .fold(self.abuse_score, |acc, v| acc + v)
    }
}

/// Debug detail attached in verbose mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDebug {
    pub raw_scores: ScoreBreakdown,
    /// Clamped, unrounded score
    pub total: f64,
    pub signal_count: u32,
}

/// Result of scoring one signal set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// Clamped to [0, 1], rounded to 3 decimals
    pub score: f64,
    pub confidence: Confidence,
    /// Explanations in fixed generation order
    pub factors: Vec<String>,
    #[serde(flatten)]
    pub debug: Option<ScoreDebug>,
}

/// Score a signal set
pub fn score(signals: &SignalSet) -> RiskAssessment {
    evaluate(signals, false)
}

/// Score a signal set and attach per-term contributions and the signal count
pub fn score_verbose(signals: &SignalSet) -> RiskAssessment {
    evaluate(signals, true)
}

fn evaluate(signals: &SignalSet, verbose: bool) -> RiskAssessment {
    let signals = &signals.normalized();
    let breakdown = ScoreBreakdown::from_signals(signals);
    let total = breakdown.sum().clamp(0.0, 1.0);
    let signal_count = count_signals(signals);

    // The level always agrees with the reported score
    let score = round3(total);

    RiskAssessment {
        level: RiskLevel::from_score(score),
        score,
        confidence: Confidence::from_signal_count(signal_count),
        factors: explain(signals),
        debug: verbose.then(|| ScoreDebug {
            raw_scores: breakdown,
            total,
            signal_count,
        }),
    }
}

/// Number of independently triggered indicators
pub fn count_signals(s: &SignalSet) -> u32 {
    let triggered = [
        s.blocklist_hit,
        s.tor_exit,
        s.vpn_detected,
        s.proxy_detected,
        s.has_risky_port_activity(),
        s.has_risky_history(),
        s.has_bad_asn(),
        s.has_risky_provider(),
        s.is_off_hours(),
        s.has_failed_logins(),
        s.has_port_scan(),
        s.traffic_spike,
        s.abuse_score >= ABUSE_SIGNAL_THRESHOLD,
    ];
    triggered.iter().filter(|&&t| t).count() as u32
}

/// Build explanations; the order is part of the output contract
fn explain(s: &SignalSet) -> Vec<String> {
    let mut factors = Vec::with_capacity(16);

    match s.asn_reputation {
        Some(AsnReputation::Bad) => {
            factors.push("ASN is in known bad-reputation or blacklisted ranges.".to_string())
        }
        Some(AsnReputation::Good) => factors.push("ASN is recognized as reputable.".to_string()),
        Some(AsnReputation::Unknown) | None => {}
    }

    if let Some(category) = s.provider_category.filter(|c| c.is_risky()) {
        factors.push(format!(
            "Provider in category: {} (increases risk).",
            category
        ));
    }

    if s.is_off_hours() {
        factors.push("Activity during atypical hours (possible risk).".to_string());
    }

    if s.has_failed_logins() {
        factors.push(format!("{} failed login attempts observed.", s.failed_logins));
    }

    if s.has_port_scan() {
        factors.push(format!(
            "Port scan patterns detected ({} targets).",
            s.port_scan_count
        ));
    }

    if s.traffic_spike {
        factors.push("Anomalous traffic spike detected.".to_string());
    }

    factors.push(pick(
        s.tor_exit,
        "This IP is listed as a TOR exit node.",
        "No evidence this IP is a TOR exit node.",
    ));
    factors.push(pick(
        s.vpn_detected,
        "VPN usage or infrastructure detected for this IP.",
        "No VPN activity or infrastructure detected.",
    ));
    factors.push(pick(
        s.proxy_detected,
        "Flagged as open proxy or proxy-related service.",
        "No proxy service or history found for this IP.",
    ));
    factors.push(pick(
        s.blocklist_hit,
        "This IP appears on a known threat blocklist.",
        "IP is not found on public threat blocklists.",
    ));

    factors.push(if s.abuse_score >= ABUSE_SEVERE_THRESHOLD {
        format!(
            "High AbuseIPDB score ({}): severe and recent abuse activity reported.",
            s.abuse_score
        )
    } else if s.abuse_score >= ABUSE_SIGNAL_THRESHOLD {
        format!(
            "Moderate AbuseIPDB score ({}): some questionable behavior reported.",
            s.abuse_score
        )
    } else {
        "No significant abuse or threat activity on AbuseIPDB.".to_string()
    });

    factors.push(pick(
        s.has_risky_port_activity(),
        "Unusual or risky port activity detected.",
        "No suspicious or risky port activity noted.",
    ));
    factors.push(pick(
        s.has_risky_history(),
        "This IP or source has a history of suspicious or risky activity.",
        "Clean activity history: no risky prior behaviors identified.",
    ));

    factors
}

fn pick(on: bool, yes: &str, no: &str) -> String {
    let sentence = if on { yes } else { no };
    sentence.to_string()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
