//! Threat signals gathered for a single IP
//!
//! A [`SignalSet`] is the normalized bag of enrichment results that the
//! scoring engine consumes. Every field is optional on the wire and falls
//! back to a neutral default, so a partially enriched IP still scores.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    FAILED_LOGIN_THRESHOLD, HISTORY_SIGNAL, OFF_HOURS_AFTER, OFF_HOURS_BEFORE,
    PORT_ACTIVITY_SIGNAL, PORT_SCAN_THRESHOLD,
};

const MAX_ABUSE_SCORE: u8 = 100;
const LAST_HOUR: u8 = 23;

fn valid_hour(hour: u8) -> Option<u8> {
    (hour <= LAST_HOUR).then_some(hour)
}

fn clamp_abuse_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    Ok(u8::deserialize(deserializer)?.min(MAX_ABUSE_SCORE))
}

/// Hours outside 0-23 are treated as unknown
fn valid_hour_of_day<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
    Ok(Option::<u8>::deserialize(deserializer)?.and_then(valid_hour))
}

/// Reputation of the autonomous system an IP belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsnReputation {
    Good,
    Bad,
    #[serde(other)]
    Unknown,
}

/// Hosting classification of the network an IP belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCategory {
    Residential,
    Datacenter,
    Vpn,
    Hosting,
    #[serde(other)]
    Other,
}

impl ProviderCategory {
    /// Categories that amplify risk
    pub fn is_risky(self) -> bool {
        matches!(self, Self::Vpn | Self::Hosting | Self::Datacenter)
    }
}

impl std::fmt::Display for ProviderCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Residential => write!(f, "residential"),
            Self::Datacenter => write!(f, "datacenter"),
            Self::Vpn => write!(f, "vpn"),
            Self::Hosting => write!(f, "hosting"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// All threat signals known for one IP
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalSet {
    /// External reputation confidence (0-100)
    #[serde(deserialize_with = "clamp_abuse_score")]
    pub abuse_score: u8,
    /// Listed on a threat blocklist (abuse score >= 70 upstream)
    pub blocklist_hit: bool,
    /// Known Tor exit node
    pub tor_exit: bool,
    /// Heuristic VPN indicator
    pub vpn_detected: bool,
    /// Heuristic proxy indicator
    pub proxy_detected: bool,
    /// Magnitude of risky port behavior
    pub port_activity: f64,
    /// Magnitude of prior risky behavior
    pub history_score: f64,
    /// AS-level reputation, if known
    pub asn_reputation: Option<AsnReputation>,
    /// Hosting classification, if known
    pub provider_category: Option<ProviderCategory>,
    /// Local hour (0-23) of the observed activity
    #[serde(deserialize_with = "valid_hour_of_day")]
    pub hour_of_day: Option<u8>,
    /// Failed authentication attempts
    pub failed_logins: u32,
    /// Distinct ports scanned
    pub port_scan_count: u32,
    /// Anomalous traffic volume
    pub traffic_spike: bool,
}

impl SignalSet {
    /// Create a new signal set builder
    pub fn builder() -> SignalSetBuilder {
        SignalSetBuilder::default()
    }

    /// Copy with out-of-range fields pulled back into their domains
    pub fn normalized(&self) -> Self {
        Self {
            abuse_score: self.abuse_score.min(MAX_ABUSE_SCORE),
            port_activity: self.port_activity.max(0.0),
            history_score: self.history_score.max(0.0),
            hour_of_day: self.hour_of_day.and_then(valid_hour),
            ..self.clone()
        }
    }

    pub fn has_bad_asn(&self) -> bool {
        self.asn_reputation == Some(AsnReputation::Bad)
    }

    pub fn has_risky_provider(&self) -> bool {
        self.provider_category.is_some_and(ProviderCategory::is_risky)
    }

    /// Activity observed before 06:00 or after 22:59
    pub fn is_off_hours(&self) -> bool {
        self.hour_of_day
            .and_then(valid_hour)
            .is_some_and(|h| h < OFF_HOURS_BEFORE || h > OFF_HOURS_AFTER)
    }

    pub fn has_failed_logins(&self) -> bool {
        self.failed_logins >= FAILED_LOGIN_THRESHOLD
    }

    pub fn has_port_scan(&self) -> bool {
        self.port_scan_count >= PORT_SCAN_THRESHOLD
    }

    pub fn has_risky_port_activity(&self) -> bool {
        self.port_activity > PORT_ACTIVITY_SIGNAL
    }

    pub fn has_risky_history(&self) -> bool {
        self.history_score > HISTORY_SIGNAL
    }
}

/// Builder for signal sets
#[derive(Debug, Default)]
pub struct SignalSetBuilder {
    signals: SignalSet,
}

impl SignalSetBuilder {
    pub fn abuse_score(mut self, score: u8) -> Self {
        self.signals.abuse_score = score.min(MAX_ABUSE_SCORE);
        self
    }

    pub fn blocklist_hit(mut self, hit: bool) -> Self {
        self.signals.blocklist_hit = hit;
        self
    }

    pub fn tor_exit(mut self, tor: bool) -> Self {
        self.signals.tor_exit = tor;
        self
    }

    pub fn vpn_detected(mut self, vpn: bool) -> Self {
        self.signals.vpn_detected = vpn;
        self
    }

    pub fn proxy_detected(mut self, proxy: bool) -> Self {
        self.signals.proxy_detected = proxy;
        self
    }

    pub fn port_activity(mut self, activity: f64) -> Self {
        self.signals.port_activity = activity.max(0.0);
        self
    }

    pub fn history_score(mut self, history: f64) -> Self {
        self.signals.history_score = history.max(0.0);
        self
    }

    pub fn asn_reputation(mut self, reputation: AsnReputation) -> Self {
        self.signals.asn_reputation = Some(reputation);
        self
    }

    pub fn provider_category(mut self, category: ProviderCategory) -> Self {
        self.signals.provider_category = Some(category);
        self
    }

    /// Hours past 23 leave the hour unknown
    pub fn hour_of_day(mut self, hour: u8) -> Self {
        self.signals.hour_of_day = valid_hour(hour);
        self
    }

    pub fn failed_logins(mut self, count: u32) -> Self {
        self.signals.failed_logins = count;
        self
    }

    pub fn port_scan_count(mut self, count: u32) -> Self {
        self.signals.port_scan_count = count;
        self
    }

    pub fn traffic_spike(mut self, spike: bool) -> Self {
        self.signals.traffic_spike = spike;
        self
    }

    pub fn build(self) -> SignalSet {
        self.signals
    }
}
