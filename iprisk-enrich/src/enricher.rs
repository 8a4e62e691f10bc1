//! IP enrichment
//!
//! Gathers everything known about an observed IP and derives the signal set
//! the scoring engine consumes:
//! - Reputation (abuse score, domain, hostnames), memoised per IP
//! - Tor exit membership, or an upstream guard match
//! - VPN / proxy keyword heuristics over reverse DNS names
//! - Blocklist and port activity derivations
//! - Hour of day from the event timestamp
//! - GeoIP and ISP records
//!
//! Collaborator failures degrade to neutral values; enrichment itself never fails.

use chrono::Timelike;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use iprisk_core::{
    blocklist_hit, parse_timestamp, port_activity, AnonymizerDetector, KeywordDetector, LogEntry,
    SignalSet,
};
use iprisk_intel::{AbuseReport, GeoRecord, GeoTable, IspRecord};

use crate::{ExitListProvider, GeoLookup, ReputationSource};

/// One IP observation to enrich
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichRequest {
    pub ip: String,
    pub port: Option<u16>,
    /// Event time; only used for the hour of day
    pub timestamp: Option<String>,
    /// The IP was already matched to a Tor guard relay upstream
    pub guard_match: bool,
    pub incident_type: Option<String>,
}

impl EnrichRequest {
    pub fn new(ip: &str) -> Self {
        Self {
            ip: ip.to_string(),
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_timestamp(mut self, timestamp: &str) -> Self {
        self.timestamp = Some(timestamp.to_string());
        self
    }

    pub fn with_guard_match(mut self, matched: bool) -> Self {
        self.guard_match = matched;
        self
    }
}

impl From<&LogEntry> for EnrichRequest {
    fn from(entry: &LogEntry) -> Self {
        Self {
            ip: entry.ip.clone(),
            port: entry.port,
            timestamp: Some(entry.timestamp.clone()),
            guard_match: false,
            incident_type: Some(entry.incident_type.clone()),
        }
    }
}

/// Result of enriching one IP
#[derive(Debug, Clone, Serialize)]
pub struct Enrichment {
    pub signals: SignalSet,
    /// Reputation report, absent when no source is configured or it failed
    pub abuse: Option<AbuseReport>,
    pub geo: GeoRecord,
    pub isp: IspRecord,
}

/// Composes collaborators into signal sets
pub struct Enricher {
    reputation: Option<Arc<dyn ReputationSource>>,
    exit_list: Arc<ExitListProvider>,
    geo: Arc<dyn GeoLookup>,
    detector: Arc<dyn AnonymizerDetector>,
    /// One cell per IP; concurrent callers for the same IP share a single lookup
    reputation_memo: DashMap<String, Arc<OnceCell<Option<AbuseReport>>>>,
}

impl Enricher {
    /// Enricher with no reputation source, an empty GeoIP table and the keyword detector
    pub fn new(exit_list: Arc<ExitListProvider>) -> Self {
        Self {
            reputation: None,
            exit_list,
            geo: Arc::new(GeoTable::empty()),
            detector: Arc::new(KeywordDetector::default()),
            reputation_memo: DashMap::new(),
        }
    }

    pub fn with_reputation(mut self, source: Arc<dyn ReputationSource>) -> Self {
        self.reputation = Some(source);
        self
    }

    pub fn with_geo(mut self, geo: Arc<dyn GeoLookup>) -> Self {
        self.geo = geo;
        self
    }

    pub fn with_detector(mut self, detector: Arc<dyn AnonymizerDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Enrich one observation
    pub async fn enrich(&self, request: &EnrichRequest) -> Enrichment {
        let ip = request.ip.as_str();
        let abuse = self.reputation_for(ip).await;

        let abuse_score = abuse
            .as_ref()
            .map(|r| r.abuse_confidence_score.min(100))
            .unwrap_or(0);
        let (domain, hostnames) = match &abuse {
            Some(r) => (r.domain.as_deref(), r.hostnames.as_slice()),
            None => (None, &[][..]),
        };
        let flags = self.detector.detect(domain, hostnames);

        let tor_exit = request.guard_match || self.exit_list.contains(ip).await;

        let mut builder = SignalSet::builder()
            .abuse_score(abuse_score)
            .blocklist_hit(blocklist_hit(abuse_score))
            .tor_exit(tor_exit)
            .vpn_detected(flags.vpn)
            .proxy_detected(flags.proxy)
            .port_activity(port_activity(request.port))
            .history_score(0.0);

        if let Some(hour) = request.timestamp.as_deref().and_then(hour_of_day) {
            builder = builder.hour_of_day(hour);
        }

        let (geo, isp) = self.geo.lookup(ip);
        debug!(
            "Enriched {}: abuse={} tor={} vpn={} proxy={}",
            ip, abuse_score, tor_exit, flags.vpn, flags.proxy
        );

        Enrichment {
            signals: builder.build(),
            abuse,
            geo,
            isp,
        }
    }

    async fn reputation_for(&self, ip: &str) -> Option<AbuseReport> {
        let source = self.reputation.as_ref()?;

        // Clone the cell out so no shard lock is held across the lookup
        let cell = Arc::clone(
            self.reputation_memo
                .entry(ip.to_string())
                .or_default()
                .value(),
        );

        cell.get_or_init(|| async {
            match source.check(ip).await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("Reputation lookup for {} failed: {}", ip, e);
                    None
                }
            }
        })
        .await
        .clone()
    }
}

/// Hour of an event timestamp; unparsable input yields nothing
fn hour_of_day(timestamp: &str) -> Option<u8> {
    parse_timestamp(timestamp).ok().map(|t| t.hour() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EnrichError, ExitListSource, RefreshPolicy};
    use async_trait::async_trait;
    use iprisk_core::{score, RiskLevel};
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticReputation {
        reports: HashMap<String, AbuseReport>,
        calls: AtomicUsize,
    }

    impl StaticReputation {
        fn new(reports: Vec<AbuseReport>) -> Arc<Self> {
            Arc::new(Self {
                reports: reports.into_iter().map(|r| (r.ip.clone(), r)).collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ReputationSource for StaticReputation {
        async fn check(&self, ip: &str) -> Result<AbuseReport, EnrichError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reports
                .get(ip)
                .cloned()
                .ok_or_else(|| EnrichError::Unavailable(format!("no report for {}", ip)))
        }
    }

    /// Answers after a delay, so overlapping lookups really overlap
    struct SlowReputation {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReputationSource for SlowReputation {
        async fn check(&self, ip: &str) -> Result<AbuseReport, EnrichError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(report(ip, 85, None, &[]))
        }
    }

    struct NoExits;

    #[async_trait]
    impl ExitListSource for NoExits {
        async fn fetch(&self) -> Result<HashSet<String>, EnrichError> {
            Err(EnrichError::Unavailable("offline".to_string()))
        }
    }

    fn exit_list(ips: &[&str]) -> Arc<ExitListProvider> {
        Arc::new(ExitListProvider::with_ips(
            Arc::new(NoExits),
            RefreshPolicy::default(),
            ips.iter().map(|s| s.to_string()).collect(),
        ))
    }

    fn report(ip: &str, score: u8, domain: Option<&str>, hostnames: &[&str]) -> AbuseReport {
        AbuseReport {
            ip: ip.to_string(),
            abuse_confidence_score: score,
            domain: domain.map(String::from),
            hostnames: hostnames.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_full_enrichment() {
        let reputation = StaticReputation::new(vec![report(
            "185.220.101.4",
            92,
            Some("relayvpn.net"),
            &["exit.proxy.relayvpn.net"],
        )]);
        let enricher = Enricher::new(exit_list(&["185.220.101.4"])).with_reputation(reputation);

        let request = EnrichRequest::new("185.220.101.4")
            .with_port(3389)
            .with_timestamp("2024-05-01 03:12:45");
        let enrichment = enricher.enrich(&request).await;
        let signals = &enrichment.signals;

        assert_eq!(signals.abuse_score, 92);
        assert!(signals.blocklist_hit);
        assert!(signals.tor_exit);
        assert!(signals.vpn_detected);
        assert!(signals.proxy_detected);
        assert_eq!(signals.port_activity, 80.0);
        assert_eq!(signals.hour_of_day, Some(3));
        assert_eq!(enrichment.geo.country, "Unknown");

        assert_eq!(score(signals).level, RiskLevel::High);
    }

    #[tokio::test]
    async fn test_guard_match_counts_as_tor() {
        let enricher = Enricher::new(exit_list(&[]));
        let request = EnrichRequest::new("10.0.0.1").with_guard_match(true);

        assert!(enricher.enrich(&request).await.signals.tor_exit);
        assert!(
            !enricher
                .enrich(&EnrichRequest::new("10.0.0.1"))
                .await
                .signals
                .tor_exit
        );
    }

    #[tokio::test]
    async fn test_reputation_failure_degrades_to_zero() {
        let reputation = StaticReputation::new(vec![]);
        let enricher = Enricher::new(exit_list(&[])).with_reputation(reputation.clone());

        let enrichment = enricher.enrich(&EnrichRequest::new("8.8.8.8")).await;
        assert!(enrichment.abuse.is_none());
        assert_eq!(enrichment.signals.abuse_score, 0);
        assert!(!enrichment.signals.blocklist_hit);

        // Failures are memoised too
        enricher.enrich(&EnrichRequest::new("8.8.8.8")).await;
        assert_eq!(reputation.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reputation_is_memoised() {
        let reputation = StaticReputation::new(vec![report("1.2.3.4", 40, None, &[])]);
        let enricher = Enricher::new(exit_list(&[])).with_reputation(reputation.clone());

        for _ in 0..3 {
            let enrichment = enricher.enrich(&EnrichRequest::new("1.2.3.4")).await;
            assert_eq!(enrichment.signals.abuse_score, 40);
        }
        assert_eq!(reputation.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_one_reputation_call() {
        let reputation = Arc::new(SlowReputation {
            calls: AtomicUsize::new(0),
        });
        let enricher = Enricher::new(exit_list(&[])).with_reputation(reputation.clone());
        let request = EnrichRequest::new("1.2.3.4");

        let (a, b, c, d) = tokio::join!(
            enricher.enrich(&request),
            enricher.enrich(&request),
            enricher.enrich(&request),
            enricher.enrich(&request),
        );

        for enrichment in [a, b, c, d] {
            assert_eq!(enrichment.signals.abuse_score, 85);
        }
        assert_eq!(reputation.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_detector_is_used() {
        let reputation = StaticReputation::new(vec![report(
            "9.9.9.9",
            0,
            Some("tunnelco.example"),
            &[],
        )]);
        let detector = KeywordDetector::new().with_vpn_keyword("tunnelco");
        let enricher = Enricher::new(exit_list(&[]))
            .with_reputation(reputation)
            .with_detector(Arc::new(detector));

        let signals = enricher.enrich(&EnrichRequest::new("9.9.9.9")).await.signals;
        assert!(signals.vpn_detected);
        assert!(!signals.proxy_detected);
    }

    #[tokio::test]
    async fn test_bad_or_missing_timestamp_leaves_hour_absent() {
        let enricher = Enricher::new(exit_list(&[]));

        let bad = EnrichRequest::new("1.2.3.4").with_timestamp("05/01/2024 03:00");
        assert_eq!(enricher.enrich(&bad).await.signals.hour_of_day, None);

        let missing = EnrichRequest::new("1.2.3.4");
        assert_eq!(enricher.enrich(&missing).await.signals.hour_of_day, None);
    }

    #[tokio::test]
    async fn test_geo_lookup_is_used() {
        let table = GeoTable::from_json(
            r#"{"8.8.8.8": {"geo": {"country": "United States"}, "isp": {"provider": "GOOGLE"}}}"#,
        )
        .unwrap();
        let enricher = Enricher::new(exit_list(&[])).with_geo(Arc::new(table));

        let enrichment = enricher.enrich(&EnrichRequest::new("8.8.8.8")).await;
        assert_eq!(enrichment.geo.flag, "🇺🇸");
        assert_eq!(enrichment.isp.provider, "GOOGLE");
    }

    #[test]
    fn test_request_from_log_entry() {
        let entry = LogEntry::parse_line("2024-05-01 03:13:00 SCAN sweep to 10.0.0.5:445").unwrap();
        let request = EnrichRequest::from(&entry);

        assert_eq!(request.ip, "10.0.0.5");
        assert_eq!(request.port, Some(445));
        assert_eq!(request.incident_type.as_deref(), Some("SCAN"));
        assert!(!request.guard_match);
    }
}
