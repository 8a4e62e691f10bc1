//! Batch driver
//!
//! Enriches and scores many observations with at most `concurrency` in
//! flight. Results come back in input order.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

use iprisk_core::{score, LogEntry};
use iprisk_enrich::{EnrichRequest, Enricher};

use crate::{BatchReport, IpReport};

/// Default number of observations analyzed at once
pub const DEFAULT_CONCURRENCY: usize = 4;

pub struct BatchDriver {
    enricher: Arc<Enricher>,
    concurrency: usize,
}

impl BatchDriver {
    pub fn new(enricher: Arc<Enricher>) -> Self {
        Self {
            enricher,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Enrich and score a single observation
    pub async fn analyze(&self, request: &EnrichRequest) -> IpReport {
        analyze_one(&self.enricher, request).await
    }

    /// Analyze every request, preserving input order
    pub async fn run(&self, requests: Vec<EnrichRequest>) -> Vec<IpReport> {
        info!(
            "Analyzing {} entries (concurrency {})",
            requests.len(),
            self.concurrency
        );

        stream::iter(requests)
            .map(|request| {
                let enricher = Arc::clone(&self.enricher);
                async move { analyze_one(&enricher, &request).await }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Analyze extracted log entries into a batch report
    pub async fn run_entries(&self, entries: &[LogEntry]) -> BatchReport {
        let requests = entries.iter().map(EnrichRequest::from).collect();
        BatchReport::new(self.run(requests).await)
    }
}

async fn analyze_one(enricher: &Enricher, request: &EnrichRequest) -> IpReport {
    let enrichment = enricher.enrich(request).await;
    let assessment = score(&enrichment.signals);

    debug!(
        "{} scored {} ({}, confidence {})",
        request.ip, assessment.score, assessment.level, assessment.confidence
    );

    IpReport::new(request, &enrichment, &assessment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use iprisk_core::RiskLevel;
    use iprisk_enrich::{
        EnrichError, ExitListProvider, ExitListSource, RefreshPolicy, ReputationSource,
    };
    use iprisk_intel::AbuseReport;
    use std::collections::HashSet;
    use std::time::Duration;

    /// Scores by last octet; lower octets answer more slowly
    struct OctetReputation;

    #[async_trait]
    impl ReputationSource for OctetReputation {
        async fn check(&self, ip: &str) -> Result<AbuseReport, EnrichError> {
            let octet: u8 = ip
                .rsplit('.')
                .next()
                .and_then(|o| o.parse().ok())
                .ok_or_else(|| EnrichError::Unavailable(ip.to_string()))?;
            tokio::time::sleep(Duration::from_millis(u64::from(100 - octet.min(100)))).await;
            Ok(AbuseReport {
                ip: ip.to_string(),
                abuse_confidence_score: octet.min(100),
                ..Default::default()
            })
        }
    }

    struct FixedExits(Vec<&'static str>);

    #[async_trait]
    impl ExitListSource for FixedExits {
        async fn fetch(&self) -> Result<HashSet<String>, EnrichError> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    fn driver(concurrency: usize) -> BatchDriver {
        let exits = Arc::new(ExitListProvider::new(
            Arc::new(FixedExits(vec!["10.0.0.90"])),
            RefreshPolicy::default(),
        ));
        let enricher = Enricher::new(exits).with_reputation(Arc::new(OctetReputation));
        BatchDriver::new(Arc::new(enricher)).with_concurrency(concurrency)
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let requests: Vec<EnrichRequest> = [5, 90, 30, 60, 10]
            .iter()
            .map(|o| EnrichRequest::new(&format!("10.0.0.{}", o)))
            .collect();

        let reports = driver(3).run(requests).await;
        let ips: Vec<&str> = reports.iter().map(|r| r.ip.as_str()).collect();

        assert_eq!(ips, vec!["10.0.0.5", "10.0.0.90", "10.0.0.30", "10.0.0.60", "10.0.0.10"]);
    }

    #[tokio::test]
    async fn test_scores_flow_into_reports() {
        let reports = driver(2)
            .run(vec![
                EnrichRequest::new("10.0.0.90"),
                EnrichRequest::new("10.0.0.5").with_port(23),
            ])
            .await;

        // abuse 90 + blocklist + tor exit
        assert_eq!(reports[0].risk_level, RiskLevel::High);
        assert!(reports[0].classification.tor);
        assert_eq!(reports[0].scores.abuse_score, 90.0);

        assert_eq!(reports[1].risk_level, RiskLevel::Low);
        assert_eq!(reports[1].factor_scores[6].value, 80);
    }

    #[tokio::test]
    async fn test_run_entries() {
        let entries = iprisk_core::extract_log_entries(
            "2024-05-01 23:10:00 ALERT brute force from 10.0.0.90:3389\n\
             2024-05-01 12:00:00 INFO heartbeat 10.0.0.1\n",
        );
        let report = driver(4).run_entries(&entries).await;

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].incident_type.as_deref(), Some("ALERT"));
        assert_eq!(report.results[0].port, Some(3389));
        assert_eq!(report.count(RiskLevel::High), 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        assert!(driver(1).run(Vec::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_single_analyze() {
        let report = driver(1).analyze(&EnrichRequest::new("10.0.0.1")).await;
        assert_eq!(report.ip, "10.0.0.1");
        assert_eq!(report.risk_distribution.low, 1);
    }
}
