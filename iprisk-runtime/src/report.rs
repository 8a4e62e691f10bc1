//! Forensic report shapes and persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use iprisk_core::{Confidence, RiskAssessment, RiskLevel};
use iprisk_enrich::{EnrichRequest, Enrichment};
use iprisk_intel::{GeoRecord, IspRecord};

/// Default location of the batch report
pub const DEFAULT_REPORT_PATH: &str = "reports/forensic_report.json";

/// Attached to every per-IP result
pub const REPORT_NOTES: &str =
    "Risk computed using threat enrichment and AbuseIPDB (ML is disabled).";

/// Factor value shown for each anonymizer classification
const ANONYMIZER_FACTOR: u32 = 80;
const BLOCKLIST_FACTOR: u32 = 40;
const GEOLOCATION_FACTOR: u32 = 20;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "TOR")]
    pub tor: bool,
    #[serde(rename = "VPN")]
    pub vpn: bool,
    #[serde(rename = "Proxy")]
    pub proxy: bool,
}

/// One bar of the factor chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorScore {
    pub label: String,
    pub value: u32,
}

impl FactorScore {
    fn new(label: &str, value: u32) -> Self {
        Self {
            label: label.to_string(),
            value,
        }
    }
}

/// One-hot encoding of the risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskDistribution {
    #[serde(rename = "Low")]
    pub low: u8,
    #[serde(rename = "Medium")]
    pub medium: u8,
    #[serde(rename = "High")]
    pub high: u8,
}

impl From<RiskLevel> for RiskDistribution {
    fn from(level: RiskLevel) -> Self {
        Self {
            low: u8::from(level == RiskLevel::Low),
            medium: u8::from(level == RiskLevel::Medium),
            high: u8::from(level == RiskLevel::High),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportScores {
    pub abuse_score: f64,
    pub risk_engine_score: f64,
}

/// Analysis result for one IP observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpReport {
    pub ip: String,
    pub port: Option<u16>,
    pub timestamp: Option<String>,
    pub incident_type: Option<String>,
    pub risk_level: RiskLevel,
    pub confidence: Confidence,
    pub classification: Classification,
    pub geolocation: GeoRecord,
    pub isp: IspRecord,
    pub factor_scores: Vec<FactorScore>,
    pub risk_distribution: RiskDistribution,
    pub notes: String,
    pub risk_explanation: Vec<String>,
    pub scores: ReportScores,
}

impl IpReport {
    pub fn new(request: &EnrichRequest, enrichment: &Enrichment, assessment: &RiskAssessment) -> Self {
        let signals = &enrichment.signals;
        let flag = |on: bool, value: u32| if on { value } else { 0 };

        let factor_scores = vec![
            FactorScore::new("AbuseIPDB Score", u32::from(signals.abuse_score)),
            FactorScore::new("TOR", flag(signals.tor_exit, ANONYMIZER_FACTOR)),
            FactorScore::new("VPN", flag(signals.vpn_detected, ANONYMIZER_FACTOR)),
            FactorScore::new("Proxy", flag(signals.proxy_detected, ANONYMIZER_FACTOR)),
            FactorScore::new("Blocklists", flag(signals.blocklist_hit, BLOCKLIST_FACTOR)),
            FactorScore::new(
                "Geolocation",
                flag(enrichment.geo.is_known(), GEOLOCATION_FACTOR),
            ),
            FactorScore::new("Port Activity", signals.port_activity.round() as u32),
            FactorScore::new("History", signals.history_score.round() as u32),
        ];

        Self {
            ip: request.ip.clone(),
            port: request.port,
            timestamp: request.timestamp.clone(),
            incident_type: request.incident_type.clone(),
            risk_level: assessment.level,
            confidence: assessment.confidence,
            classification: Classification {
                tor: signals.tor_exit,
                vpn: signals.vpn_detected,
                proxy: signals.proxy_detected,
            },
            geolocation: enrichment.geo.clone(),
            isp: enrichment.isp.clone(),
            factor_scores,
            risk_distribution: assessment.level.into(),
            notes: REPORT_NOTES.to_string(),
            risk_explanation: assessment.factors.clone(),
            scores: ReportScores {
                abuse_score: f64::from(signals.abuse_score),
                risk_engine_score: assessment.score,
            },
        }
    }
}

/// Results of one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub results: Vec<IpReport>,
}

impl BatchReport {
    pub fn new(results: Vec<IpReport>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            results,
        }
    }

    pub fn count(&self, level: RiskLevel) -> usize {
        self.results.iter().filter(|r| r.risk_level == level).count()
    }
}

/// Write any report as pretty JSON, creating parent directories
pub async fn save_report<T: Serialize>(path: &Path, report: &T) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json).await?;

    info!("Report saved to {}", path.display());
    Ok(())
}
