//! AbuseIPDB reputation checks

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::IntelError;

/// AbuseIPDB v2 check endpoint
pub const ABUSEIPDB_CHECK_URL: &str = "https://api.abuseipdb.com/api/v2/check";

/// Only reports newer than this many days are considered
pub const DEFAULT_MAX_AGE_DAYS: u32 = 90;

/// Reputation data for one IP as reported by AbuseIPDB
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AbuseReport {
    #[serde(rename = "ipAddress")]
    pub ip: String,
    pub is_whitelisted: Option<bool>,
    /// 0-100 confidence that the IP is abusive
    #[serde(deserialize_with = "null_as_default")]
    pub abuse_confidence_score: u8,
    pub country_code: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub total_reports: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub hostnames: Vec<String>,
    pub usage_type: Option<String>,
    pub isp: Option<String>,
    pub domain: Option<String>,
    pub last_reported_at: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub categories: Vec<u32>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// AbuseIPDB API client
#[derive(Debug, Clone)]
pub struct AbuseIpDbClient {
    client: Client,
    api_key: String,
    base_url: String,
    max_age_days: u32,
}

impl AbuseIpDbClient {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: ABUSEIPDB_CHECK_URL.to_string(),
            max_age_days: DEFAULT_MAX_AGE_DAYS,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    pub fn with_max_age_days(mut self, days: u32) -> Self {
        self.max_age_days = days;
        self
    }

    /// Look up an IP
    pub async fn check(&self, ip: &str) -> Result<AbuseReport, IntelError> {
        debug!("Checking {} against AbuseIPDB", ip);

        let max_age = self.max_age_days.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("ipAddress", ip), ("maxAgeInDays", max_age.as_str())])
            .header("Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // Error responses still carry a JSON "errors" object worth surfacing
        match parse_check_response(&body) {
            Err(IntelError::Parse(_)) if !status.is_success() => Err(IntelError::Status {
                source_name: "abuseipdb",
                status: status.as_u16(),
            }),
            other => other,
        }
    }
}

/// Parse a check response body; a body without `data` is an API error
pub fn parse_check_response(body: &str) -> Result<AbuseReport, IntelError> {
    let mut value: serde_json::Value = serde_json::from_str(body)?;

    match value.get_mut("data").map(serde_json::Value::take) {
        Some(data) => Ok(serde_json::from_value(data)?),
        None => {
            let errors = value
                .get_mut("errors")
                .map(serde_json::Value::take)
                .unwrap_or(value);
            Err(IntelError::Api(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_response() {
        let body = r#"{"data": {
            "ipAddress": "185.220.101.1",
            "isPublic": true,
            "isWhitelisted": false,
            "abuseConfidenceScore": 100,
            "countryCode": "DE",
            "usageType": "Reserved",
            "isp": "Zwiebelfreunde e.V.",
            "domain": "torproject.org",
            "hostnames": ["tor-exit-1.zbau.f3netze.de"],
            "totalReports": 4821,
            "lastReportedAt": "2024-05-01T10:00:00+00:00"
        }}"#;

        let report = parse_check_response(body).unwrap();
        assert_eq!(report.ip, "185.220.101.1");
        assert_eq!(report.abuse_confidence_score, 100);
        assert_eq!(report.is_whitelisted, Some(false));
        assert_eq!(report.domain.as_deref(), Some("torproject.org"));
        assert_eq!(report.hostnames.len(), 1);
        assert_eq!(report.total_reports, 4821);
        assert!(report.categories.is_empty());
    }

    #[test]
    fn test_null_fields_fall_back() {
        let body = r#"{"data": {"ipAddress": "10.0.0.1", "abuseConfidenceScore": null, "hostnames": null}}"#;
        let report = parse_check_response(body).unwrap();
        assert_eq!(report.abuse_confidence_score, 0);
        assert!(report.hostnames.is_empty());
        assert_eq!(report.domain, None);
    }

    #[test]
    fn test_error_object() {
        let body = r#"{"errors": [{"detail": "Authentication failed.", "status": 401}]}"#;
        match parse_check_response(body) {
            Err(IntelError::Api(errors)) => {
                assert_eq!(errors[0]["status"], 401);
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_body_without_data_or_errors() {
        match parse_check_response(r#"{"message": "nope"}"#) {
            Err(IntelError::Api(value)) => assert_eq!(value["message"], "nope"),
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = AbuseReport {
            ip: "1.2.3.4".to_string(),
            abuse_confidence_score: 12,
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ipAddress"], "1.2.3.4");
        assert_eq!(json["abuseConfidenceScore"], 12);
    }
}
