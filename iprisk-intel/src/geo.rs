//! GeoIP and ISP lookups
//!
//! Records come from a JSON table keyed by IP:
//!
//! ```json
//! { "8.8.8.8": { "geo": { "country": "United States", "city": "Mountain View",
//!                         "lat": 37.4, "lon": -122.1 },
//!                "isp": { "provider": "GOOGLE", "asn": "15169" } } }
//! ```
//!
//! Unknown IPs and missing fields fall back to "Unknown" records.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::IntelError;
use iprisk_core::normalize_ip;

/// Location of an IP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoRecord {
    pub country: String,
    pub city: String,
    pub lat: f64,
    pub lon: f64,
    /// Emoji flag, empty when unknown
    pub flag: String,
}

impl Default for GeoRecord {
    fn default() -> Self {
        Self {
            country: "Unknown".to_string(),
            city: "Unknown".to_string(),
            lat: 0.0,
            lon: 0.0,
            flag: String::new(),
        }
    }
}

impl GeoRecord {
    pub fn is_known(&self) -> bool {
        self.country != "Unknown"
    }
}

/// Network operator of an IP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IspRecord {
    pub provider: String,
    pub asn: String,
}

impl Default for IspRecord {
    fn default() -> Self {
        Self {
            provider: "Unknown ISP".to_string(),
            asn: "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct GeoEntry {
    geo: GeoRecord,
    isp: IspRecord,
}

/// Emoji flag for a country name
pub fn country_flag(country: &str) -> &'static str {
    match country {
        "India" => "🇮🇳",
        "United States" => "🇺🇸",
        "United Kingdom" => "🇬🇧",
        _ => "",
    }
}

/// In-memory GeoIP table
#[derive(Debug, Clone, Default)]
pub struct GeoTable {
    entries: HashMap<String, GeoEntry>,
}

impl GeoTable {
    /// Table with no entries; every lookup yields the defaults
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self, IntelError> {
        let raw: HashMap<String, GeoEntry> = serde_json::from_str(text)?;
        let entries = raw
            .into_iter()
            .map(|(ip, entry)| (normalize_ip(&ip), entry))
            .collect();
        Ok(Self { entries })
    }

    pub async fn load(path: &Path) -> Result<Self, IntelError> {
        let text = tokio::fs::read_to_string(path).await?;
        let table = Self::from_json(&text)?;
        debug!("Loaded {} GeoIP entries from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, ip: &str) -> (GeoRecord, IspRecord) {
        match self.entries.get(&normalize_ip(ip)) {
            Some(entry) => {
                let mut geo = entry.geo.clone();
                if geo.flag.is_empty() {
                    geo.flag = country_flag(&geo.country).to_string();
                }
                (geo, entry.isp.clone())
            }
            None => (GeoRecord::default(), IspRecord::default()),
        }
    }
}
