//! Runtime settings
//!
//! Loaded from an optional TOML file. Secrets fall back to the environment
//! when the file leaves them out.
//!
//! ```toml
//! concurrency = 8
//! geoip_table = "data/geoip.json"
//!
//! [abuseipdb]
//! max_age_days = 30
//!
//! [tor]
//! cache_file = "cache/tor_exits.txt"
//! refresh_secs = 1800
//!
//! [heuristics]
//! vpn_keywords = ["tunnel", "wireguard"]
//! proxy_keywords = ["socks"]
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use iprisk_core::{KeywordDetector, DEFAULT_CORRELATION_WINDOW_SECS};
use iprisk_intel::{ABUSEIPDB_CHECK_URL, DEFAULT_MAX_AGE_DAYS, ONIONOO_EXIT_URL};

use crate::RefreshPolicy;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Top-level settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub abuseipdb: AbuseIpDbSettings,
    #[serde(default)]
    pub tor: TorSettings,
    #[serde(default)]
    pub heuristics: HeuristicSettings,
    /// JSON GeoIP table; lookups return "Unknown" records without one
    #[serde(default)]
    pub geoip_table: Option<PathBuf>,
    #[serde(default = "default_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Maximum entries enriched at once in batch mode
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_window_secs")]
    pub correlation_window_secs: u64,
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbuseIpDbSettings {
    /// Falls back to ABUSEIPDB_API_KEY
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_abuse_url")]
    pub url: String,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TorSettings {
    #[serde(default = "default_onionoo_url")]
    pub onionoo_url: String,
    #[serde(default)]
    pub cache_file: Option<PathBuf>,
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
}

/// Extra reverse DNS keywords, on top of "vpn" and "proxy"
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeuristicSettings {
    #[serde(default)]
    pub vpn_keywords: Vec<String>,
    #[serde(default)]
    pub proxy_keywords: Vec<String>,
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_concurrency() -> usize {
    4
}

fn default_window_secs() -> u64 {
    DEFAULT_CORRELATION_WINDOW_SECS
}

fn default_report_path() -> PathBuf {
    PathBuf::from("reports/forensic_report.json")
}

fn default_abuse_url() -> String {
    ABUSEIPDB_CHECK_URL.to_string()
}

fn default_max_age_days() -> u32 {
    DEFAULT_MAX_AGE_DAYS
}

fn default_onionoo_url() -> String {
    ONIONOO_EXIT_URL.to_string()
}

fn default_refresh_secs() -> u64 {
    3600
}

impl Default for AbuseIpDbSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            url: default_abuse_url(),
            max_age_days: default_max_age_days(),
        }
    }
}

impl Default for TorSettings {
    fn default() -> Self {
        Self {
            onionoo_url: default_onionoo_url(),
            cache_file: None,
            refresh_secs: default_refresh_secs(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            abuseipdb: AbuseIpDbSettings::default(),
            tor: TorSettings::default(),
            heuristics: HeuristicSettings::default(),
            geoip_table: None,
            http_timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            correlation_window_secs: default_window_secs(),
            report_path: default_report_path(),
        }
        .with_env()
    }
}

impl Settings {
    /// Parse TOML, then fill secrets from the environment
    pub fn from_toml(text: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(text)?;
        Ok(settings.with_env())
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    fn with_env(mut self) -> Self {
        if self.abuseipdb.api_key.is_none() {
            self.abuseipdb.api_key = std::env::var("ABUSEIPDB_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        self
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.abuseipdb.api_key = Some(key.to_string());
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy {
            interval: Duration::from_secs(self.tor.refresh_secs),
            cache_file: self.tor.cache_file.clone(),
        }
    }

    /// Keyword detector with the configured extra keywords
    pub fn detector(&self) -> KeywordDetector {
        let detector = self
            .heuristics
            .vpn_keywords
            .iter()
            .fold(KeywordDetector::new(), |d, k| d.with_vpn_keyword(k));
        self.heuristics
            .proxy_keywords
            .iter()
            .fold(detector, |d, k| d.with_proxy_keyword(k))
    }
}
