//! Tor exit relay list
//!
//! Fetches exit relays from Onionoo and keeps their IPv4 addresses. The list
//! can be cached in a newline separated file that stays fresh for a TTL.

use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use crate::IntelError;
use iprisk_core::ip_version;

/// Onionoo query for relays carrying the Exit flag
pub const ONIONOO_EXIT_URL: &str = "https://onionoo.torproject.org/details?flag=Exit";

/// Default lifetime of the file cache
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
struct OnionooDetails {
    #[serde(default)]
    relays: Vec<OnionooRelay>,
}

#[derive(Debug, Deserialize)]
struct OnionooRelay {
    #[serde(default)]
    or_addresses: Vec<String>,
}

/// Fetch the current exit relay IPv4 addresses
pub async fn fetch_exit_ips(client: &Client, url: &str) -> Result<HashSet<String>, IntelError> {
    debug!("Fetching Tor exit list from {}", url);

    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(IntelError::Status {
            source_name: "onionoo",
            status: response.status().as_u16(),
        });
    }

    let body = response.text().await?;
    let ips = parse_onionoo(&body)?;

    debug!("Onionoo returned {} exit addresses", ips.len());
    Ok(ips)
}

/// Extract IPv4 exit addresses from an Onionoo details document
pub fn parse_onionoo(body: &str) -> Result<HashSet<String>, IntelError> {
    let details: OnionooDetails = serde_json::from_str(body)?;

    Ok(details
        .relays
        .iter()
        .flat_map(|relay| relay.or_addresses.iter())
        .filter_map(|addr| addr.split(':').next())
        .filter(|host| ip_version(host) == Some(4))
        .map(str::to_string)
        .collect())
}

/// Read the cache if it exists and is younger than `ttl`
pub async fn read_cache(path: &Path, ttl: Duration) -> Option<HashSet<String>> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    let age = metadata
        .modified()
        .ok()
        .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
        .unwrap_or_default();

    if age >= ttl {
        debug!("Exit list cache {} is stale", path.display());
        return None;
    }

    match tokio::fs::read_to_string(path).await {
        Ok(text) => Some(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        Err(e) => {
            warn!("Cache read error for {}: {}", path.display(), e);
            None
        }
    }
}

/// Write the exit list, one IP per line
pub async fn write_cache(path: &Path, ips: &HashSet<String>) -> Result<(), IntelError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut sorted: Vec<&String> = ips.iter().collect();
    sorted.sort();
    let body: String = sorted.iter().map(|ip| format!("{}\n", ip)).collect();

    tokio::fs::write(path, body).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAILS: &str = r#"{
        "version": "8.0",
        "relays": [
            {"nickname": "exit1", "or_addresses": ["185.220.101.4:443", "[2a0b:f4c2::4]:443"]},
            {"nickname": "exit2", "or_addresses": ["45.66.35.10:9001"]},
            {"nickname": "noaddr"}
        ]
    }"#;

    fn temp_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("iprisk-exit-{}.txt", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_parse_onionoo_keeps_ipv4_only() {
        let ips = parse_onionoo(DETAILS).unwrap();
        assert_eq!(ips.len(), 2);
        assert!(ips.contains("185.220.101.4"));
        assert!(ips.contains("45.66.35.10"));
    }

    #[test]
    fn test_parse_onionoo_without_relays() {
        assert!(parse_onionoo("{}").unwrap().is_empty());
        assert!(parse_onionoo("not json").is_err());
    }

    #[tokio::test]
    async fn test_cache_round_trip() {
        let path = temp_path();
        let ips: HashSet<String> = ["1.1.1.1", "2.2.2.2"].iter().map(|s| s.to_string()).collect();

        write_cache(&path, &ips).await.unwrap();
        let cached = read_cache(&path, DEFAULT_CACHE_TTL).await.unwrap();
        assert_eq!(cached, ips);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_stale_or_missing_cache() {
        let path = temp_path();
        assert!(read_cache(&path, DEFAULT_CACHE_TTL).await.is_none());

        write_cache(&path, &HashSet::from(["1.1.1.1".to_string()])).await.unwrap();
        assert!(read_cache(&path, Duration::ZERO).await.is_none());

        let _ = tokio::fs::remove_file(&path).await;
    }
}
