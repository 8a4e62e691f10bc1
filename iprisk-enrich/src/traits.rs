//! Collaborator capabilities used during enrichment

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use thiserror::Error;

use iprisk_intel::{
    fetch_exit_ips, AbuseIpDbClient, AbuseReport, GeoRecord, GeoTable, IntelError, IspRecord,
    ONIONOO_EXIT_URL,
};

/// Errors from enrichment collaborators
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Intel source error: {0}")]
    Intel(#[from] IntelError),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

/// External reputation for an IP
#[async_trait]
pub trait ReputationSource: Send + Sync {
    async fn check(&self, ip: &str) -> Result<AbuseReport, EnrichError>;
}

/// Current set of Tor exit relay addresses
#[async_trait]
pub trait ExitListSource: Send + Sync {
    async fn fetch(&self) -> Result<HashSet<String>, EnrichError>;
}

/// Location and operator of an IP; never fails, unknown IPs get defaults
pub trait GeoLookup: Send + Sync {
    fn lookup(&self, ip: &str) -> (GeoRecord, IspRecord);
}

#[async_trait]
impl ReputationSource for AbuseIpDbClient {
    async fn check(&self, ip: &str) -> Result<AbuseReport, EnrichError> {
        Ok(AbuseIpDbClient::check(self, ip).await?)
    }
}

impl GeoLookup for GeoTable {
    fn lookup(&self, ip: &str) -> (GeoRecord, IspRecord) {
        GeoTable::lookup(self, ip)
    }
}

/// Exit list fetched from Onionoo
#[derive(Debug, Clone)]
pub struct OnionooSource {
    client: Client,
    url: String,
}

impl OnionooSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            url: ONIONOO_EXIT_URL.to_string(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }
}

#[async_trait]
impl ExitListSource for OnionooSource {
    async fn fetch(&self) -> Result<HashSet<String>, EnrichError> {
        Ok(fetch_exit_ips(&self.client, &self.url).await?)
    }
}
