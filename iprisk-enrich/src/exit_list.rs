//! Tor exit list provider
//!
//! Owns the current exit relay set and refreshes it according to an explicit
//! [`RefreshPolicy`]. A refresh first tries the file cache (when configured),
//! then the source. A failed fetch keeps whatever set was loaded before and
//! waits for the next interval before trying again.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use iprisk_intel::{read_cache, write_cache, DEFAULT_CACHE_TTL};

use crate::ExitListSource;

/// When and where the exit list is refreshed
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    /// Maximum age of the in-memory set and of the file cache
    pub interval: Duration,
    /// Optional newline separated cache file
    pub cache_file: Option<PathBuf>,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_CACHE_TTL,
            cache_file: None,
        }
    }
}

impl RefreshPolicy {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = Some(path.into());
        self
    }
}

#[derive(Debug, Default)]
struct ExitListState {
    ips: Arc<HashSet<String>>,
    last_fetch: Option<Instant>,
}

/// Shared, lazily refreshed Tor exit set
pub struct ExitListProvider {
    source: Arc<dyn ExitListSource>,
    policy: RefreshPolicy,
    state: RwLock<ExitListState>,
    /// Serializes refreshes so concurrent lookups trigger one fetch
    refresh_gate: tokio::sync::Mutex<()>,
}

impl ExitListProvider {
    pub fn new(source: Arc<dyn ExitListSource>, policy: RefreshPolicy) -> Self {
        Self {
            source,
            policy,
            state: RwLock::new(ExitListState::default()),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Provider preloaded with a fixed set; it is only refreshed once stale
    pub fn with_ips(
        source: Arc<dyn ExitListSource>,
        policy: RefreshPolicy,
        ips: HashSet<String>,
    ) -> Self {
        let provider = Self::new(source, policy);
        *provider.state.write() = ExitListState {
            ips: Arc::new(ips),
            last_fetch: Some(Instant::now()),
        };
        provider
    }

    pub fn is_stale(&self) -> bool {
        match self.state.read().last_fetch {
            Some(at) => at.elapsed() >= self.policy.interval,
            None => true,
        }
    }

    /// Current set without triggering a refresh
    pub fn snapshot(&self) -> Arc<HashSet<String>> {
        Arc::clone(&self.state.read().ips)
    }

    /// Membership check, refreshing first when the set is stale
    pub async fn contains(&self, ip: &str) -> bool {
        if self.is_stale() {
            self.refresh_if_stale().await;
        }
        self.state.read().ips.contains(ip)
    }

    /// Load from cache or source if the set is stale; returns the set size
    pub async fn refresh_if_stale(&self) -> usize {
        let _gate = self.refresh_gate.lock().await;
        if !self.is_stale() {
            return self.state.read().ips.len();
        }

        if let Some(path) = &self.policy.cache_file {
            if let Some(ips) = read_cache(path, self.policy.interval).await {
                debug!("Loaded {} exit IPs from cache {}", ips.len(), path.display());
                return self.store(ips);
            }
        }

        self.fetch_locked().await
    }

    /// Fetch from the source regardless of age or cache; returns the set size
    pub async fn refresh(&self) -> usize {
        let _gate = self.refresh_gate.lock().await;
        self.fetch_locked().await
    }

    async fn fetch_locked(&self) -> usize {
        match self.source.fetch().await {
            Ok(ips) => {
                info!("Fetched {} Tor exit IPs", ips.len());
                if let Some(path) = &self.policy.cache_file {
                    if let Err(e) = write_cache(path, &ips).await {
                        warn!("Cache write error for {}: {}", path.display(), e);
                    }
                }
                self.store(ips)
            }
            Err(e) => {
                warn!("Error fetching Tor exit IPs, keeping previous list: {}", e);
                let mut state = self.state.write();
                state.last_fetch = Some(Instant::now());
                state.ips.len()
            }
        }
    }

    fn store(&self, ips: HashSet<String>) -> usize {
        let count = ips.len();
        *self.state.write() = ExitListState {
            ips: Arc::new(ips),
            last_fetch: Some(Instant::now()),
        };
        count
    }
}
