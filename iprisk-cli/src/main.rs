//! iprisk CLI
//!
//! IP risk scoring from threat intelligence, plus temporal correlation of
//! security logs with relay observations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use iprisk_core::{
    correlate, extract_log_entries, score, score_verbose, RiskLevel, SignalSet, TimestampedEvent,
};
use iprisk_enrich::{EnrichRequest, Enricher, ExitListProvider, OnionooSource, Settings};
use iprisk_intel::{create_client, AbuseIpDbClient, GeoTable, IntelConfig};
use iprisk_runtime::{save_report, BatchDriver};

#[derive(Parser)]
#[command(name = "iprisk")]
#[command(author, version, about = "iprisk: IP risk scoring and event correlation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,

    /// Settings file (TOML)
    #[arg(short, long, env = "IPRISK_CONFIG")]
    config: Option<PathBuf>,

    /// AbuseIPDB API key (overrides settings and ABUSEIPDB_API_KEY)
    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich and score a single IP
    Analyze {
        #[arg(long)]
        ip: String,

        /// Destination port of the observed activity
        #[arg(long)]
        port: Option<u16>,

        /// Event time (YYYY-MM-DD HH:MM:SS)
        #[arg(long)]
        timestamp: Option<String>,

        /// The IP already matched a Tor guard relay
        #[arg(long)]
        guard_match: bool,
    },

    /// Extract incidents from a log file and analyze each one
    Batch {
        #[arg(short, long)]
        log: PathBuf,

        /// Report path (default: from settings)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Entries analyzed at once (default: from settings)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Print the incidents found in a log file
    Extract {
        #[arg(short, long)]
        log: PathBuf,
    },

    /// Score signal sets from a JSON file without any network access
    Score {
        /// JSON object or array of signal sets
        #[arg(short, long)]
        signals: PathBuf,

        /// Include per-term contributions and the signal count
        #[arg(long)]
        verbose: bool,
    },

    /// Correlate log events with node events by IP and time
    Correlate {
        /// JSON array of log events
        #[arg(long)]
        logs: PathBuf,

        /// JSON array of node events
        #[arg(long)]
        nodes: PathBuf,

        /// Window in seconds (default: from settings)
        #[arg(short, long)]
        window: Option<u64>,
    },

    /// Show the Tor exit list
    TorExits {
        /// Fetch from Onionoo even if the cache is fresh
        #[arg(long)]
        refresh: bool,

        /// Check whether this IP is an exit
        #[arg(long)]
        check: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SignalInput {
    Many(Vec<SignalSet>),
    One(SignalSet),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging; stdout is reserved for results
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut settings = Settings::load_or_default(cli.config.as_deref())?;
    if let Some(key) = &cli.api_key {
        settings = settings.with_api_key(key);
    }

    match cli.command {
        Commands::Analyze {
            ip,
            port,
            timestamp,
            guard_match,
        } => {
            let mut request = EnrichRequest::new(&ip).with_guard_match(guard_match);
            if let Some(port) = port {
                request = request.with_port(port);
            }
            if let Some(ts) = &timestamp {
                request = request.with_timestamp(ts);
            }

            let enricher = build_enricher(&settings, http_client(&settings)?).await?;
            let driver = BatchDriver::new(enricher);
            let report = driver.analyze(&request).await;
            print_json(&report)?;
        }
        Commands::Batch {
            log,
            output,
            concurrency,
        } => {
            run_batch(settings, &log, output, concurrency).await?;
        }
        Commands::Extract { log } => {
            let entries = extract_log_entries(&read_text(&log)?);
            print_json(&entries)?;
        }
        Commands::Score { signals, verbose } => {
            let input: SignalInput = serde_json::from_str(&read_text(&signals)?)
                .with_context(|| format!("Invalid signal set in {}", signals.display()))?;
            let assess = if verbose { score_verbose } else { score };

            match input {
                SignalInput::One(set) => print_json(&assess(&set))?,
                SignalInput::Many(sets) => {
                    print_json(&sets.iter().map(assess).collect::<Vec<_>>())?
                }
            }
        }
        Commands::Correlate {
            logs,
            nodes,
            window,
        } => {
            let logs: Vec<TimestampedEvent> = serde_json::from_str(&read_text(&logs)?)
                .with_context(|| format!("Invalid log events in {}", logs.display()))?;
            let nodes: Vec<TimestampedEvent> = serde_json::from_str(&read_text(&nodes)?)
                .with_context(|| format!("Invalid node events in {}", nodes.display()))?;
            let window = window.unwrap_or(settings.correlation_window_secs);

            let pairs = correlate(&logs, &nodes, window)?;
            info!("{} correlated pairs within {}s", pairs.len(), window);
            print_json(&pairs)?;
        }
        Commands::TorExits { refresh, check } => {
            show_tor_exits(&settings, refresh, check).await?;
        }
    }

    Ok(())
}

async fn run_batch(
    settings: Settings,
    log: &Path,
    output: Option<PathBuf>,
    concurrency: Option<usize>,
) -> Result<()> {
    let entries = extract_log_entries(&read_text(log)?);
    if entries.is_empty() {
        warn!("No incidents found in {}", log.display());
    }

    let settings = match concurrency {
        Some(n) => settings.with_concurrency(n),
        None => settings,
    };
    let enricher = build_enricher(&settings, http_client(&settings)?).await?;
    let driver = BatchDriver::new(enricher).with_concurrency(settings.concurrency);

    let report = driver.run_entries(&entries).await;
    let output_path = output.unwrap_or_else(|| settings.report_path.clone());
    save_report(&output_path, &report).await?;

    eprintln!("✅ Analyzed {} incidents (run {})", report.results.len(), report.run_id);
    eprintln!(
        "   High: {} | Medium: {} | Low: {}",
        report.count(RiskLevel::High),
        report.count(RiskLevel::Medium),
        report.count(RiskLevel::Low)
    );
    eprintln!("📄 Report saved to: {}", output_path.display());

    Ok(())
}

async fn show_tor_exits(settings: &Settings, refresh: bool, check: Option<String>) -> Result<()> {
    let provider = exit_list_provider(settings, http_client(settings)?);
    let count = if refresh {
        provider.refresh().await
    } else {
        provider.refresh_if_stale().await
    };

    eprintln!("🧅 {} Tor exit IPs known", count);

    match check {
        Some(ip) => {
            let listed = provider.contains(&ip).await;
            print_json(&serde_json::json!({ "ip": ip, "tor_exit": listed }))?;
        }
        None => {
            let mut ips: Vec<String> = provider.snapshot().iter().cloned().collect();
            ips.sort();
            for ip in ips {
                println!("{}", ip);
            }
        }
    }

    Ok(())
}

/// One HTTP client per run, shared by every remote source
fn http_client(settings: &Settings) -> Result<Client> {
    let config = IntelConfig::default().with_timeout(settings.http_timeout_secs);
    Ok(create_client(&config)?)
}

fn exit_list_provider(settings: &Settings, client: Client) -> ExitListProvider {
    let source = OnionooSource::new(client).with_url(&settings.tor.onionoo_url);
    ExitListProvider::new(Arc::new(source), settings.refresh_policy())
}

async fn build_enricher(settings: &Settings, client: Client) -> Result<Arc<Enricher>> {
    let exit_list = exit_list_provider(settings, client.clone());
    let mut enricher =
        Enricher::new(Arc::new(exit_list)).with_detector(Arc::new(settings.detector()));

    match &settings.abuseipdb.api_key {
        Some(key) => {
            let abuse = AbuseIpDbClient::new(client, key.as_str())
                .with_base_url(&settings.abuseipdb.url)
                .with_max_age_days(settings.abuseipdb.max_age_days);
            enricher = enricher.with_reputation(Arc::new(abuse));
        }
        None => warn!("No AbuseIPDB API key configured; abuse scores default to 0"),
    }

    if let Some(path) = &settings.geoip_table {
        let table = GeoTable::load(path)
            .await
            .with_context(|| format!("Failed to load GeoIP table {}", path.display()))?;
        enricher = enricher.with_geo(Arc::new(table));
    }

    Ok(Arc::new(enricher))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enricher_builds_from_one_client() {
        let settings = Settings::from_toml(
            r#"
            [abuseipdb]
            api_key = "test-key"
            url = "http://127.0.0.1:9/check"

            [tor]
            onionoo_url = "http://127.0.0.1:9/details"
            "#,
        )
        .unwrap();
        let client = http_client(&settings).unwrap();

        let enricher = build_enricher(&settings, client).await.unwrap();
        let request = EnrichRequest::new("10.0.0.1").with_port(3389);
        let enrichment = enricher.enrich(&request).await;

        // Both remote sources are unreachable, so everything degrades to neutral
        assert!(enrichment.abuse.is_none());
        assert!(!enrichment.signals.tor_exit);
        assert_eq!(enrichment.signals.port_activity, 80.0);
    }

    #[tokio::test]
    async fn test_missing_geoip_table_is_an_error() {
        let mut settings = Settings::from_toml("").unwrap();
        settings.geoip_table = Some(PathBuf::from("/nonexistent/iprisk/geoip.json"));

        let client = http_client(&settings).unwrap();
        assert!(build_enricher(&settings, client).await.is_err());
    }
}
