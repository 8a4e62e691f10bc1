//! Signal derivations from raw enrichment data
//!
//! Small pure rules that turn reputation and log fields into the boolean and
//! magnitude inputs of a [`crate::SignalSet`].

use crate::BLOCKLIST_THRESHOLD;

/// Ports whose exposure is treated as risky
pub const RISKY_PORTS: [u16; 4] = [23, 3389, 445, 21];

/// Port activity magnitude assigned to a risky port
pub const RISKY_PORT_ACTIVITY: f64 = 80.0;

/// VPN and proxy indicators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnonymizerFlags {
    pub vpn: bool,
    pub proxy: bool,
}

/// Detects anonymizing infrastructure from reverse-DNS style names
pub trait AnonymizerDetector: Send + Sync {
    fn detect(&self, domain: Option<&str>, hostnames: &[String]) -> AnonymizerFlags;
}

/// Case-insensitive keyword match over the domain and every hostname
#[derive(Debug, Clone)]
pub struct KeywordDetector {
    vpn_keywords: Vec<String>,
    proxy_keywords: Vec<String>,
}

impl Default for KeywordDetector {
    fn default() -> Self {
        Self {
            vpn_keywords: vec!["vpn".to_string()],
            proxy_keywords: vec!["proxy".to_string()],
        }
    }
}

impl KeywordDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vpn_keyword(mut self, keyword: &str) -> Self {
        self.vpn_keywords.push(keyword.to_lowercase());
        self
    }

    pub fn with_proxy_keyword(mut self, keyword: &str) -> Self {
        self.proxy_keywords.push(keyword.to_lowercase());
        self
    }

    fn matches(keywords: &[String], names: &[String]) -> bool {
        names
            .iter()
            .any(|name| keywords.iter().any(|k| name.contains(k.as_str())))
    }
}

impl AnonymizerDetector for KeywordDetector {
    fn detect(&self, domain: Option<&str>, hostnames: &[String]) -> AnonymizerFlags {
        let names: Vec<String> = domain
            .into_iter()
            .chain(hostnames.iter().map(String::as_str))
            .map(str::to_lowercase)
            .collect();

        AnonymizerFlags {
            vpn: Self::matches(&self.vpn_keywords, &names),
            proxy: Self::matches(&self.proxy_keywords, &names),
        }
    }
}

/// Abuse scores at or above the blocklist threshold count as listed
pub fn blocklist_hit(abuse_score: u8) -> bool {
    abuse_score >= BLOCKLIST_THRESHOLD
}

/// Port activity magnitude for an observed destination port
pub fn port_activity(port: Option<u16>) -> f64 {
    match port {
        Some(p) if RISKY_PORTS.contains(&p) => RISKY_PORT_ACTIVITY,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_keyword_detector_domain() {
        let detector = KeywordDetector::new();
        let flags = detector.detect(Some("FastVPN.example"), &[]);
        assert_eq!(flags, AnonymizerFlags { vpn: true, proxy: false });
    }

    #[test]
    fn test_keyword_detector_hostnames() {
        let detector = KeywordDetector::new();
        let flags = detector.detect(
            Some("example.net"),
            &names(&["node1.example.net", "open-PROXY-7.example.net"]),
        );
        assert_eq!(flags, AnonymizerFlags { vpn: false, proxy: true });
    }

    #[test]
    fn test_keyword_detector_nothing_found() {
        let detector = KeywordDetector::new();
        assert_eq!(detector.detect(None, &[]), AnonymizerFlags::default());
        assert_eq!(
            detector.detect(Some("comcast.net"), &names(&["c-1-2-3-4.hsd1.comcast.net"])),
            AnonymizerFlags::default()
        );
    }

    #[test]
    fn test_keyword_detector_extra_keywords() {
        let detector = KeywordDetector::new()
            .with_vpn_keyword("WireGuard")
            .with_proxy_keyword("socks");

        let flags = detector.detect(None, &names(&["wireguard-exit.host", "socks5.host"]));
        assert!(flags.vpn);
        assert!(flags.proxy);
    }

    #[test]
    fn test_blocklist_threshold() {
        assert!(!blocklist_hit(0));
        assert!(!blocklist_hit(69));
        assert!(blocklist_hit(70));
        assert!(blocklist_hit(100));
    }

    #[test]
    fn test_port_activity() {
        for port in RISKY_PORTS {
            assert_eq!(port_activity(Some(port)), 80.0);
        }
        for port in [80, 443, 53, 8080] {
            assert_eq!(port_activity(Some(port)), 0.0);
        }
        assert_eq!(port_activity(None), 0.0);
    }
}
