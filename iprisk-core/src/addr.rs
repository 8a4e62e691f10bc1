//! IP address helpers

use std::net::IpAddr;

pub fn is_valid_ip(ip: &str) -> bool {
    ip.parse::<IpAddr>().is_ok()
}

/// 4 or 6, `None` when the input is not an address
pub fn ip_version(ip: &str) -> Option<u8> {
    match ip.parse::<IpAddr>().ok()? {
        IpAddr::V4(_) => Some(4),
        IpAddr::V6(_) => Some(6),
    }
}

/// Canonical text form: IPv6 fully exploded, IPv4 unchanged, invalid input as-is
pub fn normalize_ip(ip: &str) -> String {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => v4.to_string(),
        Ok(IpAddr::V6(v6)) => v6
            .segments()
            .iter()
            .map(|s| format!("{:04x}", s))
            .collect::<Vec<_>>()
            .join(":"),
        Err(_) => ip.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_and_version() {
        assert!(is_valid_ip("8.8.8.8"));
        assert!(is_valid_ip("::1"));
        assert!(!is_valid_ip("256.1.1.1"));
        assert!(!is_valid_ip("example.com"));

        assert_eq!(ip_version("8.8.8.8"), Some(4));
        assert_eq!(ip_version("2001:db8::1"), Some(6));
        assert_eq!(ip_version("nope"), None);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize_ip("2001:db8::1"),
            "2001:0db8:0000:0000:0000:0000:0000:0001"
        );
        assert_eq!(normalize_ip("10.0.0.1"), "10.0.0.1");
        assert_eq!(normalize_ip("not-an-ip"), "not-an-ip");
    }
}
