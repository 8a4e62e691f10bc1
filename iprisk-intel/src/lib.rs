//! iprisk Intel Layer
//!
//! Network and file backed sources of threat intelligence:
//! - HTTP client construction shared by every remote source
//! - AbuseIPDB reputation checks
//! - Tor exit relay list from Onionoo, with an optional file cache
//! - GeoIP and ISP lookups from a local JSON table

pub mod abuse;
pub mod client;
pub mod geo;
pub mod tor_exits;

pub use abuse::*;
pub use client::*;
pub use geo::*;
pub use tor_exits::*;
