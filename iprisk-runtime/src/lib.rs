//! iprisk Runtime
//!
//! Drives enrichment and scoring over many log entries with bounded
//! concurrency, and shapes the results into persisted forensic reports.

pub mod batch;
pub mod report;

pub use batch::*;
pub use report::*;
