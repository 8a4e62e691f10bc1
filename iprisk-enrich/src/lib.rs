//! iprisk Enrichment
//!
//! Turns an observed IP into a [`iprisk_core::SignalSet`] by composing
//! reputation, Tor exit membership, GeoIP and heuristic detectors.
//! Collaborators sit behind traits so they can be swapped or mocked.

pub mod enricher;
pub mod exit_list;
pub mod settings;
pub mod traits;

pub use enricher::*;
pub use exit_list::*;
pub use settings::*;
pub use traits::*;
