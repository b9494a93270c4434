//! Output Module
//!
//! World snapshots for offline analysis.

pub mod snapshot;

pub use snapshot::*;
