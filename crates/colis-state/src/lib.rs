//! COLIS State Engine - the catalog of packages currently in view
//!
//! This crate implements the Object Registry:
//! - Identity-keyed storage (at most one record per package)
//! - Merge-on-arrival reconciliation (last write wins)
//! - Most-recently-seen ordering for consumers
//! - Age-based eviction

pub mod registry;

pub use registry::*;
