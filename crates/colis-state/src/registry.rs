//! Object registry - identity-keyed package state
//!
//! Lookup is by identity; the consumer-facing order (most recently seen
//! first) is recomputed on demand rather than maintained incrementally.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, warn};

use colis_core::{PackageId, PackageRecord, Timestamp};

/// Default staleness horizon
pub const DEFAULT_STALENESS_THRESHOLD: Duration = Duration::from_millis(30_000);

/// Outcome of merging one batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: u32,
    pub updated: u32,
    /// Updates that turned a completed record back into an estimating one
    pub regressed: u32,
}

/// Registry shared between the dispatch loop and readers
pub type SharedRegistry = Arc<RwLock<ObjectRegistry>>;

/// Package catalog - the sole owner of package state
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    records: HashMap<PackageId, PackageRecord>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        ObjectRegistry::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(ObjectRegistry::new()))
    }

    /// Merge a batch in arrival order.
    ///
    /// Unknown ids are inserted. Known ids take the incoming dimensions,
    /// pixel measurements and `last_seen_at` unconditionally, even when the
    /// incoming record is less complete than the stored one.
    pub fn merge(&mut self, batch: Vec<PackageRecord>) -> MergeReport {
        let mut report = MergeReport::default();

        for incoming in batch {
            match self.records.get_mut(&incoming.id) {
                Some(existing) => {
                    let was_completed = existing.is_completed();

                    existing.dimensions = incoming.dimensions;
                    existing.pixels = incoming.pixels;
                    existing.last_seen_at = incoming.last_seen_at;
                    report.updated += 1;

                    if was_completed && !existing.is_completed() {
                        report.regressed += 1;
                        warn!(
                            id = %existing.id,
                            "completed package regressed to estimating; incoming values kept"
                        );
                    }
                }
                None => {
                    report.inserted += 1;
                    self.records.insert(incoming.id.clone(), incoming);
                }
            }
        }

        report
    }

    /// Remove every record with `now - last_seen_at >= threshold`.
    /// Returns the evicted ids.
    pub fn evict_stale(&mut self, now: Timestamp, threshold: Duration) -> Vec<PackageId> {
        let mut evicted = Vec::new();
        self.records.retain(|id, record| {
            let keep = record.last_seen_at.age_at(now) < threshold;
            if !keep {
                evicted.push(id.clone());
            }
            keep
        });

        if !evicted.is_empty() {
            debug!(count = evicted.len(), remaining = self.records.len(), "evicted stale packages");
        }
        evicted
    }

    /// Snapshot of all records, most recently seen first (ties by id)
    pub fn list(&self) -> Vec<PackageRecord> {
        let mut listing: Vec<_> = self.records.values().cloned().collect();
        listing.sort_by(|a, b| {
            b.last_seen_at
                .cmp(&a.last_seen_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        listing
    }

    pub fn get(&self, id: &str) -> Option<&PackageRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
