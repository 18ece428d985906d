//! Identity types for COLIS
//!
//! Package identities come from the upstream detector's tracker (usually a
//! decimal track number) or are synthesized by the normalizer when absent.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Package identity - unique within the registry
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(String);

impl PackageId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        PackageId(id.into())
    }

    /// Synthesize an identity for a detection that arrived without one.
    /// Format: `obj-<arrival ms>-<position in batch>`
    #[inline]
    pub fn synthesized(arrival: Timestamp, index: usize) -> Self {
        PackageId(format!("obj-{}-{}", arrival.as_millis(), index))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_synthesized(&self) -> bool {
        self.0.starts_with("obj-")
    }
}

impl From<&str> for PackageId {
    fn from(s: &str) -> Self {
        PackageId(s.to_owned())
    }
}

impl From<String> for PackageId {
    fn from(s: String) -> Self {
        PackageId(s)
    }
}

impl From<u64> for PackageId {
    fn from(n: u64) -> Self {
        PackageId(n.to_string())
    }
}

impl Borrow<str> for PackageId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Package({})", self.0)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Invoice identity, derived from the issue time
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(String);

impl InvoiceId {
    #[inline]
    pub fn issued_at(at: Timestamp) -> Self {
        InvoiceId(format!("INV-{}", at.as_millis()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invoice({})", self.0)
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesized_ids_distinct_within_batch() {
        let arrival = Timestamp::from_millis(1_700_000_000_123);
        let a = PackageId::synthesized(arrival, 0);
        let b = PackageId::synthesized(arrival, 1);

        assert_ne!(a, b);
        assert_eq!(a.as_str(), "obj-1700000000123-0");
        assert!(a.is_synthesized());
    }

    #[test]
    fn test_numeric_track_id() {
        let id = PackageId::from(42u64);
        assert_eq!(id.as_str(), "42");
        assert!(!id.is_synthesized());
    }

    #[test]
    fn test_invoice_id_format() {
        let id = InvoiceId::issued_at(Timestamp::from_millis(5000));
        assert_eq!(id.as_str(), "INV-5000");
    }
}
