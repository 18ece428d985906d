//! Package records - one physically detected parcel
//!
//! A record's completeness is never stored: it is derived from the three
//! physical dimensions every time it is asked for.

use serde::{Deserialize, Serialize};

use crate::{PackageId, Timestamp};

/// Completeness of a package's physical estimate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    /// At least one physical dimension is still missing
    Estimating,
    /// Length, width and height are all known
    Completed,
}

/// Physical dimensions in centimetres. `None` means "not yet estimated".
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
}

impl Dimensions {
    pub fn new(length_cm: Option<f64>, width_cm: Option<f64>, height_cm: Option<f64>) -> Self {
        Dimensions {
            length_cm,
            width_cm,
            height_cm,
        }
    }

    pub fn complete(length_cm: f64, width_cm: f64, height_cm: f64) -> Self {
        Dimensions::new(Some(length_cm), Some(width_cm), Some(height_cm))
    }

    /// All three values, if present. Presence only; zero and negatives pass.
    pub fn resolved(&self) -> Option<(f64, f64, f64)> {
        Some((self.length_cm?, self.width_cm?, self.height_cm?))
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.resolved().is_some()
    }
}

/// Raw pixel measurements from the detector (informational only)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelSize {
    pub length_px: Option<f64>,
    pub width_px: Option<f64>,
}

/// Canonical record for one tracked package
#[derive(Clone, Debug, PartialEq)]
pub struct PackageRecord {
    pub id: PackageId,
    pub dimensions: Dimensions,
    pub pixels: PixelSize,
    /// Time of the most recent message that touched this record
    pub last_seen_at: Timestamp,
}

impl PackageRecord {
    pub fn new(id: PackageId, seen_at: Timestamp) -> Self {
        PackageRecord {
            id,
            dimensions: Dimensions::default(),
            pixels: PixelSize::default(),
            last_seen_at: seen_at,
        }
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_pixels(mut self, pixels: PixelSize) -> Self {
        self.pixels = pixels;
        self
    }

    /// Derived status: completed iff all three dimensions are present
    #[inline]
    pub fn status(&self) -> PackageStatus {
        if self.dimensions.is_complete() {
            PackageStatus::Completed
        } else {
            PackageStatus::Estimating
        }
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status() == PackageStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_status_requires_all_dimensions() {
        let id = PackageId::new("7");
        let t = Timestamp::from_millis(1);

        let partial = PackageRecord::new(id.clone(), t)
            .with_dimensions(Dimensions::new(Some(60.0), Some(40.0), None));
        assert_eq!(partial.status(), PackageStatus::Estimating);

        let full = PackageRecord::new(id, t).with_dimensions(Dimensions::complete(60.0, 40.0, 30.0));
        assert_eq!(full.status(), PackageStatus::Completed);
    }

    #[test]
    fn test_zero_and_negative_count_as_present() {
        let dims = Dimensions::complete(0.0, -1.0, 30.0);
        assert!(dims.is_complete());
        assert_eq!(dims.resolved(), Some((0.0, -1.0, 30.0)));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&PackageStatus::Estimating).unwrap();
        assert_eq!(json, "\"estimating\"");
    }

    proptest! {
        #[test]
        fn status_tracks_presence(
            l in proptest::option::of(-10.0f64..500.0),
            w in proptest::option::of(-10.0f64..500.0),
            h in proptest::option::of(-10.0f64..500.0),
        ) {
            let record = PackageRecord::new(PackageId::new("p"), Timestamp::ZERO)
                .with_dimensions(Dimensions::new(l, w, h));
            let expected = l.is_some() && w.is_some() && h.is_some();
            prop_assert_eq!(record.is_completed(), expected);
        }
    }
}
