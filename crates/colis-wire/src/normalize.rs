//! Detection normalizer
//!
//! Upstream detectors are inconsistent about field names (`length_cm` vs.
//! `length`). Each canonical field resolves from an ordered list of candidate
//! keys; the first key holding a JSON number wins.

use serde_json::Value;

use colis_core::{Dimensions, PackageId, PackageRecord, PixelSize, Timestamp};

use crate::RawDetection;

pub const ID_KEY: &str = "id";
pub const LENGTH_KEYS: &[&str] = &["length_cm", "length"];
pub const WIDTH_KEYS: &[&str] = &["width_cm", "width"];
pub const HEIGHT_KEYS: &[&str] = &["height_cm", "height"];
pub const LENGTH_PX_KEYS: &[&str] = &["length_px"];
pub const WIDTH_PX_KEYS: &[&str] = &["width_px"];

/// Resolve a numeric field from candidate keys, in order.
/// Missing keys and non-numeric values move on to the next candidate.
pub fn resolve_number(raw: &RawDetection, candidates: &[&str]) -> Option<f64> {
    candidates
        .iter()
        .find_map(|key| raw.get(key).and_then(Value::as_f64))
}

/// Identity as provided upstream: non-empty string or any number
pub fn provided_id(raw: &RawDetection) -> Option<PackageId> {
    match raw.get(ID_KEY)? {
        Value::String(s) if !s.is_empty() => Some(PackageId::new(s.as_str())),
        Value::Number(n) => Some(PackageId::new(n.to_string())),
        _ => None,
    }
}

/// Map one raw detection to a canonical record seen at `arrival`
pub fn normalize(raw: &RawDetection, arrival: Timestamp) -> PackageRecord {
    let id = provided_id(raw).unwrap_or_else(|| PackageId::synthesized(arrival, raw.position));

    let dimensions = Dimensions::new(
        resolve_number(raw, LENGTH_KEYS),
        resolve_number(raw, WIDTH_KEYS),
        resolve_number(raw, HEIGHT_KEYS),
    );
    let pixels = PixelSize {
        length_px: resolve_number(raw, LENGTH_PX_KEYS),
        width_px: resolve_number(raw, WIDTH_PX_KEYS),
    };

    PackageRecord::new(id, arrival)
        .with_dimensions(dimensions)
        .with_pixels(pixels)
}

/// Normalize a whole batch, preserving arrival order
pub fn normalize_batch(batch: &[RawDetection], arrival: Timestamp) -> Vec<PackageRecord> {
    batch.iter().map(|raw| normalize(raw, arrival)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use colis_core::PackageStatus;
    use proptest::prelude::*;
    use serde_json::json;

    fn raw(position: usize, value: Value) -> RawDetection {
        let Value::Object(fields) = value else {
            panic!("test detections must be objects");
        };
        RawDetection::new(position, fields)
    }

    const T: Timestamp = Timestamp(1_700_000_000_000);

    #[test]
    fn test_suffixed_fields() {
        let record = normalize(
            &raw(0, json!({"id": "p1", "length_cm": 60.0, "width_cm": 40.0, "height_cm": 30.0,
                           "length_px": 320, "width_px": 210})),
            T,
        );
        assert_eq!(record.id, PackageId::new("p1"));
        assert_eq!(record.dimensions, Dimensions::complete(60.0, 40.0, 30.0));
        assert_eq!(record.pixels.length_px, Some(320.0));
        assert_eq!(record.status(), PackageStatus::Completed);
        assert_eq!(record.last_seen_at, T);
    }

    #[test]
    fn test_unsuffixed_fallback() {
        let record = normalize(&raw(0, json!({"id": "p2", "length": 12, "width": 8, "height": 5})), T);
        assert_eq!(record.dimensions, Dimensions::complete(12.0, 8.0, 5.0));
    }

    #[test]
    fn test_primary_key_takes_precedence() {
        let record = normalize(&raw(0, json!({"id": "p", "length_cm": 20, "length": 99})), T);
        assert_eq!(record.dimensions.length_cm, Some(20.0));
    }

    #[test]
    fn test_missing_dimension_is_absent_not_zero() {
        let record = normalize(&raw(0, json!({"id": "p", "length_cm": 20, "width_cm": 10})), T);
        assert_eq!(record.dimensions.height_cm, None);
        assert_eq!(record.status(), PackageStatus::Estimating);
    }

    #[test]
    fn test_null_and_strings_fall_through() {
        let record = normalize(
            &raw(0, json!({"id": "p", "length_cm": null, "length": 7, "width_cm": "9", "height": 3})),
            T,
        );
        assert_eq!(record.dimensions.length_cm, Some(7.0));
        assert_eq!(record.dimensions.width_cm, None);
        assert_eq!(record.dimensions.height_cm, Some(3.0));
    }

    #[test]
    fn test_zero_and_negative_are_present() {
        let record = normalize(
            &raw(0, json!({"id": "p", "length_cm": 0, "width_cm": -4.5, "height_cm": 0.0})),
            T,
        );
        assert_eq!(record.dimensions, Dimensions::complete(0.0, -4.5, 0.0));
        assert_eq!(record.status(), PackageStatus::Completed);
    }

    #[test]
    fn test_numeric_id_rendered_decimal() {
        let record = normalize(&raw(0, json!({"id": 17})), T);
        assert_eq!(record.id.as_str(), "17");
    }

    #[test]
    fn test_missing_id_synthesized_per_position() {
        let batch = vec![
            raw(0, json!({"length": 1})),
            raw(1, json!({"id": ""})),
            raw(2, json!({"id": "named"})),
        ];
        let records = normalize_batch(&batch, T);

        assert_eq!(records[0].id.as_str(), "obj-1700000000000-0");
        assert_eq!(records[1].id.as_str(), "obj-1700000000000-1");
        assert_eq!(records[2].id.as_str(), "named");
    }

    proptest! {
        #[test]
        fn synthesized_ids_never_collide_within_batch(size in 1usize..64, millis in 0i64..i64::MAX / 2) {
            let batch: Vec<_> = (0..size).map(|i| raw(i, json!({"length": i}))).collect();
            let records = normalize_batch(&batch, Timestamp::from_millis(millis));
            let unique: HashSet<_> = records.iter().map(|r| r.id.clone()).collect();
            prop_assert_eq!(unique.len(), size);
        }
    }
}
