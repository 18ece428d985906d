//! Noisy stream generator
//!
//! Produces a seeded, reproducible mix of detector traffic: single-object
//! and batch telemetry, partial measurements, anonymous batch entries,
//! binary frames, malformed text and JSON of unknown shape. Feeding it
//! through a `Station` checks the catalog invariants:
//! - one record per package id
//! - listing ordered by last update, newest first
//! - every id either generated upstream or synthesized
//! - billing opens exactly for completed packages

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};

use colis_core::PackageStatus;
use colis_runtime::{Dispatch, Station};
use colis_wire::InboundMessage;

/// Generator configuration
#[derive(Clone, Debug)]
pub struct NoiseConfig {
    /// Number of messages to generate
    pub message_count: usize,
    /// Size of the upstream track id pool
    pub package_count: u64,
    /// Probability of a binary frame
    pub frame_prob: f64,
    /// Probability of non-JSON text
    pub garbage_prob: f64,
    /// Probability of JSON in no recognized shape
    pub unknown_prob: f64,
    /// Probability that telemetry is a `detected_objects` batch
    pub batch_prob: f64,
    /// Probability that a measurement lacks one dimension
    pub partial_prob: f64,
    /// Probability that a batch entry carries no id
    pub anonymous_prob: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig {
            message_count: 500,
            package_count: 20,
            frame_prob: 0.4,
            garbage_prob: 0.05,
            unknown_prob: 0.05,
            batch_prob: 0.3,
            partial_prob: 0.3,
            anonymous_prob: 0.1,
            seed: 42,
        }
    }
}

impl NoiseConfig {
    /// Light traffic for quick tests
    pub fn light() -> Self {
        NoiseConfig {
            message_count: 100,
            package_count: 5,
            ..NoiseConfig::default()
        }
    }

    /// Mostly broken input
    pub fn hostile() -> Self {
        NoiseConfig {
            message_count: 1000,
            package_count: 50,
            frame_prob: 0.2,
            garbage_prob: 0.3,
            unknown_prob: 0.3,
            batch_prob: 0.5,
            partial_prob: 0.6,
            anonymous_prob: 0.3,
            seed: 42,
        }
    }
}

/// What the generator emitted, by kind
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoiseSummary {
    pub frames: usize,
    pub telemetry: usize,
    pub garbage: usize,
    pub unknown: usize,
    /// Upstream ids that appeared in telemetry
    pub ids: HashSet<String>,
}

impl NoiseSummary {
    pub fn dropped(&self) -> usize {
        self.garbage + self.unknown
    }
}

/// Outcome of feeding a stream through a station
#[derive(Clone, Debug, Default)]
pub struct FuzzResult {
    pub frames: usize,
    pub merged: usize,
    pub dropped: usize,
    pub listed: usize,
    pub violations: Vec<String>,
}

impl FuzzResult {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Seeded generator of noisy detector traffic
pub struct StreamFuzzer {
    config: NoiseConfig,
    rng: StdRng,
}

impl StreamFuzzer {
    pub fn new(config: NoiseConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        StreamFuzzer { config, rng }
    }

    /// Generate the configured number of messages
    pub fn generate(&mut self) -> (Vec<InboundMessage>, NoiseSummary) {
        let mut summary = NoiseSummary::default();
        let mut messages = Vec::with_capacity(self.config.message_count);

        for _ in 0..self.config.message_count {
            let roll: f64 = self.rng.gen();
            let message = if roll < self.config.frame_prob {
                summary.frames += 1;
                self.frame()
            } else if roll < self.config.frame_prob + self.config.garbage_prob {
                summary.garbage += 1;
                self.garbage()
            } else if roll < self.config.frame_prob + self.config.garbage_prob + self.config.unknown_prob {
                summary.unknown += 1;
                self.unknown()
            } else {
                summary.telemetry += 1;
                self.telemetry(&mut summary)
            };
            messages.push(message);
        }

        (messages, summary)
    }

    fn frame(&mut self) -> InboundMessage {
        let len = self.rng.gen_range(16..256);
        let mut data: Vec<u8> = (0..len).map(|_| self.rng.gen()).collect();
        // JPEG start-of-image marker
        data[0] = 0xFF;
        data[1] = 0xD8;
        InboundMessage::binary(data)
    }

    fn garbage(&mut self) -> InboundMessage {
        let choices = ["", "{", "not json", "{\"id\": }", "[1, 2", "null null"];
        InboundMessage::text(choices[self.rng.gen_range(0..choices.len())])
    }

    fn unknown(&mut self) -> InboundMessage {
        let value = match self.rng.gen_range(0..4) {
            0 => json!({ "fps": self.rng.gen_range(1..60) }),
            1 => json!({ "id": "" , "length_cm": 1.0 }),
            2 => json!([1, 2, 3]),
            _ => json!("status"),
        };
        InboundMessage::text(value.to_string())
    }

    fn telemetry(&mut self, summary: &mut NoiseSummary) -> InboundMessage {
        if self.rng.gen::<f64>() < self.config.batch_prob {
            let count = self.rng.gen_range(0..4);
            let objects: Vec<Value> = (0..count)
                .map(|_| {
                    let anonymous = self.rng.gen::<f64>() < self.config.anonymous_prob;
                    self.measurement(summary, anonymous)
                })
                .collect();
            InboundMessage::text(json!({ "detected_objects": objects }).to_string())
        } else {
            let mut object = self.measurement(summary, false);
            if let Value::Object(map) = &mut object {
                map.insert("type".to_string(), json!("dimensions"));
            }
            InboundMessage::text(object.to_string())
        }
    }

    fn measurement(&mut self, summary: &mut NoiseSummary, anonymous: bool) -> Value {
        let mut map = Map::new();
        if !anonymous {
            let id = self.rng.gen_range(0..self.config.package_count);
            summary.ids.insert(id.to_string());
            // Upstream mixes numeric and string ids
            if self.rng.gen_bool(0.5) {
                map.insert("id".to_string(), json!(id));
            } else {
                map.insert("id".to_string(), json!(id.to_string()));
            }
        }

        let skip = if self.rng.gen::<f64>() < self.config.partial_prob {
            Some(self.rng.gen_range(0..3))
        } else {
            None
        };
        let short_keys = self.rng.gen_bool(0.3);
        let keys = if short_keys {
            ["length", "width", "height"]
        } else {
            ["length_cm", "width_cm", "height_cm"]
        };
        for (i, key) in keys.iter().enumerate() {
            if skip == Some(i) {
                continue;
            }
            let cm: f64 = self.rng.gen_range(5.0..120.0);
            map.insert(key.to_string(), json!((cm * 10.0).round() / 10.0));
        }
        Value::Object(map)
    }

    /// Generate a stream and push it through `station`, checking the
    /// catalog after every telemetry message
    pub fn run(&mut self, station: &Station) -> FuzzResult {
        let (messages, summary) = self.generate();
        let mut result = FuzzResult::default();
        let now = Instant::now();

        for message in messages {
            match station.handle_message(message, now) {
                Dispatch::Frame(_) => result.frames += 1,
                Dispatch::Merged(_) => {
                    result.merged += 1;
                    check_listing(station, &summary, &mut result.violations);
                }
                Dispatch::Ignored(_) => result.dropped += 1,
            }
        }

        if result.dropped != summary.dropped() {
            result.violations.push(format!(
                "dropped {} messages, generated {} bad ones",
                result.dropped,
                summary.dropped()
            ));
        }
        check_billing(station, &mut result.violations);
        result.listed = station.list_packages().len();
        result
    }
}

fn check_listing(station: &Station, summary: &NoiseSummary, violations: &mut Vec<String>) {
    let listing = station.list_packages();

    let mut seen = HashSet::new();
    for record in &listing {
        if !seen.insert(record.id.clone()) {
            violations.push(format!("duplicate record {}", record.id));
        }
        if !record.id.is_synthesized() && !summary.ids.contains(record.id.as_str()) {
            violations.push(format!("unknown id {}", record.id));
        }
    }

    for pair in listing.windows(2) {
        if pair[0].last_seen_at < pair[1].last_seen_at {
            violations.push(format!("listing out of order at {}", pair[1].id));
        }
    }
}

fn check_billing(station: &Station, violations: &mut Vec<String>) {
    let mut by_status: BTreeMap<String, PackageStatus> = BTreeMap::new();
    for record in station.list_packages() {
        by_status.insert(record.id.to_string(), record.status());
    }

    for (id, status) in by_status {
        let opened = station.open_billing(&id).is_ok();
        match (status, opened) {
            (PackageStatus::Completed, false) => {
                violations.push(format!("completed package {} refused billing", id))
            }
            (PackageStatus::Estimating, true) => {
                violations.push(format!("estimating package {} opened billing", id))
            }
            _ => {}
        }
        station.cancel_billing(&id);
    }
}
