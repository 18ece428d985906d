//! Message classifier
//!
//! Binary payloads are image frames. Textual payloads are decoded as JSON
//! and recognized in one of two shapes:
//!
//! ```text
//! { "detected_objects": [ {id?, length_cm|length, ...}, ... ] }
//! { "id": .., "length_cm"|"length": .., ... }
//! ```
//!
//! Anything else is valid-but-ignored (no records); non-JSON text is dropped.

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::debug;

use colis_core::{ColisError, ColisResult};

use crate::InboundMessage;

/// Key of the batch shape
pub const DETECTED_OBJECTS_KEY: &str = "detected_objects";

/// One raw detection record as found in a telemetry message
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    /// Position within the carrying message (array index, 0 for single-object)
    pub position: usize,
    pub fields: Map<String, Value>,
}

impl RawDetection {
    pub fn new(position: usize, fields: Map<String, Value>) -> Self {
        RawDetection { position, fields }
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Why a message produced nothing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Textual payload that is not JSON
    NotJson,
    /// Valid JSON in a shape carrying no detections
    UnrecognizedShape,
}

/// Classification result
#[derive(Clone, Debug, PartialEq)]
pub enum Classified {
    /// Encoded image, to be handed to the renderer
    Frame(Bytes),
    /// Detection batch (may be empty for `detected_objects: []`)
    Telemetry(Vec<RawDetection>),
    /// Dropped, no state change
    Ignored(IgnoreReason),
}

impl Classified {
    pub fn detection_count(&self) -> usize {
        match self {
            Classified::Telemetry(batch) => batch.len(),
            _ => 0,
        }
    }
}

/// Classify one inbound message. Never fails: decode faults become `Ignored`.
pub fn classify(message: InboundMessage) -> Classified {
    match message {
        InboundMessage::Binary(bytes) => Classified::Frame(bytes),
        InboundMessage::Text(text) => match decode_telemetry(&text) {
            Ok(Some(batch)) => Classified::Telemetry(batch),
            Ok(None) => {
                debug!(len = text.len(), "telemetry shape not recognized, ignoring");
                Classified::Ignored(IgnoreReason::UnrecognizedShape)
            }
            Err(e) => {
                debug!(len = text.len(), error = %e, "non-JSON text message dropped");
                Classified::Ignored(IgnoreReason::NotJson)
            }
        },
    }
}

/// Decode a textual telemetry payload.
///
/// Returns `Ok(None)` for well-formed JSON that matches neither shape and
/// `Err(InvalidPayload)` for text that is not JSON at all.
pub fn decode_telemetry(text: &str) -> ColisResult<Option<Vec<RawDetection>>> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ColisError::InvalidPayload(e.to_string()))?;

    let Value::Object(object) = value else {
        return Ok(None);
    };

    // Batch shape wins; a non-array `detected_objects` falls through
    if let Some(Value::Array(items)) = object.get(DETECTED_OBJECTS_KEY) {
        let batch = items
            .iter()
            .enumerate()
            .filter_map(|(position, item)| match item {
                Value::Object(fields) => Some(RawDetection::new(position, fields.clone())),
                _ => None,
            })
            .collect();
        return Ok(Some(batch));
    }

    if has_identity(&object) {
        return Ok(Some(vec![RawDetection::new(0, object)]));
    }

    Ok(None)
}

fn has_identity(object: &Map<String, Value>) -> bool {
    match object.get("id") {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    }
}
