//! COLIS Wire - what arrives on the stream and what it means
//!
//! This crate provides:
//! - The inbound message model (binary frame vs. textual telemetry)
//! - The message classifier and telemetry decoder
//! - The detection normalizer (tolerant field-name resolution)

pub mod message;
pub mod classify;
pub mod normalize;

pub use message::*;
pub use classify::*;
pub use normalize::*;
