//! COLIS Time - clocks and cadence
//!
//! This crate implements:
//! - Wall clock abstraction for registry ages and invoice dates
//! - A manually driven clock for deterministic tests
//! - The cadence monitor (rolling message rate)

pub mod clock;
pub mod cadence;

pub use clock::*;
pub use cadence::*;
