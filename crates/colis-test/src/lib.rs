//! COLIS Test Harness - scripted streams and station validation
//!
//! This crate provides:
//! - Scripted connectors replaying deterministic sessions
//! - A recording renderer
//! - Seeded noisy telemetry generation
//! - End-to-end integration testing

pub mod integration;
pub mod simulator;
pub mod stream_fuzzer;

pub use integration::*;
pub use simulator::*;
pub use stream_fuzzer::*;
