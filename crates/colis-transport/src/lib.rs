//! COLIS Transport Layer - where messages come from
//!
//! This crate provides:
//! - The `Connector` / `MessageSource` seams the supervisor drives
//! - A WebSocket implementation against the detector's stream endpoint

pub mod source;
pub mod websocket;

pub use source::*;
pub use websocket::*;
