//! COLIS Runtime - the station
//!
//! This crate ties the pipeline together:
//! 1. Supervise the stream connection (connect, receive, reconnect)
//! 2. Observe message cadence
//! 3. Classify each message
//! 4. Hand image frames to the renderer (decoded off the dispatch path)
//! 5. Normalize and merge telemetry into the registry
//! 6. Sweep stale packages on a fixed interval
//! 7. Serve listings and billing to the presentation layer

pub mod logging;
pub mod render;
pub mod station;
pub mod supervisor;

pub use logging::*;
pub use render::*;
pub use station::*;
pub use supervisor::*;
