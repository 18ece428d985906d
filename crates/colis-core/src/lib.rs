//! COLIS Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout the COLIS station:
//! - Identifiers (PackageId)
//! - Time primitives (Timestamp)
//! - Package records, dimensions and completeness status
//! - Station configuration
//! - Error taxonomy

pub mod id;
pub mod time;
pub mod package;
pub mod config;
pub mod error;

pub use id::*;
pub use time::*;
pub use package::*;
pub use config::*;
pub use error::*;
