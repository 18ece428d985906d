//! COLIS Billing - from measured parcels to invoices
//!
//! Pure calculations over a package snapshot:
//! - Volumetric weight from dimensions
//! - Billing sessions (final weight = max(actual, volumetric))
//! - Immutable invoice snapshots and the printing seam

pub mod weight;
pub mod session;
pub mod invoice;

pub use weight::*;
pub use session::*;
pub use invoice::*;
