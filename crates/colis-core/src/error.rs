//! Error types for COLIS

use thiserror::Error;

use crate::PackageId;

/// Core COLIS errors
#[derive(Error, Debug)]
pub enum ColisError {
    // Decode errors
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    // Billing preconditions
    #[error("Package {id} has incomplete dimensions")]
    IncompleteDimensions { id: PackageId },

    #[error("No calculation has been run for package {id}")]
    NotCalculated { id: PackageId },

    #[error("Package not found: {0}")]
    PackageNotFound(PackageId),

    #[error("No billing session open for package {0}")]
    NoBillingSession(PackageId),

    #[error("No invoice generated for package {0}")]
    NoInvoice(PackageId),

    #[error("Invoice printing failed: {0}")]
    PrintFailed(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Transport errors
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Connection failed")]
    ConnectionFailed,

    #[error("Connection closed")]
    ConnectionClosed,
}

impl ColisError {
    /// Precondition refusals leave state untouched and go back to the caller
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            ColisError::IncompleteDimensions { .. }
                | ColisError::NotCalculated { .. }
                | ColisError::PackageNotFound(_)
                | ColisError::NoBillingSession(_)
                | ColisError::NoInvoice(_)
        )
    }

    /// Transport faults are recovered by reconnecting
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ColisError::TransportError(_) | ColisError::ConnectionFailed | ColisError::ConnectionClosed
        )
    }
}

/// Result type for COLIS operations
pub type ColisResult<T> = Result<T, ColisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let refusal = ColisError::IncompleteDimensions {
            id: PackageId::new("3"),
        };
        assert!(refusal.is_refusal());
        assert!(!refusal.is_transport());
        assert_eq!(refusal.to_string(), "Package 3 has incomplete dimensions");

        assert!(ColisError::ConnectionClosed.is_transport());
        assert!(!ColisError::InvalidPayload("x".into()).is_refusal());
    }
}
