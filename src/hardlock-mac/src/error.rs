//! MAC error types.

use thiserror::Error;

/// Errors that can occur during MAC operations.
#[derive(Debug, Error)]
pub enum MacError {
    /// The candidate MAC does not match the recomputed MAC.
    #[error("MAC verification failed")]
    Mismatch,

    /// The MAC primitive itself failed.
    ///
    /// Distinct from a mismatch: this signals a broken invocation of the
    /// underlying keyed hash, not a forged or tampered payload.
    #[error("MAC primitive error: {reason}")]
    Primitive {
        /// Reason for the failure.
        reason: String,
    },
}

impl MacError {
    /// Create a primitive error.
    #[must_use]
    pub fn primitive(reason: impl Into<String>) -> Self {
        Self::Primitive {
            reason: reason.into(),
        }
    }
}
