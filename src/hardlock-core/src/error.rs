//! License failure taxonomy.
//!
//! Every failure a caller can see is one of the [`FailureKind`] values,
//! surfaced either by raising ([`LicenseError`], strict mode) or through the
//! `valid = false` path of a returned [`LicenseInfo`](crate::LicenseInfo)
//! (lenient mode). Producer errors from the MAC, token, and hardware layers
//! are recoded into this taxonomy at the facade boundary.
//!
//! Failure text never contains the signing secret or MAC bytes; hardware
//! mismatches carry fingerprints abbreviated to their first 8 characters.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::token::TokenError;
use hardlock_hwid::HwidError;
use hardlock_mac::MacError;

/// Machine-readable classification of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Token bytes do not parse or a field fails structural checks.
    Structural,
    /// The MAC primitive failed, distinct from a mismatch.
    Cryptographic,
    /// MAC mismatch on an otherwise well-formed token.
    InvalidSignature,
    /// Current time is past the token's expiry.
    Expired,
    /// Token bound to hardware other than this machine.
    HardwareMismatch,
    /// No enabled probe produced data and at least one failed.
    HardwareProbe,
    /// A required feature is absent from the loaded license.
    MissingFeature,
    /// Feature query before any successful validation.
    NotInitialized,
}

impl FailureKind {
    /// Stable kebab-case name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Structural => "structural",
            FailureKind::Cryptographic => "cryptographic",
            FailureKind::InvalidSignature => "invalid-signature",
            FailureKind::Expired => "expired",
            FailureKind::HardwareMismatch => "hardware-mismatch",
            FailureKind::HardwareProbe => "hardware-probe",
            FailureKind::MissingFeature => "missing-feature",
            FailureKind::NotInitialized => "not-initialized",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by license operations.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The token bytes do not parse, or a field fails structural checks.
    #[error("malformed license token: {reason}")]
    Structural {
        /// What failed structurally.
        reason: String,
    },

    /// The MAC primitive itself failed.
    #[error("cryptographic failure: {reason}")]
    Cryptographic {
        /// Reason for the failure.
        reason: String,
    },

    /// The token's MAC does not verify under the current secret.
    #[error("license MAC does not verify")]
    InvalidSignature,

    /// The wall clock is past the token's expiry.
    #[error("license expired at {expiry}")]
    Expired {
        /// The token's inclusive validity horizon.
        expiry: DateTime<Utc>,
    },

    /// The token is bound to different hardware.
    ///
    /// Both fingerprints are abbreviated to 8 characters.
    #[error("license hardware binding mismatch (token {expected}, machine {actual})")]
    HardwareMismatch {
        /// Abbreviated fingerprint the token is bound to.
        expected: String,
        /// Abbreviated fingerprint of this machine.
        actual: String,
    },

    /// No enabled probe produced data and at least one failed.
    #[error("hardware probe failure: {reason}")]
    HardwareProbe {
        /// Description of the probe failures.
        reason: String,
    },

    /// The required feature is absent from the loaded license.
    #[error("feature '{feature}' is not granted by the current license")]
    MissingFeature {
        /// The requested feature name.
        feature: String,
    },

    /// A feature was queried before any successful validation.
    #[error("no valid license has been loaded")]
    NotInitialized,
}

impl LicenseError {
    /// The machine-readable kind of this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            LicenseError::Structural { .. } => FailureKind::Structural,
            LicenseError::Cryptographic { .. } => FailureKind::Cryptographic,
            LicenseError::InvalidSignature => FailureKind::InvalidSignature,
            LicenseError::Expired { .. } => FailureKind::Expired,
            LicenseError::HardwareMismatch { .. } => FailureKind::HardwareMismatch,
            LicenseError::HardwareProbe { .. } => FailureKind::HardwareProbe,
            LicenseError::MissingFeature { .. } => FailureKind::MissingFeature,
            LicenseError::NotInitialized => FailureKind::NotInitialized,
        }
    }

    /// Build a hardware mismatch from full fingerprints, abbreviating both.
    pub(crate) fn hardware_mismatch(expected: &str, actual: &str) -> Self {
        Self::HardwareMismatch {
            expected: abbreviate(expected),
            actual: abbreviate(actual),
        }
    }

    /// Build a structural error.
    pub(crate) fn structural(reason: impl Into<String>) -> Self {
        Self::Structural {
            reason: reason.into(),
        }
    }
}

impl From<TokenError> for LicenseError {
    fn from(err: TokenError) -> Self {
        Self::Structural {
            reason: err.to_string(),
        }
    }
}

impl From<MacError> for LicenseError {
    fn from(err: MacError) -> Self {
        match err {
            MacError::Mismatch => Self::InvalidSignature,
            MacError::Primitive { reason } => Self::Cryptographic { reason },
        }
    }
}

impl From<HwidError> for LicenseError {
    fn from(err: HwidError) -> Self {
        Self::HardwareProbe {
            reason: err.to_string(),
        }
    }
}

fn abbreviate(fingerprint: &str) -> String {
    fingerprint.chars().take(8).collect()
}
