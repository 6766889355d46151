//! License token model and canonical codec.
//!
//! This module is the single source of truth for the bytes that get signed.
//! The canonical form is the compact JSON serialization of the token's
//! fields in a fixed order, *without* the `mac` field:
//!
//! ```text
//! {"user_id":…,"license_id":…,"hardware_hash":…,"features":[…],
//!  "issued_at":"YYYY-MM-DDTHH:MM:SSZ","expiry":"YYYY-MM-DDTHH:MM:SSZ",
//!  "version":1}
//! ```
//!
//! Verification rebuilds those bytes from the *parsed* token, never from the
//! input text, so whitespace, field ordering, or redundant escaping on the
//! wire cannot affect the verdict. `features` is order-significant:
//! reordering it changes the canonical bytes and fails the MAC check.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use hardlock_mac::{MacSigner, MAC_HEX_LEN};

/// The only schema version currently issued or accepted.
pub const SCHEMA_VERSION: u32 = 1;

/// `hardware_hash` value that binds a license to any machine.
pub const WILDCARD_HARDWARE: &str = "*";

/// Timestamp layout on the wire: UTC, second precision, trailing `Z`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Structural errors from parsing a license token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The bytes are not a JSON object.
    #[error("not a JSON object: {reason}")]
    Malformed {
        /// Parser diagnostic.
        reason: String,
    },

    /// A required field is absent.
    #[error("required field '{field}' is missing")]
    MissingField {
        /// The missing field.
        field: &'static str,
    },

    /// A field holds a value of the wrong type.
    #[error("field '{field}' has the wrong type")]
    WrongType {
        /// The offending field.
        field: &'static str,
    },

    /// A field that must carry bytes is empty.
    #[error("field '{field}' must not be empty")]
    EmptyField {
        /// The offending field.
        field: &'static str,
    },

    /// A timestamp field does not parse.
    #[error("field '{field}' is not a valid timestamp")]
    BadTimestamp {
        /// The offending field.
        field: &'static str,
    },

    /// The schema version is unknown.
    #[error("unsupported schema version {version}")]
    UnsupportedVersion {
        /// The version the token declared.
        version: u64,
    },

    /// The `mac` field is not 64 hex characters.
    #[error("malformed mac: {reason}")]
    BadMac {
        /// What is wrong with it.
        reason: String,
    },
}

/// A parsed license token.
///
/// `features` preserves wire order, duplicates included; order participates
/// in the canonical form and therefore in the MAC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseToken {
    /// Opaque subject identifier. Non-empty.
    pub user_id: String,
    /// Opaque caller-chosen unique id. Non-empty.
    pub license_id: String,
    /// Fingerprint this license is bound to, or `*` for any hardware.
    pub hardware_hash: String,
    /// Capability tags granted, in issuance order.
    pub features: Vec<String>,
    /// Issuance time, second precision UTC.
    pub issued_at: DateTime<Utc>,
    /// Inclusive validity horizon, second precision UTC.
    pub expiry: DateTime<Utc>,
    /// Schema version, currently always `1`.
    pub version: u32,
    /// MAC over the canonical form, 64 hex characters.
    pub mac: String,
}

/// Serialize-only view fixing the canonical field order.
#[derive(Serialize)]
struct CanonicalFields<'a> {
    user_id: &'a str,
    license_id: &'a str,
    hardware_hash: &'a str,
    features: &'a [String],
    issued_at: String,
    expiry: String,
    version: u32,
}

/// Canonical fields plus the trailing `mac`, for issuance.
#[derive(Serialize)]
struct SignedFields<'a> {
    user_id: &'a str,
    license_id: &'a str,
    hardware_hash: &'a str,
    features: &'a [String],
    issued_at: String,
    expiry: String,
    version: u32,
    mac: &'a str,
}

impl LicenseToken {
    /// Parse a token from its wire bytes.
    ///
    /// Accepts any well-formed JSON object with at least the required
    /// fields, in any order and layout; unknown extra fields are ignored
    /// and do not participate in the canonical form.
    ///
    /// # Errors
    ///
    /// A distinct [`TokenError`] per structural defect.
    pub fn parse(bytes: &[u8]) -> Result<Self, TokenError> {
        let value: Value = serde_json::from_slice(bytes).map_err(|err| TokenError::Malformed {
            reason: err.to_string(),
        })?;
        let Value::Object(object) = value else {
            return Err(TokenError::Malformed {
                reason: "top-level value is not an object".to_string(),
            });
        };

        Ok(Self {
            user_id: non_empty_string(&object, "user_id")?,
            license_id: non_empty_string(&object, "license_id")?,
            hardware_hash: required_string(&object, "hardware_hash")?,
            features: feature_list(&object)?,
            issued_at: timestamp_field(&object, "issued_at")?,
            expiry: timestamp_field(&object, "expiry")?,
            version: version_field(&object)?,
            mac: mac_field(&object)?,
        })
    }

    /// The exact bytes covered by the MAC.
    ///
    /// Fully determined by the token's field values, independent of how the
    /// token arrived on the wire.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let fields = CanonicalFields {
            user_id: &self.user_id,
            license_id: &self.license_id,
            hardware_hash: &self.hardware_hash,
            features: &self.features,
            issued_at: format_timestamp(self.issued_at),
            expiry: format_timestamp(self.expiry),
            version: self.version,
        };
        serde_json::to_vec(&fields).expect("canonical token fields serialize to JSON")
    }

    /// Serialize for issuance: the canonical fields with `mac` appended last.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let fields = SignedFields {
            user_id: &self.user_id,
            license_id: &self.license_id,
            hardware_hash: &self.hardware_hash,
            features: &self.features,
            issued_at: format_timestamp(self.issued_at),
            expiry: format_timestamp(self.expiry),
            version: self.version,
            mac: &self.mac,
        };
        serde_json::to_vec(&fields).expect("signed token fields serialize to JSON")
    }

    /// Compute and store the MAC over the canonical form.
    pub fn sign_with(&mut self, signer: &MacSigner) {
        self.mac = signer.sign(&self.canonical_bytes());
    }

    /// Verify the stored MAC against the re-derived canonical form.
    ///
    /// The in-token `mac` is only ever used as the candidate for the
    /// constant-time comparison.
    #[must_use]
    pub fn verify_with(&self, signer: &MacSigner) -> bool {
        signer.verify(&self.canonical_bytes(), &self.mac)
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn required_field<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, TokenError> {
    object.get(field).ok_or(TokenError::MissingField { field })
}

fn required_string(object: &Map<String, Value>, field: &'static str) -> Result<String, TokenError> {
    required_field(object, field)?
        .as_str()
        .map(str::to_string)
        .ok_or(TokenError::WrongType { field })
}

fn non_empty_string(object: &Map<String, Value>, field: &'static str) -> Result<String, TokenError> {
    let value = required_string(object, field)?;
    if value.is_empty() {
        return Err(TokenError::EmptyField { field });
    }
    Ok(value)
}

fn feature_list(object: &Map<String, Value>) -> Result<Vec<String>, TokenError> {
    let field = "features";
    let entries = required_field(object, field)?
        .as_array()
        .ok_or(TokenError::WrongType { field })?;

    let mut features = Vec::with_capacity(entries.len());
    for entry in entries {
        let feature = entry.as_str().ok_or(TokenError::WrongType { field })?;
        if feature.is_empty() {
            return Err(TokenError::EmptyField { field });
        }
        features.push(feature.to_string());
    }
    Ok(features)
}

fn timestamp_field(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<DateTime<Utc>, TokenError> {
    let raw = required_string(object, field)?;

    if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT) {
        return Ok(naive.and_utc());
    }
    // Tolerate offset or fractional RFC 3339 renderings; canonicalization
    // re-renders at second precision in UTC either way.
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc).trunc_subsecs(0))
        .map_err(|_| TokenError::BadTimestamp { field })
}

fn version_field(object: &Map<String, Value>) -> Result<u32, TokenError> {
    let field = "version";
    let version = required_field(object, field)?
        .as_u64()
        .ok_or(TokenError::WrongType { field })?;
    if version != u64::from(SCHEMA_VERSION) {
        return Err(TokenError::UnsupportedVersion { version });
    }
    Ok(SCHEMA_VERSION)
}

fn mac_field(object: &Map<String, Value>) -> Result<String, TokenError> {
    let mac = required_string(object, "mac")?;
    if mac.len() != MAC_HEX_LEN {
        return Err(TokenError::BadMac {
            reason: format!("expected {} hex characters, got {}", MAC_HEX_LEN, mac.len()),
        });
    }
    if !mac.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(TokenError::BadMac {
            reason: "non-hex characters".to_string(),
        });
    }
    Ok(mac)
}
