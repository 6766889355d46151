//! Keyed-MAC signing and verification.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::constant_time_eq;
use crate::error::MacError;

type HmacSha256 = Hmac<Sha256>;

/// Length of a rendered MAC in hex characters (HMAC-SHA-256 output).
pub const MAC_HEX_LEN: usize = 64;

/// HMAC-SHA-256 signer/verifier over arbitrary byte strings.
///
/// Holds the caller-supplied secret for the lifetime of the signer. The key
/// is wiped from memory on drop and never appears in `Debug` output, log
/// messages, or serialized form.
pub struct MacSigner {
    key: Zeroizing<Vec<u8>>,
}

impl MacSigner {
    /// Create a signer from an arbitrary-length secret.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: Zeroizing::new(secret.to_vec()),
        }
    }

    /// Compute the MAC of `payload`, rendered as 64 lowercase hex characters.
    ///
    /// Deterministic: the same key and payload always produce the same output.
    #[must_use]
    pub fn sign(&self, payload: &[u8]) -> String {
        hex::encode(self.mac_bytes(payload))
    }

    /// Verify `candidate_hex` against the recomputed MAC of `payload`.
    ///
    /// Comparison is constant time with respect to content differences.
    /// A malformed candidate (wrong length, non-hex characters) returns
    /// `false`; this function never panics.
    #[must_use]
    pub fn verify(&self, payload: &[u8], candidate_hex: &str) -> bool {
        if candidate_hex.len() != MAC_HEX_LEN {
            return false;
        }
        let candidate = match hex::decode(candidate_hex) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };

        let expected = self.mac_bytes(payload);
        constant_time_eq(&expected, &candidate)
    }

    /// Verify `candidate_hex`, returning [`MacError::Mismatch`] when it does
    /// not hold.
    pub fn verify_or_fail(&self, payload: &[u8], candidate_hex: &str) -> Result<(), MacError> {
        if self.verify(payload, candidate_hex) {
            Ok(())
        } else {
            Err(MacError::Mismatch)
        }
    }

    /// Raw 32-byte HMAC-SHA-256 of `payload`.
    fn mac_bytes(&self, payload: &[u8]) -> [u8; 32] {
        // HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC-SHA-256 accepts keys of any length");
        mac.update(payload);
        mac.finalize().into_bytes().into()
    }
}

impl fmt::Debug for MacSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacSigner").finish_non_exhaustive()
    }
}
