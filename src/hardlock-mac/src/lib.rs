//! # hardlock-mac
//!
//! Keyed-MAC signing and verification for Hardlock license payloads.
//!
//! The MAC is HMAC-SHA-256 rendered as 64 lowercase hex characters.
//! Verification recomputes the MAC and compares in constant time, so an
//! attacker probing one byte at a time learns nothing from response latency.
//!
//! ## Security Properties
//!
//! - **Timing-safe**: candidate comparison goes through `subtle`
//! - **Key hygiene**: the secret is wiped on drop and never rendered
//! - **Total verification**: malformed candidates return `false`, never panic

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type

mod error;
mod signer;

pub use error::MacError;
pub use signer::{MacSigner, MAC_HEX_LEN};

/// Compare two byte slices without leaking where they differ.
///
/// An equality check that stops at the first differing byte tells an
/// attacker, through response latency, how long a correct prefix of their
/// forged MAC was. This comparison inspects every byte pair before
/// deciding, via `subtle`, so the verdict's timing carries no information
/// about the contents.
///
/// Slices of different lengths compare unequal up front; every value this
/// crate compares has a public, fixed length (a raw MAC is 32 bytes).
/// Callers holding variable-length secrets should pad them to a fixed size
/// before comparing.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;

    if a.len() != b.len() {
        return false;
    }
    bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_slices_compare_equal() {
        assert!(constant_time_eq(b"", b""));
        assert!(constant_time_eq(b"\x00", b"\x00"));
        assert!(constant_time_eq(b"hardlock", b"hardlock"));
    }

    #[test]
    fn single_bit_difference_is_detected() {
        let a = [0b0101_0101u8; 32];
        let mut b = a;
        b[31] ^= 0b0000_0001;
        assert!(!constant_time_eq(&a, &b));
    }

    #[test]
    fn difference_position_does_not_matter() {
        let base = [0xabu8; 16];
        for position in 0..base.len() {
            let mut other = base;
            other[position] = 0xcd;
            assert!(!constant_time_eq(&base, &other));
        }
    }

    #[test]
    fn prefix_is_not_equality() {
        assert!(!constant_time_eq(b"hardlock", b"hardlock-mac"));
        assert!(!constant_time_eq(b"hardlock", b""));
    }
}
