//! # hardlock-core
//!
//! Offline license validation for Hardlock: tokens cryptographically bound
//! to a secret and, optionally, to the hardware of a particular machine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      LicenseManager                          │
//! │                                                              │
//! │  ┌──────────────┐  ┌───────────────┐  ┌──────────────────┐  │
//! │  │ LicenseToken │  │   MacSigner   │  │ FingerprintBuilder│ │
//! │  │ (canonical   │  │ (HMAC-SHA-256,│  │ (probes + TTL     │ │
//! │  │  codec)      │  │  const-time)  │  │  cache, shareable)│ │
//! │  └──────────────┘  └───────────────┘  └──────────────────┘  │
//! │                           │                                  │
//! │                           ▼                                  │
//! │     structural → cryptographic → temporal → binding          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//!
//! - **Re-canonicalization**: the verified bytes are rebuilt from the parsed
//!   token, so wire layout cannot influence the verdict
//! - **Timing-safe**: MAC comparison is constant time
//! - **Order of checks**: a bad MAC is reported before expiry or binding,
//!   even on wildcard-bound tokens
//!
//! ## Example
//!
//! ```rust,ignore
//! use hardlock_core::{LicenseDraft, LicenseManager};
//!
//! let mut manager = LicenseManager::new(b"shared-secret");
//! let token = manager.generate(LicenseDraft { /* … */ })?;
//!
//! let info = manager.load_and_validate(&token)?;
//! if manager.has_feature("export")? {
//!     // feature-gated path
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type
#![allow(clippy::must_use_candidate)] // Not all functions need must_use

pub mod error;
pub mod manager;
pub mod token;

pub use error::{FailureKind, LicenseError};
pub use manager::{LicenseDraft, LicenseInfo, LicenseManager};
pub use token::{LicenseToken, TokenError, SCHEMA_VERSION, WILDCARD_HARDWARE};

// The collaborators a facade is constructed with, re-exported so most
// applications only depend on this crate.
pub use hardlock_hwid::{Attribute, FingerprintBuilder, HwidConfig};
pub use hardlock_mac::MacSigner;
