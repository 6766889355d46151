//! # hardlock-hwid
//!
//! Hardware fingerprinting for Hardlock license binding.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 FingerprintBuilder                    │
//! │                                                       │
//! │  ┌─────────────┐   ┌──────────────────────────────┐  │
//! │  │ HwidConfig  │   │ Cache (combined + per-attr,  │  │
//! │  │ (attributes,│   │ single refresh timestamp,    │  │
//! │  │  TTL)       │   │ hit/miss counters)           │  │
//! │  └─────────────┘   └──────────────────────────────┘  │
//! │                           │  miss                     │
//! │                           ▼                           │
//! │  ┌──────────────────────────────────────────────┐    │
//! │  │ OS probes: cpu_id · mac_address ·            │    │
//! │  │ volume_serial · motherboard_serial           │    │
//! │  └──────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The fingerprint is the first 32 lowercase hex characters of the SHA-256
//! of the enabled probe outputs joined with `|` in fixed order. An
//! unavailable attribute contributes the empty string; a disabled attribute
//! contributes nothing at all.
//!
//! One builder should back all license checks in a process: the cache
//! guarantees at most one probe run per TTL window even under concurrent
//! readers.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type

mod builder;
mod config;
mod error;
pub mod probe;

pub use builder::{AttributeValues, CacheStats, FingerprintBuilder, FINGERPRINT_HEX_LEN};
pub use config::HwidConfig;
pub use error::HwidError;
pub use probe::{Attribute, ProbeError};
