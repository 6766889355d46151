//! Fingerprint builder with a TTL-bounded result cache.
//!
//! One builder instance owns one cache. The cache stores the most recent
//! combined fingerprint plus the per-attribute probe values, all under a
//! single refresh timestamp, and keeps running hit/miss counters.
//!
//! The builder is independently constructible and cheap to share behind an
//! [`Arc`](std::sync::Arc): processes validating many licenses against one
//! machine should consult one builder so the probes run once per TTL window,
//! not once per validation.

use std::sync::{Mutex, MutexGuard};
use std::time::{Instant, SystemTime};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::HwidConfig;
use crate::error::HwidError;
use crate::probe::{Attribute, ProbeSet};

/// Number of hex characters in a rendered fingerprint.
pub const FINGERPRINT_HEX_LEN: usize = 32;

/// Per-attribute probe values from the most recent refresh.
///
/// Unavailable attributes hold the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeValues {
    /// CPU identity.
    pub cpu_id: String,
    /// Primary adapter MAC address.
    pub mac_address: String,
    /// OS root volume serial.
    pub volume_serial: String,
    /// Motherboard serial.
    pub motherboard_serial: String,
}

impl AttributeValues {
    /// The value probed for `attribute`.
    #[must_use]
    pub fn get(&self, attribute: Attribute) -> &str {
        match attribute {
            Attribute::CpuId => &self.cpu_id,
            Attribute::MacAddress => &self.mac_address,
            Attribute::VolumeSerial => &self.volume_serial,
            Attribute::MotherboardSerial => &self.motherboard_serial,
        }
    }

    fn set(&mut self, attribute: Attribute, value: String) {
        match attribute {
            Attribute::CpuId => self.cpu_id = value,
            Attribute::MacAddress => self.mac_address = value,
            Attribute::VolumeSerial => self.volume_serial = value,
            Attribute::MotherboardSerial => self.motherboard_serial = value,
        }
    }
}

/// Running cache counters.
///
/// With caching enabled, `hits + misses` equals the number of queries served
/// since construction; explicit invalidation does not reset the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Queries answered from the cache.
    pub hits: u64,
    /// Queries that ran the probes.
    pub misses: u64,
    /// Wall-clock time of the last successful refresh.
    pub last_update: Option<SystemTime>,
}

#[derive(Debug, Default)]
struct CacheState {
    combined: Option<String>,
    attributes: Option<AttributeValues>,
    refreshed_at: Option<Instant>,
    stats: CacheStats,
}

struct Inner {
    config: HwidConfig,
    cache: CacheState,
}

/// Produces the machine fingerprint and individual attributes, cached.
pub struct FingerprintBuilder {
    inner: Mutex<Inner>,
    probes: ProbeSet,
}

impl FingerprintBuilder {
    /// Create a builder with the given configuration and an empty cache.
    #[must_use]
    pub fn new(config: HwidConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                config,
                cache: CacheState::default(),
            }),
            probes: ProbeSet::platform(),
        }
    }

    /// Test seam: a builder backed by caller-supplied probes.
    #[cfg(test)]
    fn with_probes(config: HwidConfig, probes: ProbeSet) -> Self {
        Self {
            inner: Mutex::new(Inner {
                config,
                cache: CacheState::default(),
            }),
            probes,
        }
    }

    /// The combined hardware fingerprint: 32 lowercase hex characters.
    ///
    /// Enabled attributes are probed in fixed order (`cpu_id`,
    /// `mac_address`, `volume_serial`, `motherboard_serial`), joined with
    /// `|`, and hashed with SHA-256; disabled attributes contribute no
    /// segment, so a configuration change changes the fingerprint
    /// deterministically.
    ///
    /// # Errors
    ///
    /// [`HwidError::DetectionFailed`] when every enabled probe came back
    /// empty and at least one failed outright.
    pub fn fingerprint(&self) -> Result<String, HwidError> {
        self.query().map(|(combined, _)| combined)
    }

    /// The probed value for a single attribute, through the same cache.
    ///
    /// # Errors
    ///
    /// As [`FingerprintBuilder::fingerprint`].
    pub fn attribute(&self, attribute: Attribute) -> Result<String, HwidError> {
        self.query()
            .map(|(_, values)| values.get(attribute).to_string())
    }

    /// All probed attribute values, through the same cache.
    ///
    /// # Errors
    ///
    /// As [`FingerprintBuilder::fingerprint`].
    pub fn attributes(&self) -> Result<AttributeValues, HwidError> {
        self.query().map(|(_, values)| values)
    }

    /// Drop cached values. Statistics are left intact.
    pub fn invalidate(&self) {
        let mut inner = self.lock();
        inner.cache.combined = None;
        inner.cache.attributes = None;
        inner.cache.refreshed_at = None;
    }

    /// Replace the configuration. Implicitly invalidates the cache.
    pub fn reconfigure(&self, config: HwidConfig) {
        let mut inner = self.lock();
        inner.config = config;
        inner.cache.combined = None;
        inner.cache.attributes = None;
        inner.cache.refreshed_at = None;
        debug!("fingerprint builder reconfigured, cache invalidated");
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> HwidConfig {
        self.lock().config.clone()
    }

    /// Whether a cached fingerprint is present and not past its TTL.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let inner = self.lock();
        inner.cache.combined.is_some()
            && inner
                .cache
                .refreshed_at
                .is_some_and(|at| at.elapsed() <= inner.config.cache_ttl)
    }

    /// Snapshot of the cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.lock().cache.stats
    }

    fn query(&self) -> Result<(String, AttributeValues), HwidError> {
        let mut inner = self.lock();
        let inner = &mut *inner;

        if !inner.config.cache_enabled {
            return refresh(&inner.config, &self.probes);
        }

        let fresh = inner
            .cache
            .refreshed_at
            .is_some_and(|at| at.elapsed() <= inner.config.cache_ttl);
        if fresh {
            if let (Some(combined), Some(attributes)) =
                (&inner.cache.combined, &inner.cache.attributes)
            {
                inner.cache.stats.hits += 1;
                return Ok((combined.clone(), attributes.clone()));
            }
        }

        // The lock stays held across the recomputation: concurrent callers
        // wait here instead of racing a second probe run.
        inner.cache.stats.misses += 1;
        let (combined, attributes) = refresh(&inner.config, &self.probes)?;
        inner.cache.combined = Some(combined.clone());
        inner.cache.attributes = Some(attributes.clone());
        inner.cache.refreshed_at = Some(Instant::now());
        inner.cache.stats.last_update = Some(SystemTime::now());
        Ok((combined, attributes))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Cache state is only written after a refresh fully completes, so a
        // panicked holder cannot have left it half-updated.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for FingerprintBuilder {
    fn default() -> Self {
        Self::new(HwidConfig::default())
    }
}

/// Run the enabled probes and combine their output.
fn refresh(
    config: &HwidConfig,
    probes: &ProbeSet,
) -> Result<(String, AttributeValues), HwidError> {
    let mut values = AttributeValues::default();
    let mut failures = Vec::new();
    let mut produced_any = false;

    for attribute in Attribute::ALL {
        if !config.enabled(attribute) {
            continue;
        }
        match probes.run(attribute) {
            Ok(value) => {
                if !value.is_empty() {
                    produced_any = true;
                }
                values.set(attribute, value);
            }
            Err(err) => {
                warn!(attribute = %err.attribute, reason = %err.reason, "hardware probe failed");
                failures.push(err);
            }
        }
    }

    if !produced_any && !failures.is_empty() {
        return Err(HwidError::DetectionFailed { failures });
    }

    let segments: Vec<&str> = config
        .enabled_attributes()
        .map(|attribute| values.get(attribute))
        .collect();
    let digest = Sha256::digest(segments.join("|").as_bytes());
    let mut combined = hex::encode(digest);
    combined.truncate(FINGERPRINT_HEX_LEN);

    debug!(fingerprint = %&combined[..8], "hardware fingerprint refreshed");
    Ok((combined, values))
}
