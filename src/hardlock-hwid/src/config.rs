//! Configuration for the fingerprint builder.

use std::time::Duration;

use crate::probe::Attribute;

/// Configuration for hardware fingerprinting.
///
/// Read-only from the builder's point of view once applied; replacing it via
/// [`FingerprintBuilder::reconfigure`](crate::FingerprintBuilder::reconfigure)
/// invalidates any cached values, so a configuration change deterministically
/// changes the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwidConfig {
    /// Include the CPU identity in the fingerprint.
    pub cpu_id: bool,
    /// Include the primary network adapter's MAC address.
    pub mac_address: bool,
    /// Include the OS root volume serial.
    pub volume_serial: bool,
    /// Include the motherboard serial.
    ///
    /// Off by default: many boards report an empty serial or an OEM
    /// placeholder string, which would make the fingerprint collide across
    /// unrelated machines.
    pub motherboard_serial: bool,
    /// How long cached probe results stay fresh.
    pub cache_ttl: Duration,
    /// Whether probe results are cached at all.
    ///
    /// When disabled, every query re-runs the enabled probes and the cache
    /// statistics are left untouched.
    pub cache_enabled: bool,
    /// Whether the cache may be queried from multiple threads.
    ///
    /// The builder always serializes access through its internal mutex, so
    /// this flag has no runtime effect here; it is accepted so that
    /// configurations written for other deployments keep working.
    pub thread_safe_cache: bool,
}

impl Default for HwidConfig {
    fn default() -> Self {
        Self {
            cpu_id: true,
            mac_address: true,
            volume_serial: true,
            motherboard_serial: false,
            cache_ttl: Duration::from_secs(300),
            cache_enabled: true,
            thread_safe_cache: true,
        }
    }
}

impl HwidConfig {
    /// Whether `attribute` contributes to the fingerprint.
    #[must_use]
    pub fn enabled(&self, attribute: Attribute) -> bool {
        match attribute {
            Attribute::CpuId => self.cpu_id,
            Attribute::MacAddress => self.mac_address,
            Attribute::VolumeSerial => self.volume_serial,
            Attribute::MotherboardSerial => self.motherboard_serial,
        }
    }

    /// The attributes that contribute to the fingerprint, in combination
    /// order.
    pub(crate) fn enabled_attributes(&self) -> impl Iterator<Item = Attribute> + '_ {
        Attribute::ALL.into_iter().filter(|a| self.enabled(*a))
    }
}
