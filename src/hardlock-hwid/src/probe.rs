//! OS-specific hardware probes.
//!
//! Each probe is a zero-argument function returning one string for one
//! hardware attribute. An empty string means "unavailable on this machine"
//! and is not a failure; an `Err` means the probe blew up in a system call
//! and is surfaced to the builder as a structured failure.
//!
//! Exactly one branch per probe is compiled for any given target. Probe
//! results are stable across process restarts on unchanged hardware.

use std::fmt;

use thiserror::Error;

/// Hardware attributes that can contribute to the fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// CPU identity (vendor and signature words, or a brand string).
    CpuId,
    /// Burned-in MAC address of the primary physical network adapter.
    MacAddress,
    /// Serial or UUID of the volume holding the OS root.
    VolumeSerial,
    /// Vendor-reported motherboard serial.
    MotherboardSerial,
}

impl Attribute {
    /// All attributes, in the fixed order used to combine them.
    pub const ALL: [Attribute; 4] = [
        Attribute::CpuId,
        Attribute::MacAddress,
        Attribute::VolumeSerial,
        Attribute::MotherboardSerial,
    ];

    /// Stable lowercase name of the attribute.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::CpuId => "cpu_id",
            Attribute::MacAddress => "mac_address",
            Attribute::VolumeSerial => "volume_serial",
            Attribute::MotherboardSerial => "motherboard_serial",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A probe that failed outright.
///
/// An empty probe result is *not* an error; this type is reserved for
/// failures of the underlying system call.
#[derive(Debug, Clone, Error)]
#[error("{attribute} probe failed: {reason}")]
pub struct ProbeError {
    /// The attribute whose probe failed.
    pub attribute: Attribute,
    /// Human-readable failure reason.
    pub reason: String,
}

impl ProbeError {
    fn new(attribute: Attribute, reason: impl fmt::Display) -> Self {
        Self {
            attribute,
            reason: reason.to_string(),
        }
    }
}

pub(crate) type ProbeFn = fn() -> Result<String, ProbeError>;

/// The set of probe functions a builder consults.
///
/// Kept as plain function pointers so tests can substitute deterministic
/// probes for the platform ones.
#[derive(Clone, Copy)]
pub(crate) struct ProbeSet {
    pub cpu_id: ProbeFn,
    pub mac_address: ProbeFn,
    pub volume_serial: ProbeFn,
    pub motherboard_serial: ProbeFn,
}

impl ProbeSet {
    /// The real probes for the compilation target.
    pub(crate) fn platform() -> Self {
        Self {
            cpu_id,
            mac_address,
            volume_serial,
            motherboard_serial,
        }
    }

    /// Run the probe for `attribute`.
    pub(crate) fn run(&self, attribute: Attribute) -> Result<String, ProbeError> {
        match attribute {
            Attribute::CpuId => (self.cpu_id)(),
            Attribute::MacAddress => (self.mac_address)(),
            Attribute::VolumeSerial => (self.volume_serial)(),
            Attribute::MotherboardSerial => (self.motherboard_serial)(),
        }
    }
}

// =============================================================================
// CPU identity
// =============================================================================

/// Read the CPU identity for the current machine.
///
/// On x86/x86_64 this executes CPUID directly: the vendor string plus the
/// processor signature and feature words, which stay constant across reboots
/// and OS upgrades. Other architectures report the processor brand, falling
/// back to OS, architecture, and core count.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub fn cpu_id() -> Result<String, ProbeError> {
    #[cfg(target_arch = "x86")]
    use core::arch::x86::__cpuid;
    #[cfg(target_arch = "x86_64")]
    use core::arch::x86_64::__cpuid;

    // SAFETY: CPUID is unprivileged and present on every CPU this target
    // can run on.
    let vendor_leaf = unsafe { __cpuid(0) };
    let mut vendor = [0u8; 12];
    vendor[0..4].copy_from_slice(&vendor_leaf.ebx.to_le_bytes());
    vendor[4..8].copy_from_slice(&vendor_leaf.edx.to_le_bytes());
    vendor[8..12].copy_from_slice(&vendor_leaf.ecx.to_le_bytes());
    let vendor = String::from_utf8_lossy(&vendor).trim().to_string();

    // SAFETY: as above.
    let signature_leaf = unsafe { __cpuid(1) };
    Ok(format!(
        "{}-{:08x}-{:08x}-{:08x}",
        vendor, signature_leaf.eax, signature_leaf.edx, signature_leaf.ecx
    ))
}

/// Read the CPU identity for the current machine.
#[cfg(all(target_arch = "aarch64", target_os = "macos"))]
pub fn cpu_id() -> Result<String, ProbeError> {
    let output = std::process::Command::new("sysctl")
        .args(["-n", "machdep.cpu.brand_string"])
        .output()
        .map_err(|err| ProbeError::new(Attribute::CpuId, err))?;

    let brand = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if brand.is_empty() {
        return Ok(generic_cpu_id());
    }
    Ok(brand)
}

/// Read the CPU identity for the current machine.
#[cfg(all(target_arch = "aarch64", target_os = "linux"))]
pub fn cpu_id() -> Result<String, ProbeError> {
    let Ok(text) = std::fs::read_to_string("/proc/cpuinfo") else {
        return Ok(generic_cpu_id());
    };

    if let Some(model) = cpuinfo_value(&text, "model name") {
        return Ok(model);
    }

    // ARM cores report implementer/part codes instead of a brand string.
    let implementer = cpuinfo_value(&text, "CPU implementer");
    let part = cpuinfo_value(&text, "CPU part");
    if let (Some(implementer), Some(part)) = (implementer, part) {
        return Ok(format!("{implementer}-{part}"));
    }

    Ok(generic_cpu_id())
}

/// Read the CPU identity for the current machine.
#[cfg(not(any(
    target_arch = "x86",
    target_arch = "x86_64",
    all(target_arch = "aarch64", target_os = "macos"),
    all(target_arch = "aarch64", target_os = "linux"),
)))]
pub fn cpu_id() -> Result<String, ProbeError> {
    Ok(generic_cpu_id())
}

/// OS-reported processor fallback: OS, architecture, core count.
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn generic_cpu_id() -> String {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(0);
    format!(
        "{}-{}-{}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        cores
    )
}

/// First value for `key` in `/proc/cpuinfo`-style `key : value` text.
#[cfg(all(target_arch = "aarch64", target_os = "linux"))]
fn cpuinfo_value(text: &str, key: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        (name.trim() == key).then(|| value.trim().to_string())
    })
}

// =============================================================================
// MAC address
// =============================================================================

/// Interface name prefixes that indicate a virtual adapter.
#[cfg(any(target_os = "linux", target_os = "macos"))]
const VIRTUAL_IFACE_PREFIXES: &[&str] = &[
    "docker", "veth", "virbr", "vbox", "vmnet", "vnet", "vmenet", "tun", "tap", "wg", "zt", "br-",
    "bridge", "utun", "awdl", "llw", "ppp", "dummy",
];

#[cfg(any(target_os = "linux", target_os = "macos"))]
fn is_virtual_iface(name: &str) -> bool {
    VIRTUAL_IFACE_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Read the burned-in MAC address of the first physical network adapter.
///
/// Loopback and virtual interfaces (container bridges, VPN tunnels,
/// hypervisor adapters) are skipped by name pattern. Rendered as canonical
/// `aa:bb:cc:dd:ee:ff` lower-hex.
#[cfg(target_os = "linux")]
pub fn mac_address() -> Result<String, ProbeError> {
    use std::path::Path;

    let entries = match std::fs::read_dir("/sys/class/net") {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
        Err(err) => return Err(ProbeError::new(Attribute::MacAddress, err)),
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort(); // read_dir order is arbitrary; keep the pick deterministic

    for name in names {
        if name == "lo" || is_virtual_iface(&name) {
            continue;
        }
        let iface = Path::new("/sys/class/net").join(&name);

        // Physical adapters are backed by a bus device; purely virtual
        // interfaces are not.
        if !iface.join("device").exists() {
            continue;
        }

        // addr_assign_type 0 marks a permanent (burned-in) address.
        if let Ok(assign) = std::fs::read_to_string(iface.join("addr_assign_type")) {
            if assign.trim() != "0" {
                continue;
            }
        }

        if let Ok(address) = std::fs::read_to_string(iface.join("address")) {
            let address = address.trim().to_ascii_lowercase();
            if !address.is_empty() && address != "00:00:00:00:00:00" {
                return Ok(address);
            }
        }
    }

    Ok(String::new())
}

/// Read the burned-in MAC address of the first physical network adapter.
#[cfg(target_os = "macos")]
pub fn mac_address() -> Result<String, ProbeError> {
    let output = std::process::Command::new("ifconfig")
        .output()
        .map_err(|err| ProbeError::new(Attribute::MacAddress, err))?;
    let text = String::from_utf8_lossy(&output.stdout);

    // ifconfig prints one block per interface: the name flush-left, the
    // `ether` line indented beneath it.
    let mut current_iface: Option<String> = None;
    for line in text.lines() {
        if !line.starts_with([' ', '\t']) {
            current_iface = line.split(':').next().map(str::to_string);
            continue;
        }
        let Some(name) = current_iface.as_deref() else {
            continue;
        };
        if name.starts_with("lo") || is_virtual_iface(name) {
            continue;
        }
        if let Some(mac) = line.trim().strip_prefix("ether ") {
            let mac = mac.trim().to_ascii_lowercase();
            if !mac.is_empty() && mac != "00:00:00:00:00:00" {
                return Ok(mac);
            }
        }
    }

    Ok(String::new())
}

/// Read the burned-in MAC address of the first physical network adapter.
#[cfg(target_os = "windows")]
pub fn mac_address() -> Result<String, ProbeError> {
    let raw = cim_query(
        Attribute::MacAddress,
        "(Get-CimInstance -ClassName Win32_NetworkAdapter \
         -Filter 'PhysicalAdapter=TRUE AND MACAddress IS NOT NULL' \
         -ErrorAction SilentlyContinue | Select-Object -First 1).MACAddress",
    )?;
    Ok(raw.replace('-', ":").to_ascii_lowercase())
}

/// Read the burned-in MAC address of the first physical network adapter.
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub fn mac_address() -> Result<String, ProbeError> {
    Ok(String::new())
}

// =============================================================================
// Volume serial
// =============================================================================

/// Read the serial/UUID of the volume holding the OS root.
#[cfg(target_os = "linux")]
pub fn volume_serial() -> Result<String, ProbeError> {
    let mounts = match std::fs::read_to_string("/proc/self/mounts") {
        Ok(mounts) => mounts,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
        Err(err) => return Err(ProbeError::new(Attribute::VolumeSerial, err)),
    };

    let Some(root_dev) = mounts.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let device = fields.next()?;
        let mount_point = fields.next()?;
        (mount_point == "/").then(|| device.to_string())
    }) else {
        return Ok(String::new());
    };

    // Overlay and tmpfs roots (containers) have no stable volume identity.
    if !root_dev.starts_with("/dev/") {
        return Ok(String::new());
    }
    let root_dev = std::fs::canonicalize(&root_dev).unwrap_or_else(|_| root_dev.into());

    let Ok(entries) = std::fs::read_dir("/dev/disk/by-uuid") else {
        return Ok(String::new());
    };
    for entry in entries.filter_map(|entry| entry.ok()) {
        if let Ok(target) = std::fs::canonicalize(entry.path()) {
            if target == root_dev {
                return Ok(entry.file_name().to_string_lossy().to_ascii_lowercase());
            }
        }
    }

    Ok(String::new())
}

/// Read the serial/UUID of the volume holding the OS root.
#[cfg(target_os = "macos")]
pub fn volume_serial() -> Result<String, ProbeError> {
    let output = std::process::Command::new("diskutil")
        .args(["info", "/"])
        .output()
        .map_err(|err| ProbeError::new(Attribute::VolumeSerial, err))?;
    let text = String::from_utf8_lossy(&output.stdout);

    let uuid = text
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            (key.trim() == "Volume UUID").then(|| value.trim().to_ascii_lowercase())
        })
        .unwrap_or_default();
    Ok(uuid)
}

/// Read the serial of the volume holding the OS root.
#[cfg(target_os = "windows")]
pub fn volume_serial() -> Result<String, ProbeError> {
    let serial = cim_query(
        Attribute::VolumeSerial,
        "(Get-CimInstance -ClassName Win32_LogicalDisk -Filter \"DeviceID='C:'\" \
         -ErrorAction SilentlyContinue).VolumeSerialNumber",
    )?;
    Ok(serial.to_ascii_lowercase())
}

/// Read the serial/UUID of the volume holding the OS root.
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub fn volume_serial() -> Result<String, ProbeError> {
    Ok(String::new())
}

// =============================================================================
// Motherboard serial
// =============================================================================

/// Serial values some vendors ship instead of a real serial.
#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn is_placeholder_serial(serial: &str) -> bool {
    let trimmed = serial.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("to be filled by o.e.m.")
        || trimmed.eq_ignore_ascii_case("to be filled by oem")
        || trimmed.eq_ignore_ascii_case("default string")
        || trimmed.eq_ignore_ascii_case("system serial number")
        || trimmed.eq_ignore_ascii_case("none")
        || trimmed.chars().all(|c| c == '0')
}

/// Read the vendor-reported motherboard serial, without elevation.
///
/// Returns the empty string when the serial is unreadable unprivileged or is
/// an OEM placeholder.
#[cfg(target_os = "linux")]
pub fn motherboard_serial() -> Result<String, ProbeError> {
    // board_serial and product_serial are root-only on many distros;
    // a permission error therefore means "unavailable", not "failed".
    for path in [
        "/sys/class/dmi/id/board_serial",
        "/sys/class/dmi/id/product_serial",
    ] {
        if let Ok(serial) = std::fs::read_to_string(path) {
            if !is_placeholder_serial(&serial) {
                return Ok(serial.trim().to_string());
            }
        }
    }
    Ok(String::new())
}

/// Read the vendor-reported motherboard serial, without elevation.
#[cfg(target_os = "macos")]
pub fn motherboard_serial() -> Result<String, ProbeError> {
    let output = std::process::Command::new("ioreg")
        .args(["-rd1", "-c", "IOPlatformExpertDevice"])
        .output()
        .map_err(|err| ProbeError::new(Attribute::MotherboardSerial, err))?;
    let text = String::from_utf8_lossy(&output.stdout);

    let serial = text
        .lines()
        .find(|line| line.contains("IOPlatformSerialNumber"))
        .and_then(|line| line.split('"').nth(3))
        .unwrap_or_default();
    if is_placeholder_serial(serial) {
        return Ok(String::new());
    }
    Ok(serial.to_string())
}

/// Read the vendor-reported motherboard serial, without elevation.
#[cfg(target_os = "windows")]
pub fn motherboard_serial() -> Result<String, ProbeError> {
    let serial = cim_query(
        Attribute::MotherboardSerial,
        "(Get-CimInstance -ClassName Win32_BaseBoard -ErrorAction SilentlyContinue).SerialNumber",
    )?;
    if is_placeholder_serial(&serial) {
        return Ok(String::new());
    }
    Ok(serial)
}

/// Read the vendor-reported motherboard serial.
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub fn motherboard_serial() -> Result<String, ProbeError> {
    Ok(String::new())
}

// =============================================================================
// Windows CIM helper
// =============================================================================

/// Run a PowerShell CIM query and return trimmed stdout.
#[cfg(target_os = "windows")]
fn cim_query(attribute: Attribute, script: &str) -> Result<String, ProbeError> {
    let output = std::process::Command::new("powershell")
        .args(["-NoProfile", "-NonInteractive", "-Command", script])
        .output()
        .map_err(|err| ProbeError::new(attribute, err))?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_order_is_fixed() {
        assert_eq!(
            Attribute::ALL,
            [
                Attribute::CpuId,
                Attribute::MacAddress,
                Attribute::VolumeSerial,
                Attribute::MotherboardSerial,
            ]
        );
    }

    #[test]
    fn attribute_names_are_stable() {
        assert_eq!(Attribute::CpuId.as_str(), "cpu_id");
        assert_eq!(Attribute::MacAddress.as_str(), "mac_address");
        assert_eq!(Attribute::VolumeSerial.as_str(), "volume_serial");
        assert_eq!(Attribute::MotherboardSerial.as_str(), "motherboard_serial");
    }

    #[test]
    fn cpu_id_is_stable_within_process() {
        let first = cpu_id().unwrap();
        let second = cpu_id().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn mac_address_is_canonical_when_present() {
        let mac = mac_address().unwrap();
        if !mac.is_empty() {
            assert!(mac.chars().all(|c| c.is_ascii_hexdigit() || c == ':'));
            assert_eq!(mac, mac.to_ascii_lowercase());
        }
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    #[test]
    fn virtual_interfaces_are_recognized() {
        assert!(is_virtual_iface("docker0"));
        assert!(is_virtual_iface("veth12ab"));
        assert!(is_virtual_iface("vboxnet0"));
        assert!(is_virtual_iface("utun3"));
        assert!(!is_virtual_iface("eth0"));
        assert!(!is_virtual_iface("en0"));
        assert!(!is_virtual_iface("wlp3s0"));
    }

    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    #[test]
    fn placeholder_serials_are_rejected() {
        assert!(is_placeholder_serial(""));
        assert!(is_placeholder_serial("  "));
        assert!(is_placeholder_serial("To Be Filled By O.E.M."));
        assert!(is_placeholder_serial("Default string"));
        assert!(is_placeholder_serial("0000000000"));
        assert!(!is_placeholder_serial("PF3K8LQX"));
    }
}
