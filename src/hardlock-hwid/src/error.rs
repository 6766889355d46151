//! Hardware identification errors.

use thiserror::Error;

use crate::probe::ProbeError;

/// Errors surfaced by the fingerprint builder.
#[derive(Debug, Error)]
pub enum HwidError {
    /// Every enabled probe came back empty and at least one failed outright.
    ///
    /// Partial availability (some attributes empty, some not) is a valid
    /// fingerprint and does not produce this error.
    #[error("hardware detection failed: {}", format_failures(.failures))]
    DetectionFailed {
        /// The structured probe failures observed during the refresh.
        failures: Vec<ProbeError>,
    },
}

fn format_failures(failures: &[ProbeError]) -> String {
    failures
        .iter()
        .map(ProbeError::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Attribute;

    #[test]
    fn detection_failure_lists_probe_failures() {
        let err = HwidError::DetectionFailed {
            failures: vec![
                ProbeError {
                    attribute: Attribute::CpuId,
                    reason: "cpuid trap".into(),
                },
                ProbeError {
                    attribute: Attribute::MacAddress,
                    reason: "io error".into(),
                },
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("cpu_id probe failed: cpuid trap"));
        assert!(rendered.contains("mac_address probe failed: io error"));
    }
}
