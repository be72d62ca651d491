//! Identifier types for devices, ports, and LACP aggregates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LabError;

/// Identifies one managed device by its configured name.
///
/// Device names are the correlation key between neighbor-table output
/// and the set of managed devices, so comparisons are case-insensitive
/// on the first label (neighbor discovery commonly appends a domain
/// suffix the device's own configuration omits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a device identifier.
    pub fn new(name: impl Into<String>) -> Self {
        DeviceId(name.into())
    }

    /// Returns the raw device name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the hostname label (everything before the first dot).
    pub fn label(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// Returns true if `reported` plausibly names this device.
    ///
    /// Matches on the full name, the first label, or a truncated prefix
    /// of the label (neighbor tables truncate long device names to a
    /// fixed column width). The prefix check must stay on a char
    /// boundary: a name with a multi-byte character straddling the
    /// truncation point is simply not a match.
    pub fn matches_reported(&self, reported: &str) -> bool {
        let reported_label = reported.split('.').next().unwrap_or(reported);
        if reported_label.is_empty() {
            return false;
        }
        let own = self.label();
        if own.eq_ignore_ascii_case(reported_label) {
            return true;
        }
        reported_label.len() >= 8
            && own.len() > reported_label.len()
            && own
                .get(..reported_label.len())
                .map_or(false, |prefix| prefix.eq_ignore_ascii_case(reported_label))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId::new(s)
    }
}

/// Name of a physical or logical interface on one device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortName(String);

impl PortName {
    /// Creates a port name.
    pub fn new(name: impl Into<String>) -> Self {
        PortName(name.into())
    }

    /// Returns the raw interface name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PortName {
    fn from(s: &str) -> Self {
        PortName::new(s)
    }
}

/// A fully qualified port: device plus interface name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRef {
    /// The device owning the port.
    pub device: DeviceId,
    /// The interface name on that device.
    pub port: PortName,
}

impl PortRef {
    /// Creates a port reference.
    pub fn new(device: impl Into<DeviceId>, port: impl Into<PortName>) -> Self {
        PortRef {
            device: device.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.port)
    }
}

/// Numeric identifier of an LACP aggregate (port-channel group number).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BundleId(pub u16);

impl BundleId {
    /// Returns the CLI interface name of the aggregate ("Po<N>").
    pub fn interface_name(&self) -> String {
        format!("Po{}", self.0)
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Po{}", self.0)
    }
}

impl FromStr for BundleId {
    type Err = LabError;

    /// Accepts a bare group number or a "Po<N>"/"Port-channel<N>" name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .trim()
            .trim_start_matches("Port-channel")
            .trim_start_matches("port-channel")
            .trim_start_matches("Po");
        digits
            .parse::<u16>()
            .map(BundleId)
            .map_err(|_| LabError::internal(format!("invalid bundle identifier '{s}'")))
    }
}

/// LACP system identifier: system priority plus system MAC.
///
/// Stored in the canonical "priority,aa:bb:cc:dd:ee:ff" notation devices
/// print in LACP status output. Comparison is case-insensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SystemId(String);

impl SystemId {
    /// Creates a system identifier from its CLI notation.
    pub fn new(s: impl Into<String>) -> Self {
        SystemId(s.into().trim().to_ascii_lowercase())
    }

    /// Returns the canonical lowercase notation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for SystemId {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SystemId {}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SystemId {
    fn from(s: &str) -> Self {
        SystemId::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_label() {
        let d = DeviceId::new("sw-leaf1.lab.example.net");
        assert_eq!(d.label(), "sw-leaf1");
    }

    #[test]
    fn test_device_matches_reported_exact_and_label() {
        let d = DeviceId::new("sw-leaf1");
        assert!(d.matches_reported("sw-leaf1"));
        assert!(d.matches_reported("sw-leaf1.lab.example.net"));
        assert!(d.matches_reported("SW-LEAF1"));
        assert!(!d.matches_reported("sw-leaf2"));
    }

    #[test]
    fn test_device_matches_truncated() {
        let d = DeviceId::new("sw-spine-rack12-a");
        // Neighbor tables truncate long names to the column width.
        assert!(d.matches_reported("sw-spine-rack"));
        // Too-short prefixes are ambiguous and must not match.
        assert!(!d.matches_reported("sw-spin"));
    }

    #[test]
    fn test_device_matches_multibyte_name_at_truncation_point() {
        // A multi-byte character straddling the truncation width must
        // not panic the prefix comparison; it is just not a match.
        let d = DeviceId::new("abcdefg日本");
        assert!(!d.matches_reported("abcdefgh"));
        assert!(d.matches_reported("abcdefg日本"));

        let d = DeviceId::new("sw-löng-spine-rack12");
        assert!(d.matches_reported("sw-löng-spine"));
    }

    #[test]
    fn test_bundle_id_parse() {
        assert_eq!("Po1".parse::<BundleId>().unwrap(), BundleId(1));
        assert_eq!("Port-channel12".parse::<BundleId>().unwrap(), BundleId(12));
        assert_eq!("3".parse::<BundleId>().unwrap(), BundleId(3));
        assert!("Ethernet1".parse::<BundleId>().is_err());
    }

    #[test]
    fn test_bundle_interface_name() {
        assert_eq!(BundleId(7).interface_name(), "Po7");
        assert_eq!(BundleId(7).to_string(), "Po7");
    }

    #[test]
    fn test_system_id_case_insensitive() {
        let a = SystemId::new("32768,00:1C:73:AA:BB:01");
        let b = SystemId::new("32768,00:1c:73:aa:bb:01");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "32768,00:1c:73:aa:bb:01");
    }
}
