//! Bandwidth figures normalized to bits per second.
//!
//! Device CLIs print link speed in whatever notation the platform
//! favors: `1000` (a megabit column), `a-1000` (auto-negotiated), `10G`,
//! `10 Gbps`, `10000 Mb/s`, `1 Gbit/s`. All of them normalize to the
//! same [`Bandwidth`] value so invariants can compare figures from
//! different devices directly.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LabError;

/// Matches a CLI speed token: optional `a-` prefix, a decimal number,
/// and an optional unit (SI prefix plus a bit/s spelling variant).
static SPEED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:a-)?(\d+(?:\.\d+)?)\s*(?:([kmgt])?(?:bit|b)?(?:ps|/s)?)?$")
        .expect("invalid speed pattern")
});

/// A bandwidth figure in bits per second.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Bandwidth(u64);

impl Bandwidth {
    /// One megabit per second.
    pub const MBPS: u64 = 1_000_000;

    /// One gigabit per second.
    pub const GBPS: u64 = 1_000_000_000;

    /// Creates a bandwidth from raw bits per second.
    pub const fn from_bps(bps: u64) -> Self {
        Bandwidth(bps)
    }

    /// Creates a bandwidth from megabits per second.
    pub const fn from_mbps(mbps: u64) -> Self {
        Bandwidth(mbps * Self::MBPS)
    }

    /// Creates a bandwidth from gigabits per second.
    pub const fn from_gbps(gbps: u64) -> Self {
        Bandwidth(gbps * Self::GBPS)
    }

    /// Returns the figure in bits per second.
    pub const fn bps(&self) -> u64 {
        self.0
    }

    /// Parses a CLI speed token.
    ///
    /// A bare number carries no unit of its own; CLI speed columns print
    /// megabits per second, so that is the assumed unit. An explicit
    /// unit suffix overrides it, with the SI prefix deciding the scale
    /// (`10G`, `10Gbps`, `10 Gbit/s` are all ten gigabits per second).
    /// A plain `bps`/`b/s` suffix means literal bits per second.
    pub fn parse_cli(token: &str) -> Result<Self, LabError> {
        let token = token.trim();
        let caps = SPEED_RE
            .captures(token)
            .ok_or_else(|| LabError::internal(format!("unrecognized speed token '{token}'")))?;
        let number: f64 = caps[1]
            .parse()
            .map_err(|_| LabError::internal(format!("unrecognized speed token '{token}'")))?;

        let has_unit_suffix = caps.get(0).map_or(false, |m| {
            m.as_str()[caps.get(1).map_or(0, |n| n.end())..]
                .trim()
                .chars()
                .any(|c| c.is_ascii_alphabetic() || c == '/')
        });
        let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
            Some(p) if p == "k" => 1e3,
            Some(p) if p == "m" => 1e6,
            Some(p) if p == "g" => 1e9,
            Some(p) if p == "t" => 1e12,
            _ if has_unit_suffix => 1.0,
            // Bare number: megabit column convention.
            _ => 1e6,
        };

        Ok(Bandwidth((number * multiplier).round() as u64))
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= Self::GBPS && self.0 % Self::GBPS == 0 {
            write!(f, "{} Gbps", self.0 / Self::GBPS)
        } else if self.0 >= Self::MBPS && self.0 % Self::MBPS == 0 {
            write!(f, "{} Mbps", self.0 / Self::MBPS)
        } else {
            write!(f, "{} bps", self.0)
        }
    }
}

impl FromStr for Bandwidth {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bandwidth::parse_cli(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unit_notations_normalize_identically() {
        let gig = Bandwidth::from_gbps(1);
        assert_eq!(Bandwidth::parse_cli("1 Gbps").unwrap(), gig);
        assert_eq!(Bandwidth::parse_cli("1000 Mbps").unwrap(), gig);
        assert_eq!(Bandwidth::parse_cli("1Gb/s").unwrap(), gig);
        assert_eq!(Bandwidth::parse_cli("1 Gbit/s").unwrap(), gig);
        assert_eq!(Bandwidth::parse_cli("1G").unwrap(), gig);
    }

    #[test]
    fn test_bare_number_is_megabit_column() {
        assert_eq!(
            Bandwidth::parse_cli("1000").unwrap(),
            Bandwidth::from_gbps(1)
        );
        assert_eq!(
            Bandwidth::parse_cli("a-1000").unwrap(),
            Bandwidth::from_gbps(1)
        );
    }

    #[test]
    fn test_explicit_bits() {
        assert_eq!(
            Bandwidth::parse_cli("1000 bps").unwrap(),
            Bandwidth::from_bps(1000)
        );
        assert_eq!(
            Bandwidth::parse_cli("500Kbps").unwrap(),
            Bandwidth::from_bps(500_000)
        );
    }

    #[test]
    fn test_hundred_gig_port_speed() {
        assert_eq!(
            Bandwidth::parse_cli("100G").unwrap(),
            Bandwidth::from_gbps(100)
        );
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(Bandwidth::parse_cli("fast").is_err());
        assert!(Bandwidth::parse_cli("").is_err());
        assert!(Bandwidth::parse_cli("Gbps").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Bandwidth::from_gbps(10).to_string(), "10 Gbps");
        assert_eq!(Bandwidth::from_mbps(100).to_string(), "100 Mbps");
        assert_eq!(Bandwidth::from_bps(512).to_string(), "512 bps");
    }
}
