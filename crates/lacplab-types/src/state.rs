//! Interface and aggregate state enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Administrative state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminState {
    /// Interface is administratively enabled.
    Up,
    /// Interface is administratively shut down.
    Down,
}

impl AdminState {
    /// Returns the state name as printed in CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminState::Up => "up",
            AdminState::Down => "down",
        }
    }
}

impl fmt::Display for AdminState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperState {
    /// Link is up and passing traffic.
    Up,
    /// Link is down.
    Down,
    /// Link is up but suspended from its aggregate (LACP mismatch,
    /// speed mismatch, or min-links shortfall).
    Suspended,
}

impl OperState {
    /// Returns the state name as printed in CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperState::Up => "up",
            OperState::Down => "down",
            OperState::Suspended => "suspended",
        }
    }
}

impl fmt::Display for OperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate operational state of an LACP bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleState {
    /// No member is bundled; the aggregate is down.
    Down,
    /// The aggregate is up but at least one configured member is not
    /// actively bundled.
    Partial,
    /// The aggregate is up with every configured member bundled.
    Up,
}

impl BundleState {
    /// Returns the state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleState::Down => "down",
            BundleState::Partial => "partial",
            BundleState::Up => "up",
        }
    }

    /// Returns true if the aggregate is forwarding (up or partial).
    pub fn is_forwarding(&self) -> bool {
        matches!(self, BundleState::Up | BundleState::Partial)
    }
}

impl fmt::Display for BundleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
