//! Structured records produced by the CLI parsers.

use serde::{Deserialize, Serialize};

use lacplab_types::{AdminState, Bandwidth, BundleId, OperState, PortName, SystemId};

/// One row of interface-status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    /// Interface name ("Eth1/1", "Po1").
    pub port: PortName,
    /// Administrative state.
    pub admin: AdminState,
    /// Operational state.
    pub oper: OperState,
    /// Negotiated or configured speed, when the column was parseable.
    pub speed: Option<Bandwidth>,
}

/// Per-member flag from port-channel summary output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberStatus {
    /// Bundled and forwarding in the aggregate.
    Bundled,
    /// Physically up but suspended from the aggregate.
    Suspended,
    /// Down.
    Down,
    /// Operating as an individual (non-LACP) link.
    Individual,
}

impl MemberStatus {
    /// Maps a summary flag character to a member status.
    pub fn from_flag(flag: char) -> Option<Self> {
        match flag {
            'P' => Some(MemberStatus::Bundled),
            's' => Some(MemberStatus::Suspended),
            'D' => Some(MemberStatus::Down),
            'I' => Some(MemberStatus::Individual),
            _ => None,
        }
    }
}

/// A member as listed in a bundle summary row: port name plus flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFlag {
    /// Member interface name.
    pub port: PortName,
    /// Member status flag.
    pub status: MemberStatus,
}

/// One row of port-channel summary output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRecord {
    /// Aggregate identifier.
    pub bundle: BundleId,
    /// True if the aggregate's own flag says it is up ("U").
    pub aggregate_up: bool,
    /// Members with their flags, in listed order.
    pub members: Vec<MemberFlag>,
}

/// One row of per-member LACP detail output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    /// Aggregate the member is configured into.
    pub bundle: BundleId,
    /// Member interface name.
    pub port: PortName,
    /// True if the member is actively bundled.
    pub bundled: bool,
    /// Actor system ID advertised on this member.
    pub system_id: SystemId,
    /// Member link speed.
    pub speed: Option<Bandwidth>,
}

/// One row of neighbor-table output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborRecord {
    /// Local interface the neighbor was heard on.
    pub local_port: PortName,
    /// Neighbor's advertised device name (possibly truncated).
    pub remote_device: String,
    /// Neighbor's advertised port name.
    pub remote_port: PortName,
}

/// Discriminated union of every record the parsers can produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ParsedRecord {
    /// Interface-status row.
    Interface(InterfaceRecord),
    /// Port-channel summary row.
    Bundle(BundleRecord),
    /// Per-member LACP detail row.
    Member(MemberRecord),
    /// Neighbor-table row.
    Neighbor(NeighborRecord),
}
