//! Snapshot types: the immutable topology graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use lacplab_types::{
    AdminState, Bandwidth, BundleId, BundleState, DeviceId, OperState, PortName, PortRef, SystemId,
};

/// A port in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Interface name.
    pub name: PortName,
    /// Administrative state.
    pub admin: AdminState,
    /// Operational state.
    pub oper: OperState,
    /// The bundle this port belongs to, if any. Lookup reference only;
    /// the bundle's member set is authoritative.
    pub bundle: Option<BundleId>,
    /// Link speed, when known.
    pub speed: Option<Bandwidth>,
}

/// An LACP aggregate in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Aggregate identifier.
    pub id: BundleId,
    /// Advertised system ID, when member detail reported one.
    pub system_id: Option<SystemId>,
    /// Aggregate operational state.
    pub state: BundleState,
    /// Member ports, all guaranteed to exist in the owning device's
    /// port set.
    pub members: Vec<PortName>,
    /// Members that are actively bundled (subset of `members`).
    pub bundled_members: Vec<PortName>,
}

impl Bundle {
    /// Number of configured members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Number of actively bundled members.
    pub fn bundled_count(&self) -> usize {
        self.bundled_members.len()
    }
}

/// A device in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device identifier.
    pub id: DeviceId,
    /// Management address.
    pub address: String,
    /// Ports by name.
    pub ports: BTreeMap<PortName, Port>,
    /// Bundles by identifier.
    pub bundles: BTreeMap<BundleId, Bundle>,
    /// When the device became unreachable, if it is stale. Stale
    /// devices keep their last-known state until an explicit rebuild.
    pub stale_since: Option<DateTime<Utc>>,
}

impl Device {
    /// Returns true if the device's state is stale.
    pub fn is_stale(&self) -> bool {
        self.stale_since.is_some()
    }
}

/// A confirmed link: both sides reported the pairing.
///
/// Undirected; endpoints are stored in canonical order and always
/// belong to different devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// First endpoint (lower in canonical order).
    pub a: PortRef,
    /// Second endpoint.
    pub b: PortRef,
}

impl Link {
    /// Creates a link with endpoints in canonical order.
    pub fn new(x: PortRef, y: PortRef) -> Self {
        if x <= y {
            Link { a: x, b: y }
        } else {
            Link { a: y, b: x }
        }
    }

    /// Returns true if the link touches the given endpoint.
    pub fn has_endpoint(&self, endpoint: &PortRef) -> bool {
        &self.a == endpoint || &self.b == endpoint
    }
}

/// A one-sided link claim: only `from`'s device reported the pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLink {
    /// The endpoint whose device reported the neighbor.
    pub from: PortRef,
    /// The reported peer.
    pub to: PortRef,
}

/// Non-fatal topology inconsistency surfaced in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyWarning {
    /// Device the inconsistency was observed on.
    pub device: DeviceId,
    /// What could not be resolved.
    pub detail: String,
}

/// An immutable point-in-time copy of the discovered graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// Devices by identifier.
    pub devices: BTreeMap<DeviceId, Device>,
    /// Confirmed links.
    pub links: Vec<Link>,
    /// One-sided link claims.
    pub candidates: Vec<CandidateLink>,
    /// Unresolved-reference warnings accumulated while building.
    pub warnings: Vec<TopologyWarning>,
}

impl Topology {
    /// Looks up a device.
    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    /// Looks up a bundle on a device.
    pub fn bundle(&self, device: &DeviceId, bundle: BundleId) -> Option<&Bundle> {
        self.devices.get(device)?.bundles.get(&bundle)
    }

    /// Looks up a port on a device.
    pub fn port(&self, device: &DeviceId, port: &PortName) -> Option<&Port> {
        self.devices.get(device)?.ports.get(port)
    }

    /// Iterates every bundle with its owning device.
    pub fn all_bundles(&self) -> impl Iterator<Item = (&DeviceId, &Bundle)> {
        self.devices
            .iter()
            .flat_map(|(id, dev)| dev.bundles.values().map(move |b| (id, b)))
    }

    /// Returns the confirmed links between two devices.
    pub fn links_between(&self, x: &DeviceId, y: &DeviceId) -> Vec<&Link> {
        self.links
            .iter()
            .filter(|l| {
                (&l.a.device == x && &l.b.device == y) || (&l.a.device == y && &l.b.device == x)
            })
            .collect()
    }
}
