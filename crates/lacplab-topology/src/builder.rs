//! The live topology builder.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use lacplab_parse::{
    BundleRecord, CommandFamily, InterfaceRecord, MemberRecord, MemberStatus, NeighborRecord,
    ParsedRecord,
};
use lacplab_types::{BundleState, DeviceId, LabError, LabResult, PortName, PortRef};

use crate::model::{Bundle, CandidateLink, Device, Link, Port, Topology, TopologyWarning};

/// Last-ingested record batches for one device.
///
/// Each command family's output is a full table dump, so a new batch
/// for a family replaces the previous one: a deleted bundle disappears
/// from the next summary and therefore from the next snapshot.
#[derive(Debug, Clone, Default)]
struct DeviceState {
    address: String,
    interfaces: Vec<InterfaceRecord>,
    bundles: Vec<BundleRecord>,
    members: Vec<MemberRecord>,
    neighbors: Vec<NeighborRecord>,
    stale_since: Option<DateTime<Utc>>,
}

/// Aggregates per-device parsed records into the live topology.
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    devices: BTreeMap<DeviceId, DeviceState>,
}

impl TopologyBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device before its first ingest.
    pub fn register_device(&mut self, id: DeviceId, address: impl Into<String>) {
        let state = self.devices.entry(id).or_default();
        state.address = address.into();
    }

    /// Marks a device stale (unreachable). Its last-known state stays
    /// in snapshots until an explicit [`reset`](Self::reset) or a
    /// successful re-ingest.
    pub fn mark_stale(&mut self, id: &DeviceId) {
        if let Some(state) = self.devices.get_mut(id) {
            if state.stale_since.is_none() {
                state.stale_since = Some(Utc::now());
            }
        }
    }

    /// Drops all devices and records. The explicit re-discovery path.
    pub fn reset(&mut self) {
        self.devices.clear();
    }

    /// Merges a batch of parsed records for one device.
    ///
    /// Idempotent: ingesting the same record set twice yields the same
    /// snapshot. A successful ingest clears the device's stale mark.
    pub fn ingest(&mut self, device: &DeviceId, records: &[ParsedRecord]) -> LabResult<()> {
        let state = self.devices.get_mut(device).ok_or_else(|| {
            LabError::internal(format!("ingest for unregistered device '{device}'"))
        })?;

        let mut interfaces = Vec::new();
        let mut bundles = Vec::new();
        let mut members = Vec::new();
        let mut neighbors = Vec::new();
        for record in records {
            match record {
                ParsedRecord::Interface(r) => interfaces.push(r.clone()),
                ParsedRecord::Bundle(r) => bundles.push(r.clone()),
                ParsedRecord::Member(r) => members.push(r.clone()),
                ParsedRecord::Neighbor(r) => neighbors.push(r.clone()),
            }
        }

        // Replace only the families present in this batch.
        if !interfaces.is_empty() {
            state.interfaces = interfaces;
        }
        if !bundles.is_empty() {
            state.bundles = bundles;
        }
        if !members.is_empty() {
            state.members = members;
        }
        if !neighbors.is_empty() {
            state.neighbors = neighbors;
        }

        state.stale_since = None;
        debug!(device = %device, records = records.len(), "ingested");
        Ok(())
    }

    /// Replaces one family's batch, even with an empty one.
    ///
    /// [`ingest`](Self::ingest) cannot distinguish "no records parsed"
    /// from "family absent from this batch", so a discovery pass that
    /// legitimately observed an empty table (every bundle deleted, no
    /// neighbors heard) uses this to make the old batch disappear.
    pub fn ingest_family(
        &mut self,
        device: &DeviceId,
        family: CommandFamily,
        records: &[ParsedRecord],
    ) -> LabResult<()> {
        let state = self.devices.get_mut(device).ok_or_else(|| {
            LabError::internal(format!("ingest for unregistered device '{device}'"))
        })?;

        match family {
            CommandFamily::InterfaceStatus => {
                state.interfaces = records
                    .iter()
                    .filter_map(|r| match r {
                        ParsedRecord::Interface(i) => Some(i.clone()),
                        _ => None,
                    })
                    .collect();
            }
            CommandFamily::LacpBundleStatus => {
                state.bundles = records
                    .iter()
                    .filter_map(|r| match r {
                        ParsedRecord::Bundle(b) => Some(b.clone()),
                        _ => None,
                    })
                    .collect();
            }
            CommandFamily::LacpMemberStatus => {
                state.members = records
                    .iter()
                    .filter_map(|r| match r {
                        ParsedRecord::Member(m) => Some(m.clone()),
                        _ => None,
                    })
                    .collect();
            }
            CommandFamily::NeighborTable => {
                state.neighbors = records
                    .iter()
                    .filter_map(|r| match r {
                        ParsedRecord::Neighbor(n) => Some(n.clone()),
                        _ => None,
                    })
                    .collect();
            }
        }

        state.stale_since = None;
        Ok(())
    }

    /// Builds an immutable snapshot of the current graph.
    pub fn snapshot(&self) -> Topology {
        let mut warnings = Vec::new();
        let mut devices = BTreeMap::new();

        for (id, state) in &self.devices {
            devices.insert(id.clone(), self.build_device(id, state, &mut warnings));
        }

        let (links, candidates) = self.resolve_links_inner(&devices, &mut warnings);

        Topology {
            taken_at: Utc::now(),
            devices,
            links,
            candidates,
            warnings,
        }
    }

    /// Performs peer correlation over the current neighbor claims and
    /// returns (confirmed links, one-sided candidates).
    pub fn resolve_links(&self) -> (Vec<Link>, Vec<CandidateLink>) {
        let snapshot = self.snapshot();
        (snapshot.links, snapshot.candidates)
    }

    fn build_device(
        &self,
        id: &DeviceId,
        state: &DeviceState,
        warnings: &mut Vec<TopologyWarning>,
    ) -> Device {
        let mut ports: BTreeMap<PortName, Port> = BTreeMap::new();
        for r in &state.interfaces {
            ports.insert(
                r.port.clone(),
                Port {
                    name: r.port.clone(),
                    admin: r.admin,
                    oper: r.oper,
                    bundle: None,
                    speed: r.speed,
                },
            );
        }

        // Member detail refines port speed and carries the system ID.
        for m in &state.members {
            if let Some(port) = ports.get_mut(&m.port) {
                if m.speed.is_some() {
                    port.speed = m.speed;
                }
            }
        }

        let mut bundles = BTreeMap::new();
        for b in &state.bundles {
            let mut members = Vec::new();
            let mut bundled = Vec::new();
            for mf in &b.members {
                if !ports.contains_key(&mf.port) {
                    warnings.push(TopologyWarning {
                        device: id.clone(),
                        detail: format!(
                            "bundle {} references unknown port {}; edge dropped",
                            b.bundle, mf.port
                        ),
                    });
                    continue;
                }
                members.push(mf.port.clone());
                if mf.status == MemberStatus::Bundled {
                    bundled.push(mf.port.clone());
                }
            }

            let system_id = state
                .members
                .iter()
                .filter(|m| m.bundle == b.bundle)
                .map(|m| m.system_id.clone())
                .next();

            let bundle_state = if !b.aggregate_up || bundled.is_empty() {
                BundleState::Down
            } else if bundled.len() == members.len() {
                BundleState::Up
            } else {
                BundleState::Partial
            };

            for member in &members {
                if let Some(port) = ports.get_mut(member) {
                    port.bundle = Some(b.bundle);
                }
            }

            bundles.insert(
                b.bundle,
                Bundle {
                    id: b.bundle,
                    system_id,
                    state: bundle_state,
                    members,
                    bundled_members: bundled,
                },
            );
        }

        // Member detail naming a bundle the summary does not list is an
        // inconsistency worth surfacing, not a reason to invent state.
        for m in &state.members {
            if !bundles.contains_key(&m.bundle) {
                warnings.push(TopologyWarning {
                    device: id.clone(),
                    detail: format!(
                        "member detail for {} references unknown bundle {}",
                        m.port, m.bundle
                    ),
                });
            }
        }

        Device {
            id: id.clone(),
            address: state.address.clone(),
            ports,
            bundles,
            stale_since: state.stale_since,
        }
    }

    fn resolve_links_inner(
        &self,
        devices: &BTreeMap<DeviceId, Device>,
        warnings: &mut Vec<TopologyWarning>,
    ) -> (Vec<Link>, Vec<CandidateLink>) {
        let mut claims: BTreeSet<(PortRef, PortRef)> = BTreeSet::new();

        for (id, state) in &self.devices {
            for n in &state.neighbors {
                let Some(local_device) = devices.get(id) else {
                    continue;
                };
                if !local_device.ports.contains_key(&n.local_port) {
                    warnings.push(TopologyWarning {
                        device: id.clone(),
                        detail: format!(
                            "neighbor heard on unknown local port {}; edge dropped",
                            n.local_port
                        ),
                    });
                    continue;
                }

                let matches: Vec<&DeviceId> = devices
                    .keys()
                    .filter(|d| d.matches_reported(&n.remote_device))
                    .collect();
                let remote_id = match matches.as_slice() {
                    [one] => (*one).clone(),
                    [] => {
                        warnings.push(TopologyWarning {
                            device: id.clone(),
                            detail: format!(
                                "neighbor device '{}' not among managed devices; edge dropped",
                                n.remote_device
                            ),
                        });
                        continue;
                    }
                    _ => {
                        warnings.push(TopologyWarning {
                            device: id.clone(),
                            detail: format!(
                                "neighbor device '{}' is ambiguous; edge dropped",
                                n.remote_device
                            ),
                        });
                        continue;
                    }
                };

                if &remote_id == id {
                    warnings.push(TopologyWarning {
                        device: id.clone(),
                        detail: format!(
                            "neighbor claim on {} resolves to the device itself; edge dropped",
                            n.local_port
                        ),
                    });
                    continue;
                }
                if !devices
                    .get(&remote_id)
                    .is_some_and(|d| d.ports.contains_key(&n.remote_port))
                {
                    warnings.push(TopologyWarning {
                        device: id.clone(),
                        detail: format!(
                            "neighbor claim references unknown port {}/{}; edge dropped",
                            remote_id, n.remote_port
                        ),
                    });
                    continue;
                }

                claims.insert((
                    PortRef::new(id.clone(), n.local_port.clone()),
                    PortRef::new(remote_id, n.remote_port.clone()),
                ));
            }
        }

        let mut links = Vec::new();
        let mut seen = BTreeSet::new();
        let mut candidates = Vec::new();
        for (from, to) in &claims {
            if claims.contains(&(to.clone(), from.clone())) {
                let link = Link::new(from.clone(), to.clone());
                let key = (link.a.clone(), link.b.clone());
                if seen.insert(key) {
                    links.push(link);
                }
            } else {
                candidates.push(CandidateLink {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }

        (links, candidates)
    }
}
