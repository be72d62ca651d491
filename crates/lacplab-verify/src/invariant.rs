//! Declarative invariants over topology snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;

use lacplab_topology::Topology;
use lacplab_types::{BundleId, BundleState, DeviceId, SystemId};

/// A condition a scenario expects to hold (or reach) on the topology.
///
/// Evaluation never errors: a missing device or bundle is a violation
/// like any other, described in the returned message. Stale devices
/// fail the invariants that touch them, since their state cannot be
/// trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "kebab-case")]
pub enum Invariant {
    /// The bundle's aggregate operational state equals `state`.
    BundleState {
        /// Owning device.
        device: DeviceId,
        /// Aggregate identifier.
        bundle: BundleId,
        /// Expected state.
        state: BundleState,
    },

    /// The bundle has at least `at_least` actively bundled members.
    MemberCount {
        /// Owning device.
        device: DeviceId,
        /// Aggregate identifier.
        bundle: BundleId,
        /// Minimum bundled member count.
        at_least: usize,
    },

    /// Every bundle on every device has at least `at_least` bundled
    /// members (the minimum-links floor).
    MinimumLinks {
        /// Minimum bundled member count per bundle.
        at_least: usize,
    },

    /// The bundle advertises the given system ID.
    SystemId {
        /// Owning device.
        device: DeviceId,
        /// Aggregate identifier.
        bundle: BundleId,
        /// Expected system ID.
        system_id: SystemId,
    },

    /// At least `at_least` confirmed links exist between two devices.
    ConfirmedLinks {
        /// One device.
        a: DeviceId,
        /// The other device.
        b: DeviceId,
        /// Minimum confirmed link count.
        at_least: usize,
    },

    /// At least `at_least` one-sided candidate links are present
    /// (misconfiguration scenarios assert the asymmetry is visible).
    CandidateLinks {
        /// Minimum candidate count.
        at_least: usize,
    },
}

impl Invariant {
    /// Evaluates the invariant. `Err` carries the violation description.
    pub fn eval(&self, topo: &Topology) -> Result<(), String> {
        match self {
            Invariant::BundleState {
                device,
                bundle,
                state,
            } => {
                let b = lookup_bundle(topo, device, *bundle)?;
                if b.state == *state {
                    Ok(())
                } else {
                    Err(format!(
                        "bundle {bundle} on {device} is {}, expected {state}",
                        b.state
                    ))
                }
            }

            Invariant::MemberCount {
                device,
                bundle,
                at_least,
            } => {
                let b = lookup_bundle(topo, device, *bundle)?;
                if b.bundled_count() >= *at_least {
                    Ok(())
                } else {
                    Err(format!(
                        "bundle {bundle} on {device} has {} bundled member(s), expected >= {at_least}",
                        b.bundled_count()
                    ))
                }
            }

            Invariant::MinimumLinks { at_least } => {
                for (device, b) in topo.all_bundles() {
                    if b.bundled_count() < *at_least {
                        return Err(format!(
                            "bundle {} on {device} has {} bundled member(s), below minimum-links {at_least}",
                            b.id,
                            b.bundled_count()
                        ));
                    }
                }
                Ok(())
            }

            Invariant::SystemId {
                device,
                bundle,
                system_id,
            } => {
                let b = lookup_bundle(topo, device, *bundle)?;
                match &b.system_id {
                    Some(observed) if observed == system_id => Ok(()),
                    Some(observed) => Err(format!(
                        "bundle {bundle} on {device} advertises system ID {observed}, expected {system_id}"
                    )),
                    None => Err(format!(
                        "bundle {bundle} on {device} reports no system ID"
                    )),
                }
            }

            Invariant::ConfirmedLinks { a, b, at_least } => {
                let count = topo.links_between(a, b).len();
                if count >= *at_least {
                    Ok(())
                } else {
                    Err(format!(
                        "{count} confirmed link(s) between {a} and {b}, expected >= {at_least}"
                    ))
                }
            }

            Invariant::CandidateLinks { at_least } => {
                let count = topo.candidates.len();
                if count >= *at_least {
                    Ok(())
                } else {
                    Err(format!(
                        "{count} candidate link(s) present, expected >= {at_least}"
                    ))
                }
            }
        }
    }
}

/// Resolves a bundle or describes why it cannot be trusted.
fn lookup_bundle<'t>(
    topo: &'t Topology,
    device: &DeviceId,
    bundle: BundleId,
) -> Result<&'t lacplab_topology::Bundle, String> {
    let dev = topo
        .device(device)
        .ok_or_else(|| format!("device {device} not in topology"))?;
    if dev.is_stale() {
        return Err(format!("device {device} is stale; state not trustworthy"));
    }
    dev.bundles
        .get(&bundle)
        .ok_or_else(|| format!("bundle {bundle} not present on {device}"))
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invariant::BundleState {
                device,
                bundle,
                state,
            } => write!(f, "bundle {bundle} on {device} is {state}"),
            Invariant::MemberCount {
                device,
                bundle,
                at_least,
            } => write!(f, "bundle {bundle} on {device} has >= {at_least} bundled members"),
            Invariant::MinimumLinks { at_least } => {
                write!(f, "every bundle has >= {at_least} bundled members")
            }
            Invariant::SystemId {
                device,
                bundle,
                system_id,
            } => write!(f, "bundle {bundle} on {device} advertises {system_id}"),
            Invariant::ConfirmedLinks { a, b, at_least } => {
                write!(f, ">= {at_least} confirmed links between {a} and {b}")
            }
            Invariant::CandidateLinks { at_least } => {
                write!(f, ">= {at_least} candidate links present")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lacplab_parse::{parse, CommandFamily};
    use lacplab_topology::TopologyBuilder;

    fn leaf1_topology(summary: &str) -> Topology {
        let dev = DeviceId::new("sw-leaf1");
        let mut b = TopologyBuilder::new();
        b.register_device(dev.clone(), "10.0.0.1:9001");
        b.ingest(
            &dev,
            &parse(
                CommandFamily::InterfaceStatus,
                "Eth1/1  x  connected  1  a-full  a-10G  T\nEth1/2  x  connected  1  a-full  a-10G  T\n",
            )
            .unwrap(),
        )
        .unwrap();
        b.ingest(&dev, &parse(CommandFamily::LacpBundleStatus, summary).unwrap())
            .unwrap();
        b.ingest(
            &dev,
            &parse(
                CommandFamily::LacpMemberStatus,
                "Po1  Eth1/1  SA  bundled  32768,00:1c:73:aa:bb:01  10 Gbps\n",
            )
            .unwrap(),
        )
        .unwrap();
        b.snapshot()
    }

    #[test]
    fn test_bundle_state_check() {
        let topo = leaf1_topology("1  Po1(SU)  LACP  Eth1/1(P) Eth1/2(P)\n");
        let up = Invariant::BundleState {
            device: DeviceId::new("sw-leaf1"),
            bundle: BundleId(1),
            state: BundleState::Up,
        };
        assert!(up.eval(&topo).is_ok());

        let down = Invariant::BundleState {
            device: DeviceId::new("sw-leaf1"),
            bundle: BundleId(1),
            state: BundleState::Down,
        };
        let violation = down.eval(&topo).unwrap_err();
        assert!(violation.contains("is up, expected down"));
    }

    #[test]
    fn test_member_count_below_minimum() {
        let topo = leaf1_topology("1  Po1(SU)  LACP  Eth1/1(P) Eth1/2(D)\n");
        let inv = Invariant::MemberCount {
            device: DeviceId::new("sw-leaf1"),
            bundle: BundleId(1),
            at_least: 2,
        };
        assert!(inv.eval(&topo).is_err());

        let minlinks = Invariant::MinimumLinks { at_least: 2 };
        let violation = minlinks.eval(&topo).unwrap_err();
        assert!(violation.contains("below minimum-links 2"));
    }

    #[test]
    fn test_system_id_check() {
        let topo = leaf1_topology("1  Po1(SU)  LACP  Eth1/1(P)\n");
        let good = Invariant::SystemId {
            device: DeviceId::new("sw-leaf1"),
            bundle: BundleId(1),
            system_id: SystemId::new("32768,00:1C:73:AA:BB:01"),
        };
        assert!(good.eval(&topo).is_ok());

        let bad = Invariant::SystemId {
            device: DeviceId::new("sw-leaf1"),
            bundle: BundleId(1),
            system_id: SystemId::new("4096,00:00:00:00:00:99"),
        };
        assert!(bad.eval(&topo).is_err());
    }

    #[test]
    fn test_missing_bundle_is_violation_not_panic() {
        let topo = leaf1_topology("1  Po1(SU)  LACP  Eth1/1(P)\n");
        let inv = Invariant::BundleState {
            device: DeviceId::new("sw-leaf1"),
            bundle: BundleId(9),
            state: BundleState::Up,
        };
        assert!(inv.eval(&topo).unwrap_err().contains("not present"));
    }

    #[test]
    fn test_missing_device_is_violation() {
        let topo = leaf1_topology("1  Po1(SU)  LACP  Eth1/1(P)\n");
        let inv = Invariant::MemberCount {
            device: DeviceId::new("sw-ghost"),
            bundle: BundleId(1),
            at_least: 1,
        };
        assert!(inv.eval(&topo).unwrap_err().contains("not in topology"));
    }

    #[test]
    fn test_serde_tag_names_round_trip() {
        let inv = Invariant::MemberCount {
            device: DeviceId::new("sw-leaf1"),
            bundle: BundleId(1),
            at_least: 2,
        };
        let json = serde_json::to_string(&inv).unwrap();
        assert!(json.contains("\"check\":\"member-count\""));
        let back: Invariant = serde_json::from_str(&json).unwrap();
        assert_eq!(back, inv);
    }
}
