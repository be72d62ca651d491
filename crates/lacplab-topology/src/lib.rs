//! Topology model builder for lacp-lab.
//!
//! [`TopologyBuilder`] aggregates per-device parsed records into the
//! live graph of devices, ports, bundles, and links. [`Topology`] is
//! the immutable snapshot the verifier reads; each call to
//! [`TopologyBuilder::snapshot`] produces an independent copy, so no
//! scenario run can observe another run's mutations.
//!
//! Two rules keep snapshots honest:
//!
//! - references are never fabricated: a bundle member or link endpoint
//!   that cannot be resolved to an existing port is dropped from the
//!   graph and surfaced as a [`TopologyWarning`]
//! - links require bidirectional confirmation: if only one side reports
//!   the pairing it becomes a [`CandidateLink`], which commonly means an
//!   LACP misconfiguration scenario is in progress

mod builder;
mod model;

pub use builder::TopologyBuilder;
pub use model::{Bundle, CandidateLink, Device, Link, Port, Topology, TopologyWarning};
