//! Common types for the lacp-lab verification harness.
//!
//! This crate provides the value types shared by every other lacp-lab
//! crate:
//!
//! - [`DeviceId`], [`PortName`], [`BundleId`], [`SystemId`]: identifiers
//!   for the entities in the discovered topology
//! - [`AdminState`], [`OperState`], [`BundleState`]: interface and
//!   aggregate state enums
//! - [`Bandwidth`]: a bandwidth figure normalized to bits per second,
//!   parseable from the unit notations seen in device CLI output
//! - [`LabError`]: the shared error taxonomy (connection, command,
//!   parse) with retryability classification

mod bandwidth;
mod error;
mod ids;
mod state;

pub use bandwidth::Bandwidth;
pub use error::{LabError, LabResult};
pub use ids::{BundleId, DeviceId, PortName, PortRef, SystemId};
pub use state::{AdminState, BundleState, OperState};
