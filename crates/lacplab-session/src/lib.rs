//! Device CLI session adapter.
//!
//! This crate owns the command channel to each device:
//!
//! - [`Transport`] / [`Channel`]: the abstraction over how bytes reach
//!   a device CLI ([`TcpTransport`] for live devices,
//!   [`ScriptedTransport`] for tests)
//! - [`Session`]: one open channel with error-banner classification
//! - [`SessionRegistry`]: the per-device session table; it serializes
//!   command issuance so at most one command is in flight per device
//!
//! No retry policy lives here. A failed send surfaces as a
//! [`LabError::Connection`](lacplab_types::LabError) or
//! [`LabError::Command`](lacplab_types::LabError) and the orchestrator
//! decides whether to retry at the step boundary.

mod registry;
mod scripted;
mod session;
mod tcp;
mod transport;

pub use registry::{SessionConfig, SessionRegistry};
pub use scripted::ScriptedTransport;
pub use session::Session;
pub use tcp::TcpTransport;
pub use transport::{Channel, Transport};
