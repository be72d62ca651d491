//! Scenario orchestrator for lacp-lab.
//!
//! A scenario is a YAML document naming devices, three command phases
//! (setup, run, cleanup), and the invariants to verify. The runner
//! drives each scenario through the lifecycle
//!
//! ```text
//! Pending → Configuring → Running → Verifying → {Passed, Failed, Errored}
//!                                                        ↓
//!                                                    Cleanup → Done
//! ```
//!
//! with these guarantees:
//!
//! - cleanup executes exactly once on every terminal path, including
//!   errors and the per-scenario deadline
//! - connection-class failures are retried at the step boundary within
//!   configured bounds; a command the device rejects is fatal
//! - scenarios sharing a device serialize on a per-device lock; suite
//!   parallelism is otherwise bounded only by a semaphore
//! - every command round trip, parse outcome, and verification outcome
//!   lands in an append-only audit stream

pub mod commands;

mod audit;
mod config;
mod discovery;
mod runner;
mod scenario;

pub use audit::{AuditKind, AuditRecord, AuditSink, JsonlSink, MemorySink, VerificationSummary};
pub use config::{DeviceConfig, RetryConfig, ScenarioConfig, Step, StepAction, VerifyCheck};
pub use discovery::Discoverer;
pub use runner::{
    discover_scenarios, DeviceLocks, ScenarioFile, ScenarioRunner, SuiteConfig, SuiteReport,
    SuiteRunner,
};
pub use scenario::{ScenarioLifecycle, ScenarioOutcome, ScenarioReport, ScenarioState};
