//! Append-only audit stream.
//!
//! Every command issued, parse outcome, and verification outcome is
//! recorded so a scenario run can be reconstructed after the fact.
//! Records are append-only; nothing ever rewrites one.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use lacplab_types::{DeviceId, LabResult};
use lacplab_verify::VerificationResult;

/// What a record describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditKind {
    /// A command round trip.
    Command,
    /// A parse outcome for one command family.
    Parse,
    /// A verification outcome.
    Verification,
    /// A scenario lifecycle transition.
    Lifecycle,
}

/// One audit line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Wall-clock time the event happened.
    pub timestamp: DateTime<Utc>,
    /// Scenario the event belongs to.
    pub scenario: String,
    /// Record discriminator.
    pub kind: AuditKind,
    /// Device involved, when the event is device-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceId>,
    /// Command issued, for command records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Leading portion of the raw response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_excerpt: Option<String>,
    /// Outcome text: parse result, lifecycle transition, or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Verification outcome, for verification records. The observed
    /// snapshot is omitted from audit lines to keep them readable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationSummary>,
}

/// The audit-facing slice of a [`VerificationResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSummary {
    /// Human-readable invariant description.
    pub invariant: String,
    /// Outcome name.
    pub outcome: String,
    /// Violation or error text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Evaluation attempts made.
    pub attempts: u32,
    /// Convergence time on success, milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converged_after_ms: Option<u64>,
}

impl From<&VerificationResult> for VerificationSummary {
    fn from(result: &VerificationResult) -> Self {
        VerificationSummary {
            invariant: result.invariant.clone(),
            outcome: format!("{:?}", result.outcome).to_lowercase(),
            detail: result.detail.clone(),
            attempts: result.attempts,
            converged_after_ms: result.converged_after_ms,
        }
    }
}

const EXCERPT_LEN: usize = 200;

impl AuditRecord {
    fn base(scenario: &str, kind: AuditKind) -> Self {
        AuditRecord {
            timestamp: Utc::now(),
            scenario: scenario.to_string(),
            kind,
            device: None,
            command: None,
            response_excerpt: None,
            detail: None,
            verification: None,
        }
    }

    /// Records one command round trip.
    pub fn command(scenario: &str, device: &DeviceId, command: &str, response: &str) -> Self {
        let mut record = Self::base(scenario, AuditKind::Command);
        record.device = Some(device.clone());
        record.command = Some(command.to_string());
        record.response_excerpt = Some(excerpt(response));
        record
    }

    /// Records a parse outcome for one command family: the record
    /// count on success, or the failure text for a degraded optional
    /// parse.
    pub fn parse(scenario: &str, device: &DeviceId, family: &str, detail: &str) -> Self {
        let mut record = Self::base(scenario, AuditKind::Parse);
        record.device = Some(device.clone());
        record.command = Some(family.to_string());
        record.detail = Some(detail.to_string());
        record
    }

    /// Records a verification outcome.
    pub fn verification(scenario: &str, result: &VerificationResult) -> Self {
        let mut record = Self::base(scenario, AuditKind::Verification);
        record.verification = Some(VerificationSummary::from(result));
        record
    }

    /// Records a scenario lifecycle transition.
    pub fn lifecycle(scenario: &str, detail: impl Into<String>) -> Self {
        let mut record = Self::base(scenario, AuditKind::Lifecycle);
        record.detail = Some(detail.into());
        record
    }
}

fn excerpt(response: &str) -> String {
    let trimmed = response.trim_end();
    match trimmed.char_indices().nth(EXCERPT_LEN) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Destination for audit records.
///
/// Sinks must never fail the scenario: a sink that cannot write logs
/// and drops the record.
pub trait AuditSink: Send + Sync {
    /// Appends one record.
    fn record(&self, record: AuditRecord);
}

/// In-memory sink for tests and summaries.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit sink poisoned").clone()
    }
}

impl AuditSink for MemorySink {
    fn record(&self, record: AuditRecord) {
        self.records.lock().expect("audit sink poisoned").push(record);
    }
}

/// JSON-lines file sink, one record per line.
pub struct JsonlSink {
    file: Mutex<File>,
}

impl JsonlSink {
    /// Opens (appending) the audit file.
    pub fn open(path: &Path) -> LabResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(JsonlSink {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for JsonlSink {
    fn record(&self, record: AuditRecord) {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "unserializable audit record dropped");
                return;
            }
        };
        let mut file = self.file.lock().expect("audit file poisoned");
        if let Err(e) = writeln!(file, "{line}") {
            warn!(error = %e, "audit write failed; record dropped");
        }
    }
}
