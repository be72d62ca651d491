//! Verification outcomes and the per-check audit snapshot.

use serde::{Deserialize, Serialize};

use lacplab_topology::Topology;
use lacplab_types::LabError;

use crate::invariant::Invariant;

/// Terminal classification of one verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The invariant held (possibly after convergence).
    Passed,
    /// The invariant did not hold within the budget. Includes the
    /// poll-timeout case.
    Failed,
    /// A communication failure prevented evaluation.
    Errored,
}

/// Result of verifying one invariant, with the observed state at
/// evaluation time for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    /// Human-readable description of the invariant checked.
    pub invariant: String,
    /// Terminal classification.
    pub outcome: Outcome,
    /// Violation text (Failed) or error text (Errored).
    pub detail: Option<String>,
    /// Number of evaluation attempts made.
    pub attempts: u32,
    /// Time until the invariant held, in milliseconds. Only set on
    /// Passed; for polled checks this is the observed convergence time.
    pub converged_after_ms: Option<u64>,
    /// The snapshot the final evaluation ran against, when one was
    /// obtained.
    pub observed: Option<Topology>,
}

impl VerificationResult {
    /// Builds a Passed result.
    pub fn passed(
        invariant: &Invariant,
        attempts: u32,
        observed: Topology,
        converged_after_ms: Option<u64>,
    ) -> Self {
        VerificationResult {
            invariant: invariant.to_string(),
            outcome: Outcome::Passed,
            detail: None,
            attempts,
            converged_after_ms,
            observed: Some(observed),
        }
    }

    /// Builds a Failed result carrying the last violation seen.
    pub fn failed(
        invariant: &Invariant,
        attempts: u32,
        observed: Option<Topology>,
        violation: String,
    ) -> Self {
        VerificationResult {
            invariant: invariant.to_string(),
            outcome: Outcome::Failed,
            detail: Some(violation),
            attempts,
            converged_after_ms: None,
            observed,
        }
    }

    /// Builds an Errored result from a probe failure.
    pub fn errored(invariant: &Invariant, attempts: u32, error: &LabError) -> Self {
        VerificationResult {
            invariant: invariant.to_string(),
            outcome: Outcome::Errored,
            detail: Some(error.to_string()),
            attempts,
            converged_after_ms: None,
            observed: None,
        }
    }

    /// Returns true if the invariant held.
    pub fn is_passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }
}
