//! Scenario lifecycle state machine and run reports.

use std::fmt;

use serde::{Deserialize, Serialize};

use lacplab_types::{LabError, LabResult};
use lacplab_verify::VerificationResult;

/// Lifecycle states of one scenario run.
///
/// ```text
/// Pending → Configuring → Running → Verifying → {Passed, Failed, Errored}
///                                                        ↓
///                                                    Cleanup → Done
/// ```
///
/// Cleanup follows every verdict, including Errored: a scenario that
/// blew up halfway still restores its devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioState {
    /// Not started.
    Pending,
    /// Setup phase commands in flight.
    Configuring,
    /// Run phase commands in flight.
    Running,
    /// Invariants being checked.
    Verifying,
    /// Every invariant held.
    Passed,
    /// At least one invariant did not hold within its budget.
    Failed,
    /// A fatal error (rejected command, exhausted retries, cancellation)
    /// stopped the scenario before a verdict.
    Errored,
    /// Cleanup phase commands in flight.
    Cleanup,
    /// Terminal.
    Done,
}

impl ScenarioState {
    /// Returns true if `next` is a legal successor of this state.
    fn allows(&self, next: ScenarioState) -> bool {
        use ScenarioState::*;
        match self {
            Pending => matches!(next, Configuring | Errored),
            Configuring => matches!(next, Running | Errored),
            Running => matches!(next, Verifying | Errored),
            Verifying => matches!(next, Passed | Failed | Errored),
            Passed | Failed | Errored => matches!(next, Cleanup),
            Cleanup => matches!(next, Done),
            Done => false,
        }
    }

    /// Returns true for the verdict states.
    pub fn is_verdict(&self) -> bool {
        matches!(
            self,
            ScenarioState::Passed | ScenarioState::Failed | ScenarioState::Errored
        )
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScenarioState::Pending => "pending",
            ScenarioState::Configuring => "configuring",
            ScenarioState::Running => "running",
            ScenarioState::Verifying => "verifying",
            ScenarioState::Passed => "passed",
            ScenarioState::Failed => "failed",
            ScenarioState::Errored => "errored",
            ScenarioState::Cleanup => "cleanup",
            ScenarioState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Tracks one scenario's position in the lifecycle, rejecting illegal
/// transitions.
#[derive(Debug)]
pub struct ScenarioLifecycle {
    state: ScenarioState,
    verdict: Option<ScenarioState>,
}

impl ScenarioLifecycle {
    /// Starts at [`ScenarioState::Pending`].
    pub fn new() -> Self {
        ScenarioLifecycle {
            state: ScenarioState::Pending,
            verdict: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> ScenarioState {
        self.state
    }

    /// The verdict reached, once one has been.
    pub fn verdict(&self) -> Option<ScenarioState> {
        self.verdict
    }

    /// Advances to `next`, failing on an illegal transition.
    pub fn advance(&mut self, next: ScenarioState) -> LabResult<()> {
        if !self.state.allows(next) {
            return Err(LabError::internal(format!(
                "illegal scenario transition {} -> {next}",
                self.state
            )));
        }
        if next.is_verdict() {
            self.verdict = Some(next);
        }
        self.state = next;
        Ok(())
    }
}

impl Default for ScenarioLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal classification of a scenario in a suite report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioOutcome {
    /// Verdict was Passed.
    Passed,
    /// Verdict was Failed (an invariant did not hold).
    Failed,
    /// A fatal error preempted the verdict.
    Errored,
    /// The suite's per-scenario deadline elapsed.
    TimedOut,
    /// The scenario file could not be loaded.
    Skipped,
}

impl ScenarioOutcome {
    /// Returns true only for [`ScenarioOutcome::Passed`].
    pub fn is_passed(&self) -> bool {
        *self == ScenarioOutcome::Passed
    }
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScenarioOutcome::Passed => "passed",
            ScenarioOutcome::Failed => "failed",
            ScenarioOutcome::Errored => "errored",
            ScenarioOutcome::TimedOut => "timed-out",
            ScenarioOutcome::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// Everything a suite needs to report about one scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: String,
    /// Terminal classification.
    pub outcome: ScenarioOutcome,
    /// Per-invariant results from the verify phase.
    pub verifications: Vec<VerificationResult>,
    /// Error text for Errored / TimedOut / Skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock duration, milliseconds.
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut lc = ScenarioLifecycle::new();
        for next in [
            ScenarioState::Configuring,
            ScenarioState::Running,
            ScenarioState::Verifying,
            ScenarioState::Passed,
            ScenarioState::Cleanup,
            ScenarioState::Done,
        ] {
            lc.advance(next).unwrap();
        }
        assert_eq!(lc.verdict(), Some(ScenarioState::Passed));
        assert_eq!(lc.state(), ScenarioState::Done);
    }

    #[test]
    fn test_error_during_setup_still_reaches_cleanup() {
        let mut lc = ScenarioLifecycle::new();
        lc.advance(ScenarioState::Configuring).unwrap();
        lc.advance(ScenarioState::Errored).unwrap();
        lc.advance(ScenarioState::Cleanup).unwrap();
        lc.advance(ScenarioState::Done).unwrap();
        assert_eq!(lc.verdict(), Some(ScenarioState::Errored));
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut lc = ScenarioLifecycle::new();
        assert!(lc.advance(ScenarioState::Verifying).is_err());
        lc.advance(ScenarioState::Configuring).unwrap();
        assert!(lc.advance(ScenarioState::Passed).is_err());
    }

    #[test]
    fn test_done_is_terminal() {
        let mut lc = ScenarioLifecycle::new();
        lc.advance(ScenarioState::Configuring).unwrap();
        lc.advance(ScenarioState::Errored).unwrap();
        lc.advance(ScenarioState::Cleanup).unwrap();
        lc.advance(ScenarioState::Done).unwrap();
        assert!(lc.advance(ScenarioState::Cleanup).is_err());
    }
}
