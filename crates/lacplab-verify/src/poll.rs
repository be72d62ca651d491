//! Bounded polling with exponential backoff for transient invariants.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use lacplab_topology::Topology;
use lacplab_types::LabResult;

use crate::invariant::Invariant;
use crate::result::VerificationResult;

/// Source of fresh topology state for polled verification.
///
/// Implementations re-issue the discovery commands and return a new
/// snapshot; reading a cached snapshot defeats the purpose of polling.
#[async_trait]
pub trait StateProbe: Send + Sync {
    /// Queries live state and returns a fresh snapshot.
    async fn refresh(&self) -> LabResult<Topology>;
}

/// Retry/backoff budget for one polled verification.
///
/// Explicit parameters, not a hidden loop: timeout and retry count are
/// part of the testable contract.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    /// Maximum refresh attempts.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles each attempt.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
    /// Overall deadline. Elapsing is a Failed outcome, never Errored.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            timeout: Duration::from_secs(30),
        }
    }
}

impl PollPolicy {
    /// Backoff after the given (1-based) attempt, with jitter. The
    /// first sleep starts at `initial_backoff` and doubles from there.
    fn backoff(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        let exp = self.initial_backoff.as_millis() as u64 * (1u64 << doublings);
        let capped = exp.min(self.max_backoff.as_millis() as u64).max(1);
        // Full jitter keeps concurrent scenarios from polling in phase.
        let jittered = rand::thread_rng().gen_range(capped / 2..=capped);
        Duration::from_millis(jittered)
    }
}

/// Verifies a transient invariant by polling fresh state.
///
/// Returns Passed (with the observed convergence time) as soon as the
/// invariant holds, Failed if the budget elapses while the invariant
/// still does not hold, and Errored only if a probe refresh fails —
/// a communication breakdown, not the invariant being unmet.
pub async fn verify_with_poll(
    invariant: &Invariant,
    probe: &dyn StateProbe,
    policy: &PollPolicy,
) -> VerificationResult {
    let started = Instant::now();
    let mut last: Option<(String, Topology)> = None;
    let mut attempts = 0;

    for attempt in 1..=policy.max_attempts {
        attempts = attempt;
        let topo = match probe.refresh().await {
            Ok(topo) => topo,
            Err(e) => {
                warn!(invariant = %invariant, attempt, error = %e, "probe refresh failed");
                return VerificationResult::errored(invariant, attempt, &e);
            }
        };

        match invariant.eval(&topo) {
            Ok(()) => {
                let elapsed = started.elapsed();
                debug!(invariant = %invariant, attempt, ?elapsed, "invariant holds");
                return VerificationResult::passed(
                    invariant,
                    attempt,
                    topo,
                    Some(elapsed.as_millis() as u64),
                );
            }
            Err(violation) => {
                debug!(invariant = %invariant, attempt, %violation, "not yet");
                last = Some((violation, topo));
            }
        }

        if attempt == policy.max_attempts {
            break;
        }
        let delay = policy.backoff(attempt);
        if started.elapsed() + delay >= policy.timeout {
            break;
        }
        sleep(delay).await;
    }

    match last {
        Some((violation, topo)) => VerificationResult::failed(
            invariant,
            attempts,
            Some(topo),
            format!("did not converge within {:?}: {violation}", policy.timeout),
        ),
        None => VerificationResult::failed(
            invariant,
            attempts,
            None,
            format!("did not converge within {:?}", policy.timeout),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Outcome;
    use lacplab_parse::{parse, CommandFamily};
    use lacplab_topology::TopologyBuilder;
    use lacplab_types::{BundleId, BundleState, DeviceId, LabError};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn topology(summary: &str) -> Topology {
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
        b.snapshot()
    }

    /// Probe that replays a scripted sequence, then repeats the last.
    struct SequenceProbe {
        states: Mutex<VecDeque<LabResult<Topology>>>,
        last: Topology,
    }

    impl SequenceProbe {
        fn new(states: Vec<LabResult<Topology>>, last: Topology) -> Self {
            SequenceProbe {
                states: Mutex::new(states.into()),
                last,
            }
        }
    }

    #[async_trait]
    impl StateProbe for SequenceProbe {
        async fn refresh(&self) -> LabResult<Topology> {
            let mut states = self.states.lock().expect("probe poisoned");
            match states.pop_front() {
                Some(state) => state,
                None => Ok(self.last.clone()),
            }
        }
    }

    fn fast_policy() -> PollPolicy {
        PollPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            timeout: Duration::from_secs(5),
        }
    }

    fn bundle_up() -> Invariant {
        Invariant::BundleState {
            device: DeviceId::new("sw-leaf1"),
            bundle: BundleId(1),
            state: BundleState::Up,
        }
    }

    #[test]
    fn test_first_backoff_starts_at_initial() {
        let policy = PollPolicy {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            ..PollPolicy::default()
        };
        for _ in 0..32 {
            let first = policy.backoff(1);
            assert!(first >= Duration::from_millis(50) && first <= Duration::from_millis(100));
            let second = policy.backoff(2);
            assert!(second <= Duration::from_millis(200));
        }
    }

    #[tokio::test]
    async fn test_converges_after_renegotiation() {
        let down = topology("1  Po1(SD)  LACP  Eth1/1(D) Eth1/2(D)\n");
        let up = topology("1  Po1(SU)  LACP  Eth1/1(P) Eth1/2(P)\n");
        let probe = SequenceProbe::new(vec![Ok(down.clone()), Ok(down)], up);

        let result = verify_with_poll(&bundle_up(), &probe, &fast_policy()).await;
        assert_eq!(result.outcome, Outcome::Passed);
        assert_eq!(result.attempts, 3);
        assert!(result.converged_after_ms.is_some());
    }

    #[tokio::test]
    async fn test_never_converging_is_failed_not_errored() {
        let down = topology("1  Po1(SD)  LACP  Eth1/1(D) Eth1/2(D)\n");
        let probe = SequenceProbe::new(vec![], down);

        let result = verify_with_poll(&bundle_up(), &probe, &fast_policy()).await;
        assert_eq!(result.outcome, Outcome::Failed);
        assert!(result.detail.unwrap().contains("did not converge"));
        assert!(result.observed.is_some());
    }

    #[tokio::test]
    async fn test_probe_failure_is_errored() {
        let down = topology("1  Po1(SD)  LACP  Eth1/1(D) Eth1/2(D)\n");
        let probe = SequenceProbe::new(
            vec![
                Ok(down.clone()),
                Err(LabError::connection("sw-leaf1", "session dropped")),
            ],
            down,
        );

        let result = verify_with_poll(&bundle_up(), &probe, &fast_policy()).await;
        assert_eq!(result.outcome, Outcome::Errored);
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test]
    async fn test_member_readd_recovers_minimum_links() {
        // One of two members removed: member-count >= 2 fails, then a
        // replacement member brings it back.
        let degraded = topology("1  Po1(SU)  LACP  Eth1/1(P)\n");
        let restored = topology("1  Po1(SU)  LACP  Eth1/1(P) Eth1/2(P)\n");
        let inv = Invariant::MemberCount {
            device: DeviceId::new("sw-leaf1"),
            bundle: BundleId(1),
            at_least: 2,
        };

        let failing = SequenceProbe::new(vec![], degraded.clone());
        let result = verify_with_poll(&inv, &failing, &fast_policy()).await;
        assert_eq!(result.outcome, Outcome::Failed);

        let recovering = SequenceProbe::new(vec![Ok(degraded)], restored);
        let result = verify_with_poll(&inv, &recovering, &fast_policy()).await;
        assert_eq!(result.outcome, Outcome::Passed);
    }
}
