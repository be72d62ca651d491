//! Scenario and suite execution.
//!
//! One [`ScenarioRunner`] drives a single scenario through its
//! lifecycle; [`SuiteRunner`] runs many with bounded parallelism,
//! per-scenario deadlines, and per-device locking so two scenarios
//! never reconfigure the same device concurrently.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use lacplab_session::{SessionConfig, SessionRegistry, Transport};
use lacplab_types::{DeviceId, LabError, LabResult};
use lacplab_verify::{verify, verify_with_poll, Outcome, PollPolicy, VerificationResult};

use crate::audit::{AuditRecord, AuditSink};
use crate::config::{ScenarioConfig, Step, StepAction};
use crate::discovery::Discoverer;
use crate::scenario::{ScenarioLifecycle, ScenarioOutcome, ScenarioReport, ScenarioState};

/// Suite-level execution bounds.
#[derive(Debug, Clone, Copy)]
pub struct SuiteConfig {
    /// Scenarios in flight at once.
    pub parallelism: usize,
    /// Deadline for one scenario's setup, run, and verify phases.
    /// Cleanup runs outside this budget so it always happens.
    pub scenario_timeout: Duration,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        SuiteConfig {
            parallelism: 4,
            scenario_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-device mutual exclusion across scenarios.
///
/// Locks are acquired in sorted device order, so two scenarios sharing
/// a device pair cannot deadlock each other.
#[derive(Default)]
pub struct DeviceLocks {
    locks: DashMap<DeviceId, Arc<Mutex<()>>>,
}

impl DeviceLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires every named device, blocking until all are held.
    pub async fn acquire(&self, devices: &[DeviceId]) -> Vec<OwnedMutexGuard<()>> {
        let mut sorted: Vec<DeviceId> = devices.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for device in sorted {
            let lock = self
                .locks
                .entry(device)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            guards.push(lock.lock_owned().await);
        }
        guards
    }
}

/// Drives one scenario through its lifecycle.
pub struct ScenarioRunner {
    config: ScenarioConfig,
    discoverer: Arc<Discoverer>,
    sink: Arc<dyn AuditSink>,
    cancel: CancellationToken,
    body_timeout: Duration,
}

impl ScenarioRunner {
    /// Creates a runner for `config` over the given transport.
    pub fn new(
        config: ScenarioConfig,
        transport: Arc<dyn Transport>,
        session_config: SessionConfig,
        sink: Arc<dyn AuditSink>,
        cancel: CancellationToken,
        body_timeout: Duration,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(transport, session_config));
        let discoverer = Arc::new(Discoverer::new(
            config.name.clone(),
            registry,
            config.devices.clone(),
            sink.clone(),
        ));
        ScenarioRunner {
            config,
            discoverer,
            sink,
            cancel,
            body_timeout,
        }
    }

    /// Runs the scenario to completion and reports.
    ///
    /// The setup, run, and verify phases share the body deadline;
    /// cleanup runs afterwards unconditionally, exactly once, on every
    /// terminal path.
    pub async fn run(self) -> ScenarioReport {
        let started = Instant::now();
        let mut lifecycle = ScenarioLifecycle::new();
        let mut verifications = Vec::new();

        info!(scenario = %self.config.name, "scenario starting");
        self.sink
            .record(AuditRecord::lifecycle(&self.config.name, "starting"));

        let body = timeout(
            self.body_timeout,
            self.execute(&mut lifecycle, &mut verifications),
        )
        .await;

        let (outcome, error) = match body {
            Ok(Ok(())) => match lifecycle.verdict() {
                Some(ScenarioState::Passed) => (ScenarioOutcome::Passed, None),
                Some(ScenarioState::Failed) => (ScenarioOutcome::Failed, None),
                other => (
                    ScenarioOutcome::Errored,
                    Some(format!("no verdict reached ({other:?})")),
                ),
            },
            Ok(Err(e)) => {
                error!(scenario = %self.config.name, error = %e, "scenario errored");
                (ScenarioOutcome::Errored, Some(e.to_string()))
            }
            Err(_) => {
                warn!(scenario = %self.config.name, "scenario timed out");
                (
                    ScenarioOutcome::TimedOut,
                    Some(format!("deadline of {:?} elapsed", self.body_timeout)),
                )
            }
        };

        if !lifecycle.state().is_verdict() {
            // Errored is reachable from every pre-verdict state.
            let _ = lifecycle.advance(ScenarioState::Errored);
        }
        if let Some(detail) = &error {
            self.sink
                .record(AuditRecord::lifecycle(&self.config.name, detail.clone()));
        }

        self.cleanup(&mut lifecycle).await;
        self.sink
            .record(AuditRecord::lifecycle(&self.config.name, "done"));
        ScenarioReport {
            name: self.config.name.clone(),
            outcome,
            verifications,
            error,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Setup, run, and verify. Ends with the lifecycle at a verdict.
    async fn execute(
        &self,
        lifecycle: &mut ScenarioLifecycle,
        verifications: &mut Vec<VerificationResult>,
    ) -> LabResult<()> {
        lifecycle.advance(ScenarioState::Configuring)?;
        self.sink
            .record(AuditRecord::lifecycle(&self.config.name, "configuring"));
        self.connect_with_retry().await?;
        self.run_steps(&self.config.setup).await?;

        lifecycle.advance(ScenarioState::Running)?;
        self.sink
            .record(AuditRecord::lifecycle(&self.config.name, "running"));
        self.run_steps(&self.config.run).await?;

        lifecycle.advance(ScenarioState::Verifying)?;
        self.sink
            .record(AuditRecord::lifecycle(&self.config.name, "verifying"));
        let verdict = self.verify_all(verifications).await?;
        lifecycle.advance(verdict)?;
        Ok(())
    }

    /// Runs the verify phase. Returns the verdict, or an error if a
    /// check could not be evaluated at all.
    async fn verify_all(
        &self,
        verifications: &mut Vec<VerificationResult>,
    ) -> LabResult<ScenarioState> {
        // One fresh pass for the single-shot checks.
        let snapshot = self.discoverer.discover_snapshot().await?;
        let policy = PollPolicy {
            timeout: self.config.verify_timeout(),
            ..PollPolicy::default()
        };

        let mut all_passed = true;
        for check in &self.config.verify {
            self.check_cancelled()?;
            let result = if check.converge {
                verify_with_poll(&check.invariant, self.discoverer.as_ref(), &policy).await
            } else {
                verify(&check.invariant, &snapshot)
            };
            self.sink
                .record(AuditRecord::verification(&self.config.name, &result));
            if result.outcome == Outcome::Errored {
                let detail = result
                    .detail
                    .clone()
                    .unwrap_or_else(|| "probe failure".to_string());
                verifications.push(result);
                return Err(LabError::internal(format!(
                    "verification aborted: {detail}"
                )));
            }
            all_passed &= result.is_passed();
            verifications.push(result);
        }

        Ok(if all_passed {
            ScenarioState::Passed
        } else {
            ScenarioState::Failed
        })
    }

    /// Runs one phase's steps in order, checking for cancellation
    /// between steps.
    async fn run_steps(&self, steps: &[Step]) -> LabResult<()> {
        for step in steps {
            self.check_cancelled()?;
            if let StepAction::Wait { millis } = step.action {
                sleep(Duration::from_millis(millis)).await;
                continue;
            }
            let lines = step.action.render()?;
            self.send_with_retry(&step.device, &lines).await?;
        }
        Ok(())
    }

    /// Sends a command sequence, retrying whole-sequence on
    /// connection-class failures only. A rejected command (error
    /// banner) is fatal immediately: retrying a command the device
    /// refuses cannot succeed.
    async fn send_with_retry(&self, device: &DeviceId, lines: &[String]) -> LabResult<()> {
        let retry = &self.config.retry;
        let mut attempt = 1;
        loop {
            match self.discoverer.send_lines(device, lines).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                    warn!(
                        scenario = %self.config.name,
                        device = %device,
                        attempt,
                        error = %e,
                        "step failed, retrying"
                    );
                    attempt += 1;
                    sleep(retry.backoff()).await;
                    // The session may be gone; reconnect before retrying.
                    if let Err(e) = self.discoverer.connect_all().await {
                        warn!(device = %device, error = %e, "reconnect failed");
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn connect_with_retry(&self) -> LabResult<()> {
        let retry = &self.config.retry;
        let mut attempt = 1;
        loop {
            match self.discoverer.connect_all().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                    warn!(scenario = %self.config.name, attempt, error = %e, "connect failed, retrying");
                    attempt += 1;
                    sleep(retry.backoff()).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn check_cancelled(&self) -> LabResult<()> {
        if self.cancel.is_cancelled() {
            return Err(LabError::internal("cancelled"));
        }
        Ok(())
    }

    /// Runs the cleanup phase exactly once and releases sessions.
    ///
    /// Cleanup failures are logged but never change the verdict: the
    /// scenario already has its classification, and a best-effort
    /// restore must still release everything it can.
    async fn cleanup(&self, lifecycle: &mut ScenarioLifecycle) {
        if lifecycle.advance(ScenarioState::Cleanup).is_err() {
            // Already past cleanup; never run it twice.
            return;
        }
        self.sink
            .record(AuditRecord::lifecycle(&self.config.name, "cleanup"));
        for step in &self.config.cleanup {
            if let StepAction::Wait { millis } = step.action {
                sleep(Duration::from_millis(millis)).await;
                continue;
            }
            let lines = match step.action.render() {
                Ok(lines) => lines,
                Err(e) => {
                    warn!(scenario = %self.config.name, error = %e, "unrenderable cleanup step skipped");
                    continue;
                }
            };
            if let Err(e) = self.send_with_retry(&step.device, &lines).await {
                warn!(
                    scenario = %self.config.name,
                    device = %step.device,
                    error = %e,
                    "cleanup step failed"
                );
            }
        }
        self.discoverer.close_all().await;
        let _ = lifecycle.advance(ScenarioState::Done);
    }
}

/// Aggregated results of one suite run.
#[derive(Debug, Clone)]
pub struct SuiteReport {
    /// Every scenario's report, in completion order.
    pub reports: Vec<ScenarioReport>,
}

impl SuiteReport {
    /// Count of passed scenarios.
    pub fn passed(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_passed()).count()
    }

    /// Count of scenarios that did not pass.
    pub fn failed(&self) -> usize {
        self.reports.len() - self.passed()
    }

    /// True when every scenario passed.
    pub fn all_passed(&self) -> bool {
        self.reports.iter().all(|r| r.outcome.is_passed())
    }
}

/// A scenario file discovered on disk, possibly unloadable.
pub struct ScenarioFile {
    /// Where it was found.
    pub path: PathBuf,
    /// The parsed config, or why loading failed.
    pub config: LabResult<ScenarioConfig>,
}

/// Finds every `.yaml`/`.yml` file under `dir`, sorted by file name
/// for deterministic suite order. Unloadable files are kept so the
/// suite can report them as skipped rather than silently ignore them.
pub fn discover_scenarios(dir: &Path) -> LabResult<Vec<ScenarioFile>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|path| {
            let config = ScenarioConfig::load(&path);
            ScenarioFile { path, config }
        })
        .collect())
}

/// Runs scenarios with bounded parallelism and shared device locks.
pub struct SuiteRunner {
    transport: Arc<dyn Transport>,
    session_config: SessionConfig,
    suite: SuiteConfig,
    sink: Arc<dyn AuditSink>,
    cancel: CancellationToken,
    locks: Arc<DeviceLocks>,
}

impl SuiteRunner {
    /// Creates a suite runner over the given transport.
    pub fn new(
        transport: Arc<dyn Transport>,
        session_config: SessionConfig,
        suite: SuiteConfig,
        sink: Arc<dyn AuditSink>,
        cancel: CancellationToken,
    ) -> Self {
        SuiteRunner {
            transport,
            session_config,
            suite,
            sink,
            cancel,
            locks: Arc::new(DeviceLocks::new()),
        }
    }

    /// Runs one scenario, honoring the shared device locks.
    pub async fn run_scenario(&self, config: ScenarioConfig) -> ScenarioReport {
        let devices: Vec<DeviceId> = config.devices.iter().map(|d| d.name.clone()).collect();
        let _guards = self.locks.acquire(&devices).await;

        let runner = ScenarioRunner::new(
            config,
            self.transport.clone(),
            self.session_config,
            self.sink.clone(),
            self.cancel.clone(),
            self.suite.scenario_timeout,
        );
        runner.run().await
    }

    /// Runs every discovered scenario and aggregates the reports.
    ///
    /// Files that failed to load report as skipped. Completion order is
    /// nondeterministic under parallelism; the report list preserves
    /// the discovery (sorted) order.
    pub async fn run_suite(self: Arc<Self>, files: Vec<ScenarioFile>) -> SuiteReport {
        let semaphore = Arc::new(Semaphore::new(self.suite.parallelism.max(1)));
        let mut handles = Vec::new();

        for (index, file) in files.into_iter().enumerate() {
            let config = match file.config {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "scenario skipped");
                    let name = file
                        .path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("unknown")
                        .to_string();
                    handles.push((
                        index,
                        None,
                        Some(ScenarioReport {
                            name,
                            outcome: ScenarioOutcome::Skipped,
                            verifications: Vec::new(),
                            error: Some(e.to_string()),
                            duration_ms: 0,
                        }),
                    ));
                    continue;
                }
            };

            let runner = self.clone();
            let semaphore = semaphore.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                runner.run_scenario(config).await
            });
            handles.push((index, Some(handle), None));
        }

        let mut reports: Vec<(usize, ScenarioReport)> = Vec::new();
        for (index, handle, skipped) in handles {
            let report = match (handle, skipped) {
                (Some(handle), _) => match handle.await {
                    Ok(report) => report,
                    Err(e) => ScenarioReport {
                        name: format!("scenario-{index}"),
                        outcome: ScenarioOutcome::Errored,
                        verifications: Vec::new(),
                        error: Some(format!("task panicked: {e}")),
                        duration_ms: 0,
                    },
                },
                (None, Some(report)) => report,
                (None, None) => unreachable!("handle or skip report always present"),
            };
            reports.push((index, report));
        }
        reports.sort_by_key(|(index, _)| *index);

        SuiteReport {
            reports: reports.into_iter().map(|(_, report)| report).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_device_locks_serialize_shared_devices() {
        let locks = Arc::new(DeviceLocks::new());
        let shared = vec![DeviceId::new("sw-leaf1"), DeviceId::new("sw-leaf2")];

        let guards = locks.acquire(&shared).await;
        assert_eq!(guards.len(), 2);

        // A second acquirer of an overlapping set must wait.
        let locks2 = locks.clone();
        let contender = tokio::spawn(async move {
            locks2.acquire(&[DeviceId::new("sw-leaf2")]).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guards);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_device_locks_dedup_repeated_device() {
        let locks = DeviceLocks::new();
        let guards = locks
            .acquire(&[DeviceId::new("sw-leaf1"), DeviceId::new("sw-leaf1")])
            .await;
        assert_eq!(guards.len(), 1);
    }

    #[test]
    fn test_suite_report_counts() {
        let report = |outcome| ScenarioReport {
            name: "s".to_string(),
            outcome,
            verifications: Vec::new(),
            error: None,
            duration_ms: 0,
        };
        let suite = SuiteReport {
            reports: vec![
                report(ScenarioOutcome::Passed),
                report(ScenarioOutcome::Failed),
                report(ScenarioOutcome::Skipped),
            ],
        };
        assert_eq!(suite.passed(), 1);
        assert_eq!(suite.failed(), 2);
        assert!(!suite.all_passed());
    }
}
