//! Scenario configuration files.
//!
//! A scenario is a YAML document: the devices it touches, three command
//! phases (setup, run, cleanup), and the invariants verified between
//! run and cleanup. Example:
//!
//! ```yaml
//! name: bundle-member-remove
//! devices:
//!   - name: sw-leaf1
//!     address: 10.0.0.1:9001
//!   - name: sw-leaf2
//!     address: 10.0.0.2:9001
//! setup:
//!   - device: sw-leaf1
//!     op: create-bundle
//!     bundle: 1
//! run:
//!   - device: sw-leaf1
//!     op: remove-member
//!     port: Eth1/2
//! verify:
//!   - check: bundle-state
//!     device: sw-leaf1
//!     bundle: 1
//!     state: partial
//!     converge: true
//! cleanup:
//!   - device: sw-leaf1
//!     op: add-member
//!     port: Eth1/2
//!     bundle: 1
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use lacplab_types::{Bandwidth, BundleId, DeviceId, LabError, LabResult, PortName, SystemId};
use lacplab_verify::Invariant;

use crate::commands;

/// One managed device in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Configured device name, the neighbor-table correlation key.
    pub name: DeviceId,
    /// Management endpoint the transport connects to.
    pub address: String,
}

/// A configuration intent, rendered to CLI lines by [`commands`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum StepAction {
    /// Create an aggregate interface.
    CreateBundle { bundle: BundleId },
    /// Delete an aggregate interface.
    DeleteBundle { bundle: BundleId },
    /// Attach a port to an aggregate in active mode.
    AddMember { port: PortName, bundle: BundleId },
    /// Detach a port from its aggregate.
    RemoveMember { port: PortName },
    /// Change the device's LACP system ID.
    SetSystemId { system_id: SystemId },
    /// Set the minimum-links floor on an aggregate.
    SetMinLinks { bundle: BundleId, min_links: usize },
    /// Pin a port to a fixed speed (CLI notation, e.g. "10G").
    SetPortSpeed { port: PortName, speed: String },
    /// Administratively disable a port.
    ShutdownPort { port: PortName },
    /// Re-enable a port.
    EnablePort { port: PortName },
    /// Pause between configuration changes.
    Wait { millis: u64 },
    /// Escape hatch: send a literal command line.
    Raw { command: String },
}

impl StepAction {
    /// Renders the action to the CLI lines sent to the device.
    ///
    /// [`StepAction::Wait`] renders to nothing; the runner handles it.
    pub fn render(&self) -> LabResult<Vec<String>> {
        Ok(match self {
            StepAction::CreateBundle { bundle } => commands::create_bundle(*bundle),
            StepAction::DeleteBundle { bundle } => commands::delete_bundle(*bundle),
            StepAction::AddMember { port, bundle } => commands::add_member(port, *bundle),
            StepAction::RemoveMember { port } => commands::remove_member(port),
            StepAction::SetSystemId { system_id } => commands::set_system_id(system_id),
            StepAction::SetMinLinks { bundle, min_links } => {
                commands::set_min_links(*bundle, *min_links)
            }
            StepAction::SetPortSpeed { port, speed } => {
                commands::set_port_speed(port, Bandwidth::parse_cli(speed)?)
            }
            StepAction::ShutdownPort { port } => commands::shutdown_port(port),
            StepAction::EnablePort { port } => commands::enable_port(port),
            StepAction::Wait { .. } => Vec::new(),
            StepAction::Raw { command } => vec![command.clone()],
        })
    }
}

/// One scenario step: an action addressed to a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Target device. Ignored by [`StepAction::Wait`].
    pub device: DeviceId,
    /// What to do there.
    #[serde(flatten)]
    pub action: StepAction,
}

/// An invariant plus whether it is expected to converge over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyCheck {
    /// The condition to verify.
    #[serde(flatten)]
    pub invariant: Invariant,
    /// When true the check polls fresh state until the invariant holds
    /// or the budget elapses; when false it is evaluated once against
    /// the post-run snapshot.
    #[serde(default)]
    pub converge: bool,
}

/// Retry bounds for retryable (connection-class) step failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per command, including the first.
    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts, milliseconds.
    #[serde(default = "RetryConfig::default_backoff_ms")]
    pub backoff_ms: u64,
}

impl RetryConfig {
    fn default_max_attempts() -> u32 {
        3
    }

    fn default_backoff_ms() -> u64 {
        100
    }

    /// Delay between attempts.
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: Self::default_max_attempts(),
            backoff_ms: Self::default_backoff_ms(),
        }
    }
}

/// A complete scenario definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Scenario name, unique within a suite.
    pub name: String,
    /// Optional free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Devices the scenario touches. Locked for the scenario's duration.
    pub devices: Vec<DeviceConfig>,
    /// Retry bounds for connection-class failures.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Poll budget for `converge: true` checks, seconds.
    #[serde(default = "ScenarioConfig::default_verify_timeout_secs")]
    pub verify_timeout_secs: u64,
    /// Commands establishing the scenario's starting state.
    #[serde(default)]
    pub setup: Vec<Step>,
    /// The change under test.
    #[serde(default)]
    pub run: Vec<Step>,
    /// Conditions checked after the run phase.
    #[serde(default)]
    pub verify: Vec<VerifyCheck>,
    /// Commands restoring the devices. Executed exactly once on every
    /// terminal path, including failures and errors.
    #[serde(default)]
    pub cleanup: Vec<Step>,
}

impl ScenarioConfig {
    fn default_verify_timeout_secs() -> u64 {
        10
    }

    /// Poll budget for convergence checks.
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }

    /// Parses a scenario from YAML text.
    pub fn from_yaml(text: &str) -> LabResult<Self> {
        let config: ScenarioConfig = serde_yaml::from_str(text)
            .map_err(|e| LabError::internal(format!("invalid scenario: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a scenario file.
    pub fn load(path: &Path) -> LabResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Checks internal consistency: every step and invariant must name
    /// a declared device.
    fn validate(&self) -> LabResult<()> {
        if self.devices.is_empty() {
            return Err(LabError::internal(format!(
                "scenario '{}' declares no devices",
                self.name
            )));
        }
        let known = |id: &DeviceId| self.devices.iter().any(|d| &d.name == id);
        for step in self
            .setup
            .iter()
            .chain(self.run.iter())
            .chain(self.cleanup.iter())
        {
            if !matches!(step.action, StepAction::Wait { .. }) && !known(&step.device) {
                return Err(LabError::internal(format!(
                    "scenario '{}': step targets undeclared device '{}'",
                    self.name, step.device
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lacplab_types::BundleState;

    const SCENARIO: &str = r#"
name: bundle-member-remove
devices:
  - name: sw-leaf1
    address: 10.0.0.1:9001
setup:
  - device: sw-leaf1
    op: create-bundle
    bundle: 1
run:
  - device: sw-leaf1
    op: remove-member
    port: Eth1/2
verify:
  - check: bundle-state
    device: sw-leaf1
    bundle: 1
    state: partial
    converge: true
cleanup:
  - device: sw-leaf1
    op: add-member
    port: Eth1/2
    bundle: 1
"#;

    #[test]
    fn test_parse_scenario_yaml() {
        let config = ScenarioConfig::from_yaml(SCENARIO).unwrap();
        assert_eq!(config.name, "bundle-member-remove");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(
            config.run[0].action,
            StepAction::RemoveMember {
                port: PortName::new("Eth1/2")
            }
        );
        let check = &config.verify[0];
        assert!(check.converge);
        assert_eq!(
            check.invariant,
            Invariant::BundleState {
                device: DeviceId::new("sw-leaf1"),
                bundle: BundleId(1),
                state: BundleState::Partial,
            }
        );
    }

    #[test]
    fn test_undeclared_device_rejected() {
        let bad = SCENARIO.replace("device: sw-leaf1\n    op: remove-member", "device: sw-ghost\n    op: remove-member");
        let err = ScenarioConfig::from_yaml(&bad).unwrap_err();
        assert!(err.to_string().contains("sw-ghost"));
    }

    #[test]
    fn test_wait_step_renders_to_nothing() {
        let action = StepAction::Wait { millis: 250 };
        assert!(action.render().unwrap().is_empty());
    }

    #[test]
    fn test_speed_step_rejects_garbage() {
        let action = StepAction::SetPortSpeed {
            port: PortName::new("Eth1/1"),
            speed: "warp9".to_string(),
        };
        assert!(action.render().is_err());
    }
}
