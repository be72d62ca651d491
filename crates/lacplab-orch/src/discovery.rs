//! The live discovery pass.
//!
//! Discovery issues every command family to every device, parses the
//! responses, and feeds the topology builder. It is the bridge between
//! the session layer and the model: the orchestrator and the verifier
//! both see device state only through snapshots produced here.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use lacplab_parse::{parse, CommandFamily};
use lacplab_session::SessionRegistry;
use lacplab_topology::{Topology, TopologyBuilder};
use lacplab_types::{DeviceId, LabResult};
use lacplab_verify::StateProbe;

use crate::audit::{AuditRecord, AuditSink};
use crate::config::DeviceConfig;

/// Runs discovery passes over a fixed device set and accumulates the
/// results into a topology builder.
pub struct Discoverer {
    scenario: String,
    registry: Arc<SessionRegistry>,
    devices: Vec<DeviceConfig>,
    builder: Mutex<TopologyBuilder>,
    sink: Arc<dyn AuditSink>,
}

/// Families whose output is informational: a malformed response
/// degrades to a warning instead of failing discovery. The LACP
/// families are the scenario's subject and stay required.
fn is_optional(family: CommandFamily) -> bool {
    matches!(
        family,
        CommandFamily::InterfaceStatus | CommandFamily::NeighborTable
    )
}

impl Discoverer {
    /// Creates a discoverer over the given devices.
    pub fn new(
        scenario: impl Into<String>,
        registry: Arc<SessionRegistry>,
        devices: Vec<DeviceConfig>,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        let mut builder = TopologyBuilder::new();
        for device in &devices {
            builder.register_device(device.name.clone(), device.address.clone());
        }
        Discoverer {
            scenario: scenario.into(),
            registry,
            devices,
            builder: Mutex::new(builder),
            sink,
        }
    }

    /// Opens a session to every device.
    pub async fn connect_all(&self) -> LabResult<()> {
        for device in &self.devices {
            self.registry.open(&device.name, &device.address).await?;
        }
        Ok(())
    }

    /// Runs one full discovery pass over every device.
    ///
    /// A device that cannot be reached is marked stale and the error
    /// propagates; the caller decides whether to retry the pass.
    pub async fn discover_all(&self) -> LabResult<()> {
        for device in &self.devices {
            if let Err(e) = self.discover_device(&device.name).await {
                if e.is_retryable() {
                    self.builder.lock().await.mark_stale(&device.name);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Issues every command family to one device and ingests the
    /// results.
    pub async fn discover_device(&self, device: &DeviceId) -> LabResult<()> {
        for family in CommandFamily::all() {
            let command = family.command();
            let raw = self.registry.send(device, command).await?;
            self.sink
                .record(AuditRecord::command(&self.scenario, device, command, &raw));

            match parse(family, &raw) {
                Ok(records) => {
                    debug!(device = %device, family = %family, records = records.len(), "parsed");
                    self.sink.record(AuditRecord::parse(
                        &self.scenario,
                        device,
                        family.as_str(),
                        &format!("parsed {} record(s)", records.len()),
                    ));
                    self.builder
                        .lock()
                        .await
                        .ingest_family(device, family, &records)?;
                }
                Err(e) if e.is_parse() && is_optional(family) => {
                    // Last good batch for this family stays in place.
                    warn!(device = %device, family = %family, error = %e, "optional output unparsable");
                    self.sink.record(AuditRecord::parse(
                        &self.scenario,
                        device,
                        family.as_str(),
                        &e.to_string(),
                    ));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Returns the current topology snapshot.
    pub async fn snapshot(&self) -> Topology {
        self.builder.lock().await.snapshot()
    }

    /// Runs a discovery pass and returns the resulting snapshot.
    pub async fn discover_snapshot(&self) -> LabResult<Topology> {
        self.discover_all().await?;
        Ok(self.snapshot().await)
    }

    /// Closes every session this discoverer's registry holds.
    pub async fn close_all(&self) {
        self.registry.close_all().await;
    }

    /// Sends arbitrary command lines to one device, recording each
    /// round trip.
    pub async fn send_lines(&self, device: &DeviceId, lines: &[String]) -> LabResult<()> {
        for line in lines {
            let raw = self.registry.send(device, line).await?;
            self.sink
                .record(AuditRecord::command(&self.scenario, device, line, &raw));
        }
        Ok(())
    }
}

#[async_trait]
impl StateProbe for Discoverer {
    async fn refresh(&self) -> LabResult<Topology> {
        self.discover_snapshot().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemorySink;
    use lacplab_session::{ScriptedTransport, SessionConfig, Transport};
    use lacplab_types::BundleId;

    fn leaf1() -> DeviceConfig {
        DeviceConfig {
            name: DeviceId::new("sw-leaf1"),
            address: "10.0.0.1:9001".to_string(),
        }
    }

    fn script_healthy(transport: &ScriptedTransport) {
        transport.set_response(
            "sw-leaf1",
            "show interfaces status",
            "Eth1/1  x  connected  1  a-full  a-10G  T\nEth1/2  x  connected  1  a-full  a-10G  T\n",
        );
        transport.set_response(
            "sw-leaf1",
            "show port-channel summary",
            "1  Po1(SU)  LACP  Eth1/1(P) Eth1/2(P)\n",
        );
        transport.set_response(
            "sw-leaf1",
            "show lacp interfaces",
            "Po1  Eth1/1  SA  bundled  32768,00:1c:73:aa:bb:01  10 Gbps\n",
        );
        transport.set_response("sw-leaf1", "show lldp neighbors", "");
    }

    async fn discoverer(transport: Arc<ScriptedTransport>) -> Discoverer {
        let registry = Arc::new(SessionRegistry::new(
            transport as Arc<dyn Transport>,
            SessionConfig::default(),
        ));
        let d = Discoverer::new(
            "test",
            registry,
            vec![leaf1()],
            Arc::new(MemorySink::new()),
        );
        d.connect_all().await.unwrap();
        d
    }

    #[tokio::test]
    async fn test_discovery_builds_topology() {
        let transport = Arc::new(ScriptedTransport::new());
        script_healthy(&transport);
        let d = discoverer(transport).await;

        let topo = d.discover_snapshot().await.unwrap();
        let dev = topo.device(&DeviceId::new("sw-leaf1")).unwrap();
        assert_eq!(dev.ports.len(), 2);
        let bundle = dev.bundles.get(&BundleId(1)).unwrap();
        assert_eq!(bundle.bundled_count(), 2);
    }

    #[tokio::test]
    async fn test_optional_family_garbage_degrades_to_warning() {
        let transport = Arc::new(ScriptedTransport::new());
        script_healthy(&transport);
        transport.set_response("sw-leaf1", "show lldp neighbors", "!! firmware debug spew !!\n");

        let registry = Arc::new(SessionRegistry::new(
            transport.clone() as Arc<dyn Transport>,
            SessionConfig::default(),
        ));
        let sink = Arc::new(MemorySink::new());
        let d = Discoverer::new("test", registry, vec![leaf1()], sink.clone());
        d.connect_all().await.unwrap();

        let topo = d.discover_snapshot().await.unwrap();
        assert!(topo.device(&DeviceId::new("sw-leaf1")).is_some());
        let records = sink.records();
        // The failed family carries the parse failure text.
        assert!(records.iter().any(|r| {
            r.command.as_deref() == Some("neighbor-table")
                && r.detail.as_deref().is_some_and(|d| d.contains("Unrecognized"))
        }));
        // The families that parsed report their record counts.
        assert!(records.iter().any(|r| {
            r.command.as_deref() == Some("lacp-bundle-status")
                && r.detail.as_deref() == Some("parsed 1 record(s)")
        }));
    }

    #[tokio::test]
    async fn test_required_family_garbage_fails_discovery() {
        let transport = Arc::new(ScriptedTransport::new());
        script_healthy(&transport);
        transport.set_response("sw-leaf1", "show port-channel summary", "!! garbage !!\n");
        let d = discoverer(transport).await;

        let err = d.discover_all().await.unwrap_err();
        assert!(err.is_parse());
    }

    #[tokio::test]
    async fn test_unreachable_device_marked_stale() {
        let transport = Arc::new(ScriptedTransport::new());
        script_healthy(&transport);
        let d = discoverer(transport.clone()).await;
        d.discover_all().await.unwrap();

        transport.set_unreachable("sw-leaf1", true);
        assert!(d.discover_all().await.is_err());
        let topo = d.snapshot().await;
        assert!(topo.device(&DeviceId::new("sw-leaf1")).unwrap().is_stale());
    }
}
