//! Per-device session table with serialized command issuance.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{info, warn};

use lacplab_types::{DeviceId, LabError, LabResult};

use crate::session::Session;
use crate::transport::Transport;

/// Timeouts for session establishment and command exchange.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Deadline for opening a session.
    pub connect_timeout: Duration,
    /// Deadline for one command round trip.
    pub command_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(10),
        }
    }
}

/// The per-device session table.
///
/// CLI sessions are not safe for concurrent command issuance, so each
/// device's session sits behind an async mutex: a second caller needing
/// the same device blocks until the in-flight command completes.
/// Different devices proceed independently.
pub struct SessionRegistry {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    sessions: DashMap<DeviceId, Arc<Mutex<Session>>>,
}

impl SessionRegistry {
    /// Creates a registry over the given transport.
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        SessionRegistry {
            transport,
            config,
            sessions: DashMap::new(),
        }
    }

    /// Opens a session to `device` at `address`.
    ///
    /// Fails with a connection error if the device is unreachable
    /// within the configured connect timeout. Reopening an already open
    /// device replaces the previous session.
    pub async fn open(&self, device: &DeviceId, address: &str) -> LabResult<()> {
        let channel = timeout(
            self.config.connect_timeout,
            self.transport.connect(device, address),
        )
        .await
        .map_err(|_| {
            LabError::connection(
                device.as_str(),
                format!(
                    "connect to {address} timed out after {:?}",
                    self.config.connect_timeout
                ),
            )
        })??;

        info!(device = %device, address, "session open");
        let session = Session::new(device.clone(), channel);
        if let Some(previous) = self
            .sessions
            .insert(device.clone(), Arc::new(Mutex::new(session)))
        {
            let mut previous = previous.lock().await;
            if let Err(e) = previous.close().await {
                warn!(device = %device, error = %e, "failed to close replaced session");
            }
        }
        Ok(())
    }

    /// Returns true if a session to `device` is open.
    pub fn is_open(&self, device: &DeviceId) -> bool {
        self.sessions.contains_key(device)
    }

    /// Sends one command on the device's session and returns the raw
    /// response.
    ///
    /// Holds the device's session lock for the full round trip, so at
    /// most one command is in flight per device. The configured command
    /// timeout bounds the exchange; on expiry the error is
    /// connection-class (retryable).
    pub async fn send(&self, device: &DeviceId, command: &str) -> LabResult<String> {
        let session = self
            .sessions
            .get(device)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LabError::connection(device.as_str(), "no open session"))?;

        let mut session = session.lock().await;
        timeout(self.config.command_timeout, session.send(command))
            .await
            .map_err(|_| {
                LabError::connection(
                    device.as_str(),
                    format!(
                        "command '{command}' timed out after {:?}",
                        self.config.command_timeout
                    ),
                )
            })?
    }

    /// Closes the device's session if one is open.
    pub async fn close(&self, device: &DeviceId) -> LabResult<()> {
        if let Some((_, session)) = self.sessions.remove(device) {
            let mut session = session.lock().await;
            session.close().await?;
        }
        Ok(())
    }

    /// Closes every open session. Failures are logged, not propagated:
    /// closing must release everything it can.
    pub async fn close_all(&self) {
        let devices: Vec<DeviceId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for device in devices {
            if let Err(e) = self.close(&device).await {
                warn!(device = %device, error = %e, "failed to close session");
            }
        }
    }
}
