//! Scripted in-memory transport for tests.
//!
//! Responses are keyed by (device, command). Unscripted commands
//! succeed with an empty response, which matches how device CLIs
//! acknowledge accepted configuration lines. Tests can queue one-shot
//! responses ahead of the canned ones, mark a device unreachable, make
//! it drop the next N sends, or make it reject specific commands with
//! an error banner.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use lacplab_types::{DeviceId, LabError, LabResult};

use crate::transport::{Channel, Transport};

#[derive(Debug, Default)]
struct DeviceScript {
    unreachable: bool,
    fail_sends: usize,
    canned: HashMap<String, String>,
    queued: HashMap<String, VecDeque<String>>,
    rejected: HashMap<String, String>,
    sent: Vec<String>,
}

/// In-memory transport whose devices answer from a script.
#[derive(Default)]
pub struct ScriptedTransport {
    devices: Mutex<HashMap<String, Arc<Mutex<DeviceScript>>>>,
}

impl ScriptedTransport {
    /// Creates an empty scripted transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self, device: &str) -> Arc<Mutex<DeviceScript>> {
        self.devices
            .lock()
            .expect("script table poisoned")
            .entry(device.to_string())
            .or_default()
            .clone()
    }

    /// Sets the steady-state response for a command on a device.
    pub fn set_response(&self, device: &str, command: &str, response: &str) {
        let script = self.script(device);
        let mut script = script.lock().expect("script poisoned");
        script
            .canned
            .insert(command.to_string(), response.to_string());
    }

    /// Queues a one-shot response, consumed before the canned one.
    pub fn push_response(&self, device: &str, command: &str, response: &str) {
        let script = self.script(device);
        let mut script = script.lock().expect("script poisoned");
        script
            .queued
            .entry(command.to_string())
            .or_default()
            .push_back(response.to_string());
    }

    /// Makes the device reject a command with an error banner.
    pub fn reject_command(&self, device: &str, command: &str) {
        let script = self.script(device);
        let mut script = script.lock().expect("script poisoned");
        script.rejected.insert(
            command.to_string(),
            "% Invalid input detected at '^' marker.\n".to_string(),
        );
    }

    /// Marks the device unreachable: connects are refused and open
    /// sessions drop on the next send.
    pub fn set_unreachable(&self, device: &str, unreachable: bool) {
        let script = self.script(device);
        script.lock().expect("script poisoned").unreachable = unreachable;
    }

    /// Makes the device drop the next `n` sends, then recover.
    pub fn fail_next_sends(&self, device: &str, n: usize) {
        let script = self.script(device);
        script.lock().expect("script poisoned").fail_sends = n;
    }

    /// Returns every command sent to the device, in order.
    pub fn sent_commands(&self, device: &str) -> Vec<String> {
        let script = self.script(device);
        let script = script.lock().expect("script poisoned");
        script.sent.clone()
    }
}

#[derive(Debug)]
struct ScriptedChannel {
    device: DeviceId,
    script: Arc<Mutex<DeviceScript>>,
}

#[async_trait]
impl Channel for ScriptedChannel {
    async fn exchange(&mut self, command: &str) -> LabResult<String> {
        let mut script = self.script.lock().expect("script poisoned");
        script.sent.push(command.to_string());

        if script.fail_sends > 0 {
            script.fail_sends -= 1;
            return Err(LabError::connection(
                self.device.as_str(),
                "session dropped",
            ));
        }
        if script.unreachable {
            return Err(LabError::connection(
                self.device.as_str(),
                "session dropped",
            ));
        }
        if let Some(banner) = script.rejected.get(command) {
            return Ok(banner.clone());
        }
        if let Some(queue) = script.queued.get_mut(command) {
            if let Some(response) = queue.pop_front() {
                return Ok(response);
            }
        }
        Ok(script.canned.get(command).cloned().unwrap_or_default())
    }

    async fn close(&mut self) -> LabResult<()> {
        Ok(())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, device: &DeviceId, _address: &str) -> LabResult<Box<dyn Channel>> {
        let script = self.script(device.as_str());
        if script.lock().expect("script poisoned").unreachable {
            return Err(LabError::connection(device.as_str(), "connection refused"));
        }
        Ok(Box::new(ScriptedChannel {
            device: device.clone(),
            script,
        }))
    }
}
