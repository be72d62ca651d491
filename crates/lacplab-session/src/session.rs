//! One open CLI session with error-banner classification.

use tracing::debug;

use lacplab_types::{DeviceId, LabError, LabResult};

use crate::transport::Channel;

/// Banner prefixes devices print when they reject a command.
const ERROR_BANNERS: [&str; 4] = ["% ", "%Error", "ERROR:", "Invalid input"];

/// Returns the first error-banner line in a response, if any.
fn find_error_banner(raw: &str) -> Option<&str> {
    raw.lines().map(str::trim_start).find(|line| {
        ERROR_BANNERS
            .iter()
            .any(|banner| line.starts_with(banner))
    })
}

/// An open command session to one device.
///
/// A `Session` classifies responses: a delivered response containing an
/// error banner is a command rejection
/// ([`LabError::Command`]), while a transport failure is a connection
/// error. Dropping the session releases the channel; [`close`](Session::close)
/// does the same explicitly and makes later sends fail fast.
pub struct Session {
    device: DeviceId,
    channel: Box<dyn Channel>,
    closed: bool,
}

impl Session {
    /// Wraps an established channel.
    pub fn new(device: DeviceId, channel: Box<dyn Channel>) -> Self {
        Session {
            device,
            channel,
            closed: false,
        }
    }

    /// Returns the device this session talks to.
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Sends one command and returns the raw response text.
    pub async fn send(&mut self, command: &str) -> LabResult<String> {
        if self.closed {
            return Err(LabError::connection(
                self.device.as_str(),
                "session is closed",
            ));
        }
        debug!(device = %self.device, command, "sending command");
        let raw = self.channel.exchange(command).await?;
        if let Some(banner) = find_error_banner(&raw) {
            return Err(LabError::command(self.device.as_str(), command, banner));
        }
        Ok(raw)
    }

    /// Closes the session, releasing the underlying transport.
    ///
    /// Safe to call more than once; only the first call reaches the
    /// channel.
    pub async fn close(&mut self) -> LabResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.channel.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct FixedChannel {
        response: String,
        closed: bool,
    }

    #[async_trait]
    impl Channel for FixedChannel {
        async fn exchange(&mut self, _command: &str) -> LabResult<String> {
            Ok(self.response.clone())
        }

        async fn close(&mut self) -> LabResult<()> {
            self.closed = true;
            Ok(())
        }
    }

    fn session_with(response: &str) -> Session {
        Session::new(
            DeviceId::new("sw-leaf1"),
            Box::new(FixedChannel {
                response: response.to_string(),
                closed: false,
            }),
        )
    }

    #[tokio::test]
    async fn test_clean_response_passes_through() {
        let mut s = session_with("Port  Status\nEth1/1 connected\n");
        let raw = s.send("show interfaces status").await.unwrap();
        assert!(raw.contains("Eth1/1"));
    }

    #[tokio::test]
    async fn test_error_banner_is_command_rejection() {
        let mut s = session_with("% Invalid input detected at '^' marker.\n");
        let err = s.send("interface Po9999").await.unwrap_err();
        assert!(matches!(err, LabError::Command { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_send_after_close_fails_as_connection() {
        let mut s = session_with("ok\n");
        s.close().await.unwrap();
        let err = s.send("show version").await.unwrap_err();
        assert!(matches!(err, LabError::Connection { .. }));
        // Second close is a no-op.
        s.close().await.unwrap();
    }
}
