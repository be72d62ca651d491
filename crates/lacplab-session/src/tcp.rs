//! TCP transport for prompt-driven device CLIs.
//!
//! Speaks the line protocol lab devices and terminal servers expose:
//! send a command line, read until the device prints its prompt again,
//! return everything in between. Authentication, if the device needs
//! it, is expected to be handled by the jump host the address points
//! at; this transport only does the command/response exchange.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::trace;

use lacplab_types::{DeviceId, LabError, LabResult};

use crate::transport::{Channel, Transport};

/// Default prompt suffix marking end-of-response.
const DEFAULT_PROMPT: &str = "# ";

/// Transport that connects to devices over plain TCP.
pub struct TcpTransport {
    prompt: String,
}

impl TcpTransport {
    /// Creates a transport expecting the default `# ` prompt suffix.
    pub fn new() -> Self {
        TcpTransport {
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    /// Overrides the prompt suffix used to detect end-of-response.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        TcpTransport {
            prompt: prompt.into(),
        }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        TcpTransport::new()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, device: &DeviceId, address: &str) -> LabResult<Box<dyn Channel>> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| LabError::connection(device.as_str(), format!("connect {address}: {e}")))?;
        Ok(Box::new(TcpChannel {
            device: device.clone(),
            stream: Some(stream),
            prompt: self.prompt.clone(),
        }))
    }
}

#[derive(Debug)]
struct TcpChannel {
    device: DeviceId,
    stream: Option<TcpStream>,
    prompt: String,
}

/// Strips the echoed command and the trailing prompt line from a raw
/// exchange buffer.
fn extract_response(prompt: &str, command: &str, buffer: &str) -> String {
    let mut lines: Vec<&str> = buffer.lines().collect();
    if lines.first().map(|l| l.trim_end()) == Some(command) {
        lines.remove(0);
    }
    if lines
        .last()
        .map_or(false, |l| l.trim_end().ends_with(prompt))
    {
        lines.pop();
    }
    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

#[async_trait]
impl Channel for TcpChannel {
    async fn exchange(&mut self, command: &str) -> LabResult<String> {
        let device = self.device.clone();
        let prompt = self.prompt.trim_end().to_string();
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| LabError::connection(device.as_str(), "channel closed"))?;

        stream
            .write_all(format!("{command}\n").as_bytes())
            .await
            .map_err(|e| LabError::connection(device.as_str(), format!("write: {e}")))?;

        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream
                .read(&mut chunk)
                .await
                .map_err(|e| LabError::connection(device.as_str(), format!("read: {e}")))?;
            if n == 0 {
                return Err(LabError::connection(
                    device.as_str(),
                    "session closed by peer",
                ));
            }
            buffer.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buffer);
            if text.trim_end().ends_with(&prompt) {
                trace!(device = %device, bytes = buffer.len(), "response complete");
                return Ok(extract_response(&prompt, command, &text));
            }
        }
    }

    async fn close(&mut self) -> LabResult<()> {
        if let Some(mut stream) = self.stream.take() {
            // Shutdown failures do not matter; the socket is dropped
            // either way and the transport is released.
            let _ = stream.shutdown().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Minimal prompt-speaking device: echoes the command, prints a
    /// fixed body, then the prompt.
    async fn fake_device(listener: TcpListener, body: &'static str) {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let n = sock.read(&mut buf).await.unwrap();
        let command = String::from_utf8_lossy(&buf[..n]).trim_end().to_string();
        let reply = format!("{command}\n{body}sw-leaf1# ");
        sock.write_all(reply.as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange_strips_echo_and_prompt() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(fake_device(listener, "Eth1/1     connected\n"));

        let transport = TcpTransport::new();
        let mut channel = transport
            .connect(&DeviceId::new("sw-leaf1"), &addr)
            .await
            .unwrap();
        let raw = channel.exchange("show interfaces status").await.unwrap();
        assert_eq!(raw, "Eth1/1     connected\n");
        channel.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        let transport = TcpTransport::new();
        // Bind and drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = transport
            .connect(&DeviceId::new("sw-leaf1"), &addr)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_peer_close_mid_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            drop(sock);
        });

        let transport = TcpTransport::new();
        let mut channel = transport
            .connect(&DeviceId::new("sw-leaf1"), &addr)
            .await
            .unwrap();
        let err = channel.exchange("show version").await.unwrap_err();
        assert!(matches!(err, LabError::Connection { .. }));
    }
}
