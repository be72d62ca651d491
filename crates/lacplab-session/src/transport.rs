//! Transport abstraction for device command channels.

use async_trait::async_trait;

use lacplab_types::{DeviceId, LabResult};

/// An established command channel to one device.
///
/// Implementations exchange one command for one raw text response and
/// release the underlying resource on [`close`](Channel::close) or on
/// drop, whichever comes first.
#[async_trait]
pub trait Channel: Send + std::fmt::Debug {
    /// Sends one command and returns the raw response text.
    ///
    /// Fails with a connection-class error if the channel drops; error
    /// banners inside an otherwise delivered response are classified by
    /// [`Session`](crate::Session), not here.
    async fn exchange(&mut self, command: &str) -> LabResult<String>;

    /// Releases the underlying transport.
    async fn close(&mut self) -> LabResult<()>;
}

/// Factory for device command channels.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens a channel to the device at `address`.
    ///
    /// Implementations do not time out on their own; the caller wraps
    /// this in its configured connect timeout.
    async fn connect(&self, device: &DeviceId, address: &str) -> LabResult<Box<dyn Channel>>;
}
