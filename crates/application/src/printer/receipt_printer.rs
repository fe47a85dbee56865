use std::sync::Arc;

use bytes::Bytes;
use domain::{
    ConnectionOptions, ConnectionOptionsOverride, ConnectionState, DeviceIdentity, DomainError,
    EventName, PortRegistry, PrinterEvent,
};
use tracing::{info, warn};

use super::dispatcher::{DispatchHandle, WriteDispatcher};
use crate::connection::ConnectionManager;
use crate::event::EventBus;

/// Serial receipt printer: one connection, one write queue, one event bus.
///
/// Command bytes are opaque; building ESC/POS and parsing replies happen elsewhere.
pub struct ReceiptPrinter {
    manager: ConnectionManager,
    bus: Arc<EventBus>,
}

impl ReceiptPrinter {
    /// Must be called from within a tokio runtime.
    pub fn new(
        registry: Arc<dyn PortRegistry>,
        overrides: ConnectionOptionsOverride,
    ) -> Result<Self, DomainError> {
        let options = ConnectionOptions::with_overrides(overrides)?;
        let bus = Arc::new(EventBus::new());
        let manager = ConnectionManager::new(registry, options, bus.clone());

        Ok(Self { manager, bus })
    }

    fn dispatcher(&self) -> &WriteDispatcher {
        self.manager.dispatcher()
    }

    pub fn options(&self) -> &ConnectionOptions {
        self.manager.options()
    }

    pub async fn state(&self) -> ConnectionState {
        self.manager.state().await
    }

    pub async fn identity(&self) -> Option<DeviceIdentity> {
        self.manager.identity().await
    }

    pub async fn connect(&self) {
        self.manager.connect().await;
    }

    pub async fn reconnect(&self, identity: DeviceIdentity) {
        self.manager.reconnect(identity).await;
    }

    pub async fn disconnect(&self) {
        if let Err(e) = self.manager.disconnect().await {
            warn!(error = %e, "Disconnect finished with an error");
        }
    }

    pub async fn listen(&self) -> bool {
        self.manager.listen().await
    }

    pub async fn is_listening(&self) -> bool {
        self.manager.is_listening().await
    }

    /// Queue one command buffer. Returns once queued, not once written.
    pub async fn print(&self, buffer: impl Into<Bytes>) -> Option<DispatchHandle> {
        self.dispatcher().submit(buffer.into()).await
    }

    /// Retry dispatching buffers left queued by a failed write or a closed port
    pub async fn flush(&self) -> Option<DispatchHandle> {
        self.dispatcher().flush().await
    }

    pub async fn pending(&self) -> usize {
        self.dispatcher().pending().await
    }

    pub fn add_event_listener<F>(&self, name: EventName, handler: F)
    where
        F: Fn(&PrinterEvent) + Send + Sync + 'static,
    {
        self.bus.on(name, handler);
    }

    /// End the session, stop watching for disconnects and drop unsent buffers
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;

        let dropped = self.dispatcher().clear().await;
        if dropped > 0 {
            warn!(dropped, "Discarded queued command buffers");
        }
        info!("Receipt printer shut down");
    }
}
