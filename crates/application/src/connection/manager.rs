use std::sync::Arc;

use domain::port::select_unique;
use domain::{
    ConnectionOptions, ConnectionState, DeviceIdentity, DomainError, PortHandle, PortRegistry,
    PrinterEvent,
};
use tokio::sync::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::read_loop::ReadLoop;
use super::session::SharedSession;
use crate::event::EventBus;
use crate::printer::WriteDispatcher;

/// Owns the printer's transport and drives the connection state machine.
///
/// `Disconnected -> Open` on a successful open, `Open -> Closing -> Disconnected` on
/// [`disconnect`](Self::disconnect), and `Open -> Disconnected` directly when the
/// registry reports the held port physically gone.
pub struct ConnectionManager {
    options: ConnectionOptions,
    registry: Arc<dyn PortRegistry>,
    bus: Arc<EventBus>,
    session: SharedSession,
    read_loop: ReadLoop,
    dispatcher: WriteDispatcher,
    watcher: Mutex<Option<JoinHandle<()>>>,
    watcher_token: CancellationToken,
}

impl ConnectionManager {
    /// Subscribes to the registry's disconnect notices right away.
    /// Must be called from within a tokio runtime.
    pub fn new(
        registry: Arc<dyn PortRegistry>,
        options: ConnectionOptions,
        bus: Arc<EventBus>,
    ) -> Self {
        let session = SharedSession::new();
        let watcher_token = CancellationToken::new();
        let watcher = spawn_disconnect_watcher(
            registry.subscribe_disconnects(),
            session.clone(),
            bus.clone(),
            watcher_token.clone(),
        );

        Self {
            options,
            registry,
            read_loop: ReadLoop::new(session.clone(), bus.clone()),
            dispatcher: WriteDispatcher::new(session.clone()),
            bus,
            session,
            watcher: Mutex::new(Some(watcher)),
            watcher_token,
        }
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Write queue bound to this manager's session
    pub fn dispatcher(&self) -> &WriteDispatcher {
        &self.dispatcher
    }

    pub async fn state(&self) -> ConnectionState {
        self.session.state().await
    }

    /// Identity reported by the held transport
    pub async fn identity(&self) -> Option<DeviceIdentity> {
        self.session
            .transport()
            .await
            .map(|port| DeviceIdentity::from(port.info()))
    }

    /// Ask the registry's chooser for a port and open it.
    /// Failures are logged; success is observable only through the `connected` event.
    pub async fn connect(&self) {
        if let Some(port) = self.session.transport().await {
            warn!(port = %port.name(), "Already connected, ignoring connect request");
            return;
        }

        match self.registry.request_port().await {
            Ok(Some(port)) => {
                if let Err(e) = self.open(port).await {
                    error!(error = %e, "Could not connect");
                }
            }
            Ok(None) => debug!("No port selected"),
            Err(e) => error!(error = %e, "Could not connect"),
        }
    }

    /// Open the one authorized port reporting `identity`; zero or several matches do nothing
    pub async fn reconnect(&self, identity: DeviceIdentity) {
        if !identity.is_complete() {
            debug!(identity = %identity, "Incomplete identity, skipping reconnect");
            return;
        }

        if let Some(port) = self.session.transport().await {
            warn!(port = %port.name(), "Already connected, ignoring reconnect request");
            return;
        }

        let ports = match self.registry.authorized_ports().await {
            Ok(ports) => ports,
            Err(e) => {
                error!(identity = %identity, error = %e, "Could not list authorized ports");
                return;
            }
        };

        let available = ports.len();
        match select_unique(ports, &identity) {
            Some(port) => {
                if let Err(e) = self.open(port).await {
                    error!(identity = %identity, error = %e, "Could not reconnect");
                }
            }
            None => debug!(
                identity = %identity,
                available,
                "No unique authorized port for identity"
            ),
        }
    }

    /// Start a session on `port`. On failure the session is back to `Disconnected`.
    pub async fn open(&self, port: PortHandle) -> Result<(), DomainError> {
        self.session.begin(port.clone()).await?;

        // A loop left over from a session whose device vanished
        self.read_loop.stop().await;

        debug!(
            port = %port.name(),
            baud_rate = self.options.baud_rate(),
            "Opening printer port"
        );

        if let Err(e) = port.open(&self.options).await {
            self.session.end().await;
            warn!(port = %port.name(), error = %e, "Failed to open printer port");
            return Err(e);
        }

        let info = port.info();
        info!(
            port = %port.name(),
            identity = %DeviceIdentity::from(info),
            "Printer connected"
        );
        self.bus.emit(PrinterEvent::connected(info));
        Ok(())
    }

    /// Start the read loop for the current session
    pub async fn listen(&self) -> bool {
        self.read_loop.start().await
    }

    /// Orderly teardown: reader and writer released, then transport closed, then
    /// `disconnected`. Buffers not yet written stay queued.
    ///
    /// A close error is returned after the session has ended and the event was emitted.
    pub async fn disconnect(&self) -> Result<(), DomainError> {
        let Some(port) = self.session.begin_closing().await else {
            if self.session.state().await.is_closing() {
                debug!("Disconnect already in progress");
            } else {
                debug!("Not connected, nothing to disconnect");
            }
            return Ok(());
        };

        debug!(port = %port.name(), "Disconnecting");
        self.read_loop.stop().await;
        // A write in flight finishes; nothing further is popped once `Closing`
        self.dispatcher.wait_idle().await;

        let closed = port.close().await;
        if let Err(e) = &closed {
            warn!(port = %port.name(), error = %e, "Error closing printer port");
        }

        self.session.end().await;
        info!(port = %port.name(), "Printer disconnected");
        self.bus.emit(PrinterEvent::Disconnected);
        closed
    }

    /// Manager teardown: end any session and stop listening for disconnect notices
    pub async fn shutdown(&self) {
        if let Err(e) = self.disconnect().await {
            warn!(error = %e, "Error during shutdown");
        }
        self.watcher_token.cancel();

        let watcher = self.watcher.lock().await.take();
        if let Some(watcher) = watcher {
            if let Err(e) = watcher.await {
                error!(error = %e, "Disconnect watcher failed");
            }
        }
    }

    pub async fn is_listening(&self) -> bool {
        self.read_loop.is_running().await
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.watcher_token.cancel();
    }
}

fn spawn_disconnect_watcher(
    mut notices: broadcast::Receiver<PortHandle>,
    session: SharedSession,
    bus: Arc<EventBus>,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                notice = notices.recv() => match notice {
                    Ok(port) => {
                        // The device is already gone: no read-loop cancellation, no close
                        if session.end_if_current(&port).await {
                            warn!(port = %port.name(), "Printer physically disconnected");
                            bus.emit(PrinterEvent::Disconnected);
                        } else {
                            debug!(port = %port.name(), "Ignoring disconnect of another port");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed disconnect notices");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Port registry closed its disconnect channel");
                        break;
                    }
                }
            }
        }
    })
}
