use std::sync::Arc;

use domain::{ConnectionState, DomainError, PortHandle};
use tokio::sync::Mutex;

/// State and held transport, always changed together so that a held transport
/// implies `Open` or `Closing` and no transport implies `Disconnected`.
#[derive(Default)]
struct Session {
    state: ConnectionState,
    transport: Option<PortHandle>,
}

/// Session shared between the manager, the read loop and the write dispatcher
#[derive(Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    pub async fn transport(&self) -> Option<PortHandle> {
        self.inner.lock().await.transport.clone()
    }

    /// The transport, but only while the session is `Open`
    pub async fn open_transport(&self) -> Option<PortHandle> {
        let session = self.inner.lock().await;
        if session.state.is_open() {
            session.transport.clone()
        } else {
            None
        }
    }

    /// Whether `port` is the held transport and the session is `Open`
    pub async fn is_open_with(&self, port: &PortHandle) -> bool {
        let session = self.inner.lock().await;
        session.state.is_open()
            && session
                .transport
                .as_ref()
                .is_some_and(|held| Arc::ptr_eq(held, port))
    }

    /// Start a fresh session holding `port`
    pub async fn begin(&self, port: PortHandle) -> Result<(), DomainError> {
        let mut session = self.inner.lock().await;
        let next = session.state.to_open().map_err(|reason| {
            DomainError::OpenFailed(format!("{}: {}", port.name(), reason))
        })?;
        session.state = next;
        session.transport = Some(port);
        Ok(())
    }

    /// Move `Open` to `Closing` and hand back the transport to tear down.
    /// `None` when there is nothing to close or a teardown is already running.
    pub async fn begin_closing(&self) -> Option<PortHandle> {
        let mut session = self.inner.lock().await;
        let next = session.state.to_closing().ok()?;
        session.state = next;
        session.transport.clone()
    }

    /// End the session whatever its state, returning the transport it held
    pub async fn end(&self) -> Option<PortHandle> {
        let mut session = self.inner.lock().await;
        session.state = session.state.to_disconnected();
        session.transport.take()
    }

    /// End the session only if it is `Open` on exactly `port` (pointer identity).
    /// Used for physical disconnects, which an orderly teardown already covers.
    pub async fn end_if_current(&self, port: &PortHandle) -> bool {
        let mut session = self.inner.lock().await;
        let current = session.state.is_open()
            && session
                .transport
                .as_ref()
                .is_some_and(|held| Arc::ptr_eq(held, port));

        if current {
            session.state = session.state.to_disconnected();
            session.transport = None;
        }
        current
    }
}
