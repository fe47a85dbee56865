use std::sync::Arc;
use std::time::Duration;

use domain::port::{PortReader, ReadChunk};
use domain::{DomainError, PrinterEvent};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::session::SharedSession;
use crate::event::EventBus;

/// Pause before taking a new reader after a read error or a stream end
const READ_RETRY_DELAY: Duration = Duration::from_millis(50);

struct ActiveLoop {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

enum ReadExit {
    Ended,
    Cancelled,
    Failed(DomainError),
}

/// Background task draining the transport's readable side into `data` events
pub struct ReadLoop {
    session: SharedSession,
    bus: Arc<EventBus>,
    active: Mutex<Option<ActiveLoop>>,
}

impl ReadLoop {
    pub fn new(session: SharedSession, bus: Arc<EventBus>) -> Self {
        Self {
            session,
            bus,
            active: Mutex::new(None),
        }
    }

    /// Spawn the loop unless one is already running. Returns once spawned.
    pub async fn start(&self) -> bool {
        let mut active = self.active.lock().await;

        if active.as_ref().is_some_and(|a| !a.handle.is_finished()) {
            debug!("Read loop already running");
            return true;
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(run(
            self.session.clone(),
            self.bus.clone(),
            cancel_token.clone(),
        ));

        *active = Some(ActiveLoop {
            handle,
            cancel_token,
        });
        true
    }

    /// Cancel the loop and wait until it has released its reader and exited
    pub async fn stop(&self) {
        let Some(ActiveLoop {
            handle,
            cancel_token,
        }) = self.active.lock().await.take()
        else {
            return;
        };

        cancel_token.cancel();
        if let Err(e) = handle.await {
            error!(error = %e, "Read loop task failed");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|a| !a.handle.is_finished())
    }
}

async fn run(session: SharedSession, bus: Arc<EventBus>, cancel_token: CancellationToken) {
    info!("Read loop started");

    while !cancel_token.is_cancelled() {
        // Closing or gone: nothing left to read from
        let Some(transport) = session.open_transport().await else {
            break;
        };
        if !transport.is_readable() {
            debug!(port = %transport.name(), "Port has no readable side");
            break;
        }

        let mut reader = match transport.reader().await {
            Ok(reader) => reader,
            Err(e) => {
                warn!(port = %transport.name(), error = %e, "Failed to acquire reader");
                break;
            }
        };

        let exit = read_until_exit(reader.as_mut(), &bus, &cancel_token).await;
        // Releases the read lock on every exit path
        drop(reader);

        match exit {
            ReadExit::Ended => debug!(port = %transport.name(), "Read stream ended"),
            ReadExit::Cancelled => break,
            ReadExit::Failed(e) => {
                warn!(port = %transport.name(), error = %e, "Read failed, re-acquiring reader");
            }
        }

        // A hung-up tty ends every stream at once; don't spin on it
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(READ_RETRY_DELAY) => {}
        }
    }

    info!("Read loop stopped");
}

async fn read_until_exit(
    reader: &mut dyn PortReader,
    bus: &EventBus,
    cancel_token: &CancellationToken,
) -> ReadExit {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => None,
            chunk = reader.read() => Some(chunk),
        };

        match next {
            None => {
                reader.cancel().await;
                return ReadExit::Cancelled;
            }
            Some(Ok(ReadChunk::Data(bytes))) => {
                if !bytes.is_empty() {
                    bus.emit(PrinterEvent::Data(bytes));
                }
            }
            Some(Ok(ReadChunk::Done)) => return ReadExit::Ended,
            Some(Err(e)) => return ReadExit::Failed(e),
        }
    }
}
