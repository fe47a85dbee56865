use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use domain::{DomainError, PortHandle};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::connection::SharedSession;

#[derive(Default)]
struct DispatchQueue {
    pending: VecDeque<Bytes>,
    running: bool,
}

/// Completion of one dispatch loop.
///
/// Resolves to the number of buffers the loop wrote, or the write error that aborted it.
pub struct DispatchHandle {
    handle: JoinHandle<Result<usize, DomainError>>,
}

impl DispatchHandle {
    pub async fn wait(self) -> Result<usize, DomainError> {
        self.handle
            .await
            .map_err(|e| DomainError::WriteFailed(format!("Dispatch task failed: {}", e)))?
    }
}

/// FIFO of command buffers drained to the transport by at most one loop at a time
#[derive(Clone)]
pub struct WriteDispatcher {
    session: SharedSession,
    queue: Arc<Mutex<DispatchQueue>>,
    // Held by the running loop for as long as it may touch the writer
    busy: Arc<Mutex<()>>,
}

impl WriteDispatcher {
    pub fn new(session: SharedSession) -> Self {
        Self {
            session,
            queue: Arc::new(Mutex::new(DispatchQueue::default())),
            busy: Arc::new(Mutex::new(())),
        }
    }

    /// Queue `buffer` and trigger a dispatch.
    ///
    /// Returns a handle only when this call started a loop; a loop that is already
    /// running picks the buffer up on its own.
    pub async fn submit(&self, buffer: Bytes) -> Option<DispatchHandle> {
        {
            let mut queue = self.queue.lock().await;
            queue.pending.push_back(buffer);
            trace!(pending = queue.pending.len(), "Command buffer queued");
        }
        self.dispatch().await
    }

    /// Trigger a dispatch without queueing anything
    pub async fn flush(&self) -> Option<DispatchHandle> {
        self.dispatch().await
    }

    /// Drop every pending buffer. Nothing is partially flushed.
    pub async fn clear(&self) -> usize {
        let mut queue = self.queue.lock().await;
        let dropped = queue.pending.len();
        queue.pending.clear();
        dropped
    }

    pub async fn pending(&self) -> usize {
        self.queue.lock().await.pending.len()
    }

    /// Wait until no dispatch loop holds the writer.
    ///
    /// Once the session has left `Open`, a running loop stops after its current write.
    pub async fn wait_idle(&self) {
        drop(self.busy.lock().await);
    }

    async fn dispatch(&self) -> Option<DispatchHandle> {
        // Closing or no session: buffers stay queued for a later dispatch
        let transport = self.session.open_transport().await;

        let mut queue = self.queue.lock().await;
        if queue.running {
            return None;
        }
        let Some(transport) = transport else {
            debug!(pending = queue.pending.len(), "Port not open, keeping buffers queued");
            return None;
        };
        if queue.pending.is_empty() {
            return None;
        }
        queue.running = true;
        // The previous loop, if any, already gave up `running` and is only returning
        let busy = self.busy.clone().lock_owned().await;
        drop(queue);

        let dispatcher = self.clone();
        Some(DispatchHandle {
            handle: tokio::spawn(async move { dispatcher.run(transport, busy).await }),
        })
    }

    async fn run(
        self,
        transport: PortHandle,
        _busy: OwnedMutexGuard<()>,
    ) -> Result<usize, DomainError> {
        let mut written = 0;

        loop {
            let drained = self.drain(&transport, &mut written).await;
            let still_open = self.session.is_open_with(&transport).await;

            let mut queue = self.queue.lock().await;
            // Buffers queued after the last pop saw `running` and left them to us
            if drained.is_ok() && still_open && !queue.pending.is_empty() {
                continue;
            }
            queue.running = false;

            return drained.map(|()| written);
        }
    }

    /// Write queued buffers under a single writer lock until the queue is empty
    /// or the session stops being open on `transport`
    async fn drain(&self, transport: &PortHandle, written: &mut usize) -> Result<(), DomainError> {
        if !self.session.is_open_with(transport).await {
            return Ok(());
        }

        let mut writer = transport.writer().await.inspect_err(|e| {
            error!(port = %transport.name(), error = %e, "Failed to acquire writer");
        })?;

        while let Some(buffer) = self.next_buffer(transport).await {
            if let Err(e) = writer.write(&buffer).await {
                error!(
                    port = %transport.name(),
                    bytes = buffer.len(),
                    error = %e,
                    "Write failed, dispatch aborted"
                );
                return Err(e);
            }
            *written += 1;
            trace!(port = %transport.name(), bytes = buffer.len(), "Command buffer written");
        }

        Ok(())
    }

    /// Next buffer to write; `None` once the queue is empty or the session moved on,
    /// leaving whatever is left queued for a later session
    async fn next_buffer(&self, transport: &PortHandle) -> Option<Bytes> {
        if !self.session.is_open_with(transport).await {
            debug!(port = %transport.name(), "Session no longer open, stopping dispatch");
            return None;
        }
        self.queue.lock().await.pending.pop_front()
    }
}
