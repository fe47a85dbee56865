use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use domain::port::{PortReader, PortWriter, ReadChunk};
use domain::{ConnectionOptions, DomainError, PortInfo, PortTransport};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, mpsc, watch};

use super::journal::Journal;

type Inbound = Result<ReadChunk, DomainError>;

#[derive(Default)]
struct Script {
    open: bool,
    unplugged: bool,
    options: Option<ConnectionOptions>,
    open_error: Option<String>,
    close_error: Option<String>,
    write_error: Option<String>,
    written: Vec<Bytes>,
}

/// Scriptable in-process port.
///
/// Inbound chunks are queued with [`push_data`](Self::push_data) and friends; every
/// lifecycle step lands in the shared [`Journal`].
pub struct MemoryTransport {
    name: String,
    info: PortInfo,
    journal: Journal,
    script: Arc<Mutex<Script>>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    // The read lock is the receiver itself
    inbound_rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Inbound>>>,
    write_lock: Arc<AsyncMutex<()>>,
    // `true` while writes are held at the gate
    write_gate: watch::Sender<bool>,
}

impl MemoryTransport {
    pub fn new(name: impl Into<String>, info: PortInfo, journal: Journal) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            info,
            journal,
            script: Arc::new(Mutex::new(Script::default())),
            inbound_tx,
            inbound_rx: Arc::new(AsyncMutex::new(inbound_rx)),
            write_lock: Arc::new(AsyncMutex::new(())),
            write_gate: watch::Sender::new(false),
        }
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        lock(&self.script)
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    /// Deliver a chunk to the current or next reader
    pub fn push_data(&self, data: impl Into<Bytes>) {
        let _ = self.inbound_tx.send(Ok(ReadChunk::Data(data.into())));
    }

    /// End the current read stream; the next reader starts a new one
    pub fn end_stream(&self) {
        let _ = self.inbound_tx.send(Ok(ReadChunk::Done));
    }

    pub fn push_read_error(&self, message: impl Into<String>) {
        let _ = self
            .inbound_tx
            .send(Err(DomainError::ReadFailed(message.into())));
    }

    pub fn fail_open(&self, message: impl Into<String>) {
        self.script().open_error = Some(message.into());
    }

    pub fn fail_close(&self, message: impl Into<String>) {
        self.script().close_error = Some(message.into());
    }

    /// Make the next write fail. Later writes succeed again.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        self.script().write_error = Some(message.into());
    }

    /// Park every write until [`release_writes`](Self::release_writes)
    pub fn hold_writes(&self) {
        self.write_gate.send_replace(true);
    }

    pub fn release_writes(&self) {
        self.write_gate.send_replace(false);
    }

    /// Mark the device as gone. Open handles start failing.
    pub fn unplug(&self) {
        let mut script = self.script();
        script.unplugged = true;
        script.open = false;
        drop(script);
        let _ = self
            .inbound_tx
            .send(Err(DomainError::ReadFailed("device lost".to_string())));
    }

    pub fn is_open(&self) -> bool {
        self.script().open
    }

    /// Options passed to the last successful open
    pub fn last_options(&self) -> Option<ConnectionOptions> {
        self.script().options
    }

    /// Buffers accepted by the sink, one entry per write call
    pub fn written(&self) -> Vec<Bytes> {
        self.script().written.clone()
    }

    pub fn written_bytes(&self) -> Vec<u8> {
        self.script().written.concat()
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        if self.script().open {
            Ok(())
        } else {
            Err(DomainError::NotOpen)
        }
    }
}

#[async_trait]
impl PortTransport for MemoryTransport {
    async fn open(&self, options: &ConnectionOptions) -> Result<(), DomainError> {
        self.journal.record("open");
        let mut script = self.script();

        if script.unplugged {
            return Err(DomainError::OpenFailed(format!("{}: device lost", self.name)));
        }
        if script.open {
            return Err(DomainError::OpenFailed(format!("{}: already open", self.name)));
        }
        if let Some(message) = script.open_error.take() {
            return Err(DomainError::OpenFailed(message));
        }

        script.open = true;
        script.options = Some(*options);
        Ok(())
    }

    async fn close(&self) -> Result<(), DomainError> {
        if self.inbound_rx.try_lock().is_err() {
            return Err(DomainError::Locked(format!("{}: reader still held", self.name)));
        }
        if self.write_lock.try_lock().is_err() {
            return Err(DomainError::Locked(format!("{}: writer still held", self.name)));
        }

        self.journal.record("close");
        let mut script = self.script();
        script.open = false;
        match script.close_error.take() {
            Some(message) => Err(DomainError::CloseFailed(message)),
            None => Ok(()),
        }
    }

    fn info(&self) -> PortInfo {
        self.info
    }

    fn is_readable(&self) -> bool {
        self.script().open
    }

    async fn reader(&self) -> Result<Box<dyn PortReader>, DomainError> {
        self.ensure_open()?;
        let inbound = self
            .inbound_rx
            .clone()
            .try_lock_owned()
            .map_err(|_| DomainError::Locked(format!("{}: reader already held", self.name)))?;

        self.journal.record("reader.acquire");
        Ok(Box::new(MemoryReader {
            inbound,
            journal: self.journal.clone(),
        }))
    }

    async fn writer(&self) -> Result<Box<dyn PortWriter>, DomainError> {
        self.ensure_open()?;
        let lock = self
            .write_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| DomainError::Locked(format!("{}: writer already held", self.name)))?;

        self.journal.record("writer.acquire");
        Ok(Box::new(MemoryWriter {
            _lock: lock,
            gate: self.write_gate.subscribe(),
            script: self.script.clone(),
            journal: self.journal.clone(),
        }))
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

fn lock(script: &Mutex<Script>) -> MutexGuard<'_, Script> {
    script.lock().unwrap_or_else(PoisonError::into_inner)
}

struct MemoryReader {
    inbound: OwnedMutexGuard<mpsc::UnboundedReceiver<Inbound>>,
    journal: Journal,
}

#[async_trait]
impl PortReader for MemoryReader {
    async fn read(&mut self) -> Result<ReadChunk, DomainError> {
        match self.inbound.recv().await {
            Some(chunk) => chunk,
            None => Ok(ReadChunk::Done),
        }
    }

    async fn cancel(&mut self) {
        self.journal.record("reader.cancel");
    }
}

impl Drop for MemoryReader {
    fn drop(&mut self) {
        self.journal.record("reader.release");
    }
}

struct MemoryWriter {
    _lock: OwnedMutexGuard<()>,
    gate: watch::Receiver<bool>,
    script: Arc<Mutex<Script>>,
    journal: Journal,
}

#[async_trait]
impl PortWriter for MemoryWriter {
    async fn write(&mut self, data: &[u8]) -> Result<(), DomainError> {
        // The sender lives in the transport, which outlives its writers
        let _ = self.gate.wait_for(|held| !held).await;

        {
            let mut script = lock(&self.script);
            if !script.open {
                return Err(DomainError::NotOpen);
            }
            if let Some(message) = script.write_error.take() {
                return Err(DomainError::WriteFailed(message));
            }
            script.written.push(Bytes::copy_from_slice(data));
        }

        self.journal.record("write");
        // Yield between writes like a real sink
        tokio::task::yield_now().await;
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.journal.record("writer.release");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_port() -> MemoryTransport {
        let info = PortInfo::new(Some(0x0416), Some(0x5011));
        let port = MemoryTransport::new("mem0", info, Journal::new());
        port.open(&ConnectionOptions::default()).await.unwrap();
        port
    }

    #[tokio::test]
    async fn test_reader_is_exclusive() {
        let port = open_port().await;

        let reader = port.reader().await.unwrap();
        assert!(matches!(port.reader().await, Err(DomainError::Locked(_))));

        drop(reader);
        assert!(port.reader().await.is_ok());
    }

    #[tokio::test]
    async fn test_close_refused_while_reader_held() {
        let port = open_port().await;
        let reader = port.reader().await.unwrap();

        assert!(matches!(port.close().await, Err(DomainError::Locked(_))));
        assert!(port.is_open());

        drop(reader);
        port.close().await.unwrap();
        assert!(!port.is_open());
        assert_eq!(
            port.journal().entries(),
            vec!["open", "reader.acquire", "reader.release", "close"]
        );
    }

    #[tokio::test]
    async fn test_chunks_arrive_in_order_then_end() {
        let port = open_port().await;
        port.push_data(vec![1, 2]);
        port.push_data(vec![3]);
        port.end_stream();

        let mut reader = port.reader().await.unwrap();
        assert_eq!(
            reader.read().await.unwrap(),
            ReadChunk::Data(Bytes::from_static(&[1, 2]))
        );
        assert_eq!(
            reader.read().await.unwrap(),
            ReadChunk::Data(Bytes::from_static(&[3]))
        );
        assert_eq!(reader.read().await.unwrap(), ReadChunk::Done);
    }

    #[tokio::test]
    async fn test_write_failure_is_one_shot() {
        let port = open_port().await;
        port.fail_next_write("paper jam");

        let mut writer = port.writer().await.unwrap();
        assert!(matches!(
            writer.write(b"first").await,
            Err(DomainError::WriteFailed(_))
        ));
        writer.write(b"second").await.unwrap();

        assert_eq!(port.written(), vec![Bytes::from_static(b"second")]);
    }

    #[tokio::test]
    async fn test_held_writes_wait_for_release() {
        let port = Arc::new(open_port().await);
        port.hold_writes();

        let writing = {
            let port = port.clone();
            tokio::spawn(async move {
                let mut writer = port.writer().await.unwrap();
                writer.write(b"queued").await
            })
        };
        tokio::task::yield_now().await;
        assert!(port.written().is_empty());

        port.release_writes();
        writing.await.unwrap().unwrap();
        assert_eq!(port.written(), vec![Bytes::from_static(b"queued")]);
    }

    #[tokio::test]
    async fn test_open_twice_fails() {
        let port = open_port().await;
        assert!(matches!(
            port.open(&ConnectionOptions::default()).await,
            Err(DomainError::OpenFailed(_))
        ));
    }
}
