use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::connection::{ConnectionOptions, PortInfo};
use crate::error::DomainError;

/// Outcome of a single read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadChunk {
    /// Bytes as delivered; may be empty
    Data(Bytes),
    /// The stream ended or the pending read was cancelled
    Done,
}

/// Exclusive handle on a transport's readable side.
///
/// Holding one locks the readable side. Dropping it releases the lock, so every exit
/// path of a read loop releases by construction.
#[async_trait]
pub trait PortReader: Send {
    /// Wait for the next chunk
    async fn read(&mut self) -> Result<ReadChunk, DomainError>;

    /// Ask the transport to abandon whatever read is outstanding
    async fn cancel(&mut self);
}

/// Exclusive handle on a transport's writable side. Released on drop.
#[async_trait]
pub trait PortWriter: Send {
    /// Write the whole buffer and wait until the transport accepted it
    async fn write(&mut self, data: &[u8]) -> Result<(), DomainError>;
}

/// Byte port to a printer. Implementations live in the infrastructure layer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortTransport: Send + Sync {
    /// Open the port with the given line settings
    async fn open(&self, options: &ConnectionOptions) -> Result<(), DomainError>;

    /// Close the port. Fails while a reader or writer is still held.
    async fn close(&self) -> Result<(), DomainError>;

    /// Identity the port reports
    fn info(&self) -> PortInfo;

    /// Whether the readable side currently exists
    fn is_readable(&self) -> bool;

    /// Lock the readable side
    async fn reader(&self) -> Result<Box<dyn PortReader>, DomainError>;

    /// Lock the writable side
    async fn writer(&self) -> Result<Box<dyn PortWriter>, DomainError>;

    /// Human-readable name for logs (e.g. `/dev/ttyUSB0`)
    fn name(&self) -> String;
}

/// Shared handle; identity is the allocation, compared with `Arc::ptr_eq`
pub type PortHandle = Arc<dyn PortTransport>;
