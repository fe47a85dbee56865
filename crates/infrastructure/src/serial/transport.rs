use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use domain::connection::{FlowControl, Parity};
use domain::port::{PortReader, PortWriter, ReadChunk};
use domain::{ConnectionOptions, DomainError, PortInfo, PortTransport};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

type SharedRead = Arc<AsyncMutex<ReadHalf<SerialStream>>>;
type SharedWrite = Arc<AsyncMutex<WriteHalf<SerialStream>>>;

struct OpenPort {
    read: SharedRead,
    write: SharedWrite,
    chunk_size: usize,
}

/// Serial port opened through tokio-serial.
///
/// The stream is split once per open; each half sits behind its own lock so one
/// reader and one writer can work at the same time.
pub struct SerialTransport {
    path: String,
    info: PortInfo,
    open: Mutex<Option<OpenPort>>,
}

impl SerialTransport {
    pub fn new(path: impl Into<String>, info: PortInfo) -> Self {
        Self {
            path: path.into(),
            info,
            open: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn slot(&self) -> MutexGuard<'_, Option<OpenPort>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Normalize port name for Windows (e.g., COM7 -> \\.\COM7)
    fn native_path(&self) -> String {
        if cfg!(target_os = "windows") && !self.path.to_uppercase().starts_with(r"\\.\") {
            format!(r"\\.\{}", self.path)
        } else {
            self.path.clone()
        }
    }
}

fn to_data_bits(bits: u8) -> Result<tokio_serial::DataBits, DomainError> {
    match bits {
        5 => Ok(tokio_serial::DataBits::Five),
        6 => Ok(tokio_serial::DataBits::Six),
        7 => Ok(tokio_serial::DataBits::Seven),
        8 => Ok(tokio_serial::DataBits::Eight),
        _ => Err(DomainError::InvalidConfiguration(format!(
            "Invalid data bits: {}",
            bits
        ))),
    }
}

fn to_stop_bits(bits: u8) -> Result<tokio_serial::StopBits, DomainError> {
    match bits {
        1 => Ok(tokio_serial::StopBits::One),
        2 => Ok(tokio_serial::StopBits::Two),
        _ => Err(DomainError::InvalidConfiguration(format!(
            "Invalid stop bits: {}",
            bits
        ))),
    }
}

fn to_parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Even => tokio_serial::Parity::Even,
        Parity::Odd => tokio_serial::Parity::Odd,
    }
}

fn to_flow_control(flow_control: FlowControl) -> tokio_serial::FlowControl {
    match flow_control {
        FlowControl::None => tokio_serial::FlowControl::None,
        FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
    }
}

#[async_trait]
impl PortTransport for SerialTransport {
    async fn open(&self, options: &ConnectionOptions) -> Result<(), DomainError> {
        let mut slot = self.slot();
        if slot.is_some() {
            return Err(DomainError::OpenFailed(format!(
                "{}: already open",
                self.path
            )));
        }

        let port_name = self.native_path();
        tracing::debug!(
            port = %port_name,
            baud_rate = options.baud_rate(),
            "Opening serial port"
        );

        let stream = tokio_serial::new(&port_name, options.baud_rate())
            .data_bits(to_data_bits(options.data_bits())?)
            .parity(to_parity(options.parity()))
            .stop_bits(to_stop_bits(options.stop_bits())?)
            .flow_control(to_flow_control(options.flow_control()))
            .open_native_async()
            .map_err(|e| {
                tracing::warn!(port = %port_name, error = %e, "Failed to open serial port");
                DomainError::OpenFailed(format!(
                    "Failed to open serial port {}: {}. Tip: Ensure the port is not used by another application and that you have sufficient permissions.",
                    port_name, e
                ))
            })?;

        let (read, write) = tokio::io::split(stream);
        *slot = Some(OpenPort {
            read: Arc::new(AsyncMutex::new(read)),
            write: Arc::new(AsyncMutex::new(write)),
            chunk_size: options.buffer_size() as usize,
        });

        tracing::debug!(port = %self.path, "Serial port opened successfully");
        Ok(())
    }

    async fn close(&self) -> Result<(), DomainError> {
        let port = {
            let mut slot = self.slot();
            let Some(port) = slot.as_ref() else {
                return Err(DomainError::NotOpen);
            };
            if port.read.try_lock().is_err() || port.write.try_lock().is_err() {
                return Err(DomainError::Locked(format!(
                    "{}: reader or writer still held",
                    self.path
                )));
            }
            slot.take()
        };

        // Both halves dropping closes the device
        if let Some(port) = port {
            let mut write = port.write.lock().await;
            if let Err(e) = write.shutdown().await {
                tracing::warn!(port = %self.path, error = %e, "Error shutting down serial port");
            }
        }

        tracing::info!(port = %self.path, "Serial port closed");
        Ok(())
    }

    fn info(&self) -> PortInfo {
        self.info
    }

    fn is_readable(&self) -> bool {
        self.slot().is_some()
    }

    async fn reader(&self) -> Result<Box<dyn PortReader>, DomainError> {
        let (read, chunk_size) = {
            let slot = self.slot();
            let port = slot.as_ref().ok_or(DomainError::NotOpen)?;
            (port.read.clone(), port.chunk_size)
        };

        let half = read
            .try_lock_owned()
            .map_err(|_| DomainError::Locked(format!("{}: reader already held", self.path)))?;

        Ok(Box::new(SerialReader {
            half,
            buffer: vec![0u8; chunk_size.max(1)],
        }))
    }

    async fn writer(&self) -> Result<Box<dyn PortWriter>, DomainError> {
        let write = {
            let slot = self.slot();
            slot.as_ref().ok_or(DomainError::NotOpen)?.write.clone()
        };

        let half = write
            .try_lock_owned()
            .map_err(|_| DomainError::Locked(format!("{}: writer already held", self.path)))?;

        Ok(Box::new(SerialWriter { half }))
    }

    fn name(&self) -> String {
        self.path.clone()
    }
}

struct SerialReader {
    half: OwnedMutexGuard<ReadHalf<SerialStream>>,
    buffer: Vec<u8>,
}

#[async_trait]
impl PortReader for SerialReader {
    async fn read(&mut self) -> Result<ReadChunk, DomainError> {
        let n = self
            .half
            .read(&mut self.buffer)
            .await
            .map_err(|e| DomainError::ReadFailed(e.to_string()))?;

        if n == 0 {
            return Ok(ReadChunk::Done);
        }
        Ok(ReadChunk::Data(Bytes::copy_from_slice(&self.buffer[..n])))
    }

    async fn cancel(&mut self) {
        // Dropping the read future already abandoned it
        tracing::trace!("Serial read cancelled");
    }
}

struct SerialWriter {
    half: OwnedMutexGuard<WriteHalf<SerialStream>>,
}

#[async_trait]
impl PortWriter for SerialWriter {
    async fn write(&mut self, data: &[u8]) -> Result<(), DomainError> {
        self.half
            .write_all(data)
            .await
            .map_err(|e| DomainError::WriteFailed(e.to_string()))?;
        self.half
            .flush()
            .await
            .map_err(|e| DomainError::WriteFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_settings_conversion() {
        assert!(matches!(to_data_bits(7), Ok(tokio_serial::DataBits::Seven)));
        assert!(matches!(to_stop_bits(2), Ok(tokio_serial::StopBits::Two)));
        assert!(to_data_bits(9).is_err());
        assert!(to_stop_bits(3).is_err());
        assert_eq!(to_parity(Parity::Even), tokio_serial::Parity::Even);
        assert_eq!(
            to_flow_control(FlowControl::Hardware),
            tokio_serial::FlowControl::Hardware
        );
    }

    #[tokio::test]
    async fn test_unopened_port_hands_out_nothing() {
        let port = SerialTransport::new("/dev/ttyUSB9", PortInfo::default());

        assert!(!port.is_readable());
        assert!(matches!(port.reader().await, Err(DomainError::NotOpen)));
        assert!(matches!(port.writer().await, Err(DomainError::NotOpen)));
        assert!(matches!(port.close().await, Err(DomainError::NotOpen)));
    }

    #[tokio::test]
    async fn test_open_missing_device_fails() {
        let port = SerialTransport::new("/dev/does-not-exist", PortInfo::default());

        let result = port.open(&ConnectionOptions::default()).await;
        assert!(matches!(result, Err(DomainError::OpenFailed(_))));
        assert!(!port.is_readable());
    }
}
