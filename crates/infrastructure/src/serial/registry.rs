use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use domain::{DomainError, PortHandle, PortInfo, PortRegistry};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_serial::{SerialPortInfo, SerialPortType, available_ports};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::transport::SerialTransport;

const NOTICE_CAPACITY: usize = 16;

/// Registry over the host's serial ports.
///
/// USB serial ports count as authorized. The chooser is the configured port path, so
/// an unconfigured registry behaves like a dismissed chooser.
pub struct SerialPortRegistry {
    chosen_path: Option<String>,
    ports: Mutex<HashMap<String, Arc<SerialTransport>>>,
    notices: broadcast::Sender<PortHandle>,
}

impl SerialPortRegistry {
    pub fn new(chosen_path: Option<String>) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            chosen_path,
            ports: Mutex::new(HashMap::new()),
            notices,
        }
    }

    /// OS enumeration blocks, so it runs off the async workers
    async fn enumerate() -> Result<Vec<SerialPortInfo>, DomainError> {
        tokio::task::spawn_blocking(available_ports)
            .await
            .map_err(|e| DomainError::Registry(format!("Port enumeration task failed: {}", e)))?
            .map_err(|e| DomainError::Registry(format!("Error listing ports: {}", e)))
    }

    /// The one transport for `path`; the same `Arc` while the device stays present
    fn handle_for(&self, path: &str, info: PortInfo) -> Arc<SerialTransport> {
        self.ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(SerialTransport::new(path, info)))
            .clone()
    }

    /// Poll the host every `interval` and broadcast a notice for each port that vanished
    pub fn spawn_watcher(
        self: &Arc<Self>,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "Watching serial ports");
            let mut ticker = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = ticker.tick() => registry.poll().await,
                }
            }

            debug!("Serial port watcher stopped");
        })
    }

    async fn poll(&self) {
        match Self::enumerate().await {
            Ok(ports) => self.retire_missing(ports.into_iter().map(|p| p.port_name).collect()),
            Err(e) => warn!(error = %e, "Skipping port poll"),
        }
    }

    /// Forget every handed-out port whose path is not `present` and broadcast it
    fn retire_missing(&self, present: HashSet<String>) {
        let vanished: Vec<Arc<SerialTransport>> = {
            let mut ports = self.ports.lock().unwrap_or_else(PoisonError::into_inner);
            let gone: Vec<String> = ports
                .keys()
                .filter(|path| !present.contains(*path))
                .cloned()
                .collect();
            gone.iter().filter_map(|path| ports.remove(path)).collect()
        };

        for port in vanished {
            warn!(port = %port.path(), "Serial port vanished");
            let handle: PortHandle = port;
            // No subscribers is fine
            let _ = self.notices.send(handle);
        }
    }
}

fn usb_info(port_type: &SerialPortType) -> Option<PortInfo> {
    match port_type {
        SerialPortType::UsbPort(usb) => Some(PortInfo::new(Some(usb.vid), Some(usb.pid))),
        _ => None,
    }
}

#[async_trait]
impl PortRegistry for SerialPortRegistry {
    async fn request_port(&self) -> Result<Option<PortHandle>, DomainError> {
        let Some(path) = &self.chosen_path else {
            return Ok(None);
        };

        let port = Self::enumerate()
            .await?
            .into_iter()
            .find(|p| &p.port_name == path)
            .ok_or_else(|| DomainError::Registry(format!("Port {} not found", path)))?;

        let info = usb_info(&port.port_type).unwrap_or_default();
        Ok(Some(self.handle_for(path, info)))
    }

    async fn authorized_ports(&self) -> Result<Vec<PortHandle>, DomainError> {
        Ok(Self::enumerate()
            .await?
            .into_iter()
            .filter_map(|p| {
                let info = usb_info(&p.port_type)?;
                Some(self.handle_for(&p.port_name, info) as PortHandle)
            })
            .collect())
    }

    fn subscribe_disconnects(&self) -> broadcast::Receiver<PortHandle> {
        self.notices.subscribe()
    }
}
