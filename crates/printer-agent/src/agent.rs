use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use application::{DispatchHandle, ReceiptPrinter};
use domain::{ConnectionOptionsOverride, DeviceIdentity, EventName, PortRegistry, PrinterEvent};
use infrastructure::IdentityStore;
use tracing::{debug, info, warn};

/// Authorized port as shown by `printer-agent ports`
#[derive(Debug, Clone, PartialEq)]
pub struct PortListing {
    pub name: String,
    pub identity: DeviceIdentity,
}

pub async fn list_ports(registry: &dyn PortRegistry) -> Result<Vec<PortListing>> {
    let ports = registry
        .authorized_ports()
        .await
        .context("Failed to list serial ports")?;

    Ok(ports
        .iter()
        .map(|port| PortListing {
            name: port.name(),
            identity: DeviceIdentity::from(port.info()),
        })
        .collect())
}

/// Uppercase hex, space separated
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One printer session driven from the command line
pub struct Agent {
    printer: ReceiptPrinter,
    store: IdentityStore,
    fallback_identity: DeviceIdentity,
}

impl Agent {
    pub fn new(
        registry: Arc<dyn PortRegistry>,
        serial: ConnectionOptionsOverride,
        store: IdentityStore,
        fallback_identity: DeviceIdentity,
    ) -> Result<Self> {
        let printer = ReceiptPrinter::new(registry, serial).context("Invalid serial settings")?;
        Ok(Self {
            printer,
            store,
            fallback_identity,
        })
    }

    pub fn printer(&self) -> &ReceiptPrinter {
        &self.printer
    }

    /// Connect through the saved identity when `reconnect` is set, else through the chooser.
    /// The identity of whatever got connected is saved for next time.
    pub async fn connect(&self, reconnect: bool) -> Result<DeviceIdentity> {
        if reconnect {
            let identity = match self.store.load().await {
                Ok(Some(identity)) => identity,
                Ok(None) => self.fallback_identity,
                Err(e) => {
                    warn!(error = %e, "Ignoring saved printer identity");
                    self.fallback_identity
                }
            };
            info!(identity = %identity, "🔌 Reconnecting to printer...");
            self.printer.reconnect(identity).await;
        } else {
            info!("🔌 Connecting to printer...");
            self.printer.connect().await;
        }

        let Some(identity) = self.printer.identity().await else {
            bail!("No printer connected");
        };

        if identity.is_complete() {
            if let Err(e) = self.store.save(&identity).await {
                warn!(error = %e, "Failed to save printer identity");
            }
        } else {
            debug!("Connected port reports no USB identity, nothing saved");
        }
        Ok(identity)
    }

    /// Send each file as one command buffer and wait until everything was written
    pub async fn print_files(&self, files: &[PathBuf]) -> Result<usize> {
        let mut handles: Vec<DispatchHandle> = Vec::new();

        for file in files {
            let buffer = tokio::fs::read(file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            info!(file = %file.display(), bytes = buffer.len(), "🖨️ Queueing print job");
            handles.extend(self.printer.print(buffer).await);
        }

        let mut written = 0;
        for handle in handles {
            written += handle.wait().await.context("Print job failed")?;
        }

        let left = self.printer.pending().await;
        if left > 0 {
            bail!("{} print job(s) still queued", left);
        }

        info!(jobs = written, "✅ Print jobs sent");
        Ok(written)
    }

    /// Log every inbound chunk until `stop` resolves
    pub async fn monitor(&self, stop: impl Future<Output = ()>) -> Result<()> {
        self.printer.add_event_listener(EventName::Data, |event| {
            if let PrinterEvent::Data(bytes) = event {
                info!(bytes = bytes.len(), data = %hex(bytes), "📥 Printer data");
            }
        });
        self.printer
            .add_event_listener(EventName::Disconnected, |_| warn!("⚠️ Printer disconnected"));

        if !self.printer.listen().await {
            bail!("Could not start reading from printer");
        }

        stop.await;
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.printer.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_formatting() {
        assert_eq!(hex(&[0x10, 0x04, 0xFF]), "10 04 FF");
        assert_eq!(hex(&[]), "");
    }
}
