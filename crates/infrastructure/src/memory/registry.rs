use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use domain::{DomainError, PortHandle, PortInfo, PortRegistry, PortTransport};
use tokio::sync::broadcast;
use tracing::debug;

use super::journal::Journal;
use super::transport::MemoryTransport;

const NOTICE_CAPACITY: usize = 16;

#[derive(Default)]
struct Chooser {
    choice: Option<Arc<MemoryTransport>>,
    error: Option<String>,
}

/// Registry over [`MemoryTransport`]s with a scripted chooser
pub struct MemoryRegistry {
    journal: Journal,
    ports: Mutex<Vec<Arc<MemoryTransport>>>,
    chooser: Mutex<Chooser>,
    notices: broadcast::Sender<PortHandle>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            journal: Journal::new(),
            ports: Mutex::new(Vec::new()),
            chooser: Mutex::new(Chooser::default()),
            notices,
        }
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    /// Create and authorize a port
    pub fn add_port(&self, name: &str, info: PortInfo) -> Arc<MemoryTransport> {
        let port = Arc::new(MemoryTransport::new(name, info, self.journal.clone()));
        self.ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(port.clone());
        port
    }

    /// The port the chooser hands out next; `None` behaves like a dismissed chooser
    pub fn choose(&self, port: Option<Arc<MemoryTransport>>) {
        self.chooser
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .choice = port;
    }

    /// Make the next chooser request fail
    pub fn fail_next_request(&self, message: impl Into<String>) {
        self.chooser
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .error = Some(message.into());
    }

    /// Pull the device out: it stops being authorized and every subscriber hears about it
    pub fn unplug(&self, port: &Arc<MemoryTransport>) {
        port.unplug();
        self.ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|p| !Arc::ptr_eq(p, port));

        let handle: PortHandle = port.clone();
        if self.notices.send(handle).is_err() {
            debug!(port = %port.name(), "No disconnect subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.notices.receiver_count()
    }
}

#[async_trait]
impl PortRegistry for MemoryRegistry {
    async fn request_port(&self) -> Result<Option<PortHandle>, DomainError> {
        let mut chooser = self.chooser.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(message) = chooser.error.take() {
            return Err(DomainError::Registry(message));
        }
        Ok(chooser.choice.clone().map(|port| port as PortHandle))
    }

    async fn authorized_ports(&self) -> Result<Vec<PortHandle>, DomainError> {
        Ok(self
            .ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|port| port.clone() as PortHandle)
            .collect())
    }

    fn subscribe_disconnects(&self) -> broadcast::Receiver<PortHandle> {
        self.notices.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::ConnectionOptions;

    #[tokio::test]
    async fn test_chooser_defaults_to_nothing() {
        let registry = MemoryRegistry::new();
        registry.add_port("COM1", PortInfo::new(Some(1), Some(2)));

        assert!(registry.request_port().await.unwrap().is_none());
        assert_eq!(registry.authorized_ports().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_chooser_error_is_one_shot() {
        let registry = MemoryRegistry::new();
        let port = registry.add_port("COM1", PortInfo::default());
        registry.choose(Some(port));
        registry.fail_next_request("denied");

        assert!(matches!(
            registry.request_port().await,
            Err(DomainError::Registry(_))
        ));
        assert!(registry.request_port().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unplug_notifies_and_deauthorizes() {
        let registry = MemoryRegistry::new();
        let port = registry.add_port("COM1", PortInfo::default());
        let mut notices = registry.subscribe_disconnects();

        registry.unplug(&port);

        let gone = notices.recv().await.unwrap();
        let expected: PortHandle = port.clone();
        assert!(Arc::ptr_eq(&gone, &expected));
        assert!(registry.authorized_ports().await.unwrap().is_empty());
        assert!(port.open(&ConnectionOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_dropping_receiver_unsubscribes() {
        let registry = MemoryRegistry::new();
        let notices = registry.subscribe_disconnects();
        assert_eq!(registry.subscriber_count(), 1);

        drop(notices);
        assert_eq!(registry.subscriber_count(), 0);
    }
}
