#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use application::ReceiptPrinter;
use domain::{ConnectionOptionsOverride, EventName, PortInfo, PrinterEvent};
use infrastructure::{Journal, MemoryRegistry, MemoryTransport};

pub const EPSON: PortInfo = PortInfo {
    usb_vendor_id: Some(0x04B8),
    usb_product_id: Some(0x0202),
};

pub const STAR: PortInfo = PortInfo {
    usb_vendor_id: Some(0x0519),
    usb_product_id: Some(0x0003),
};

/// Printer wired to an in-memory registry, recording every event it emits
pub struct Harness {
    pub registry: Arc<MemoryRegistry>,
    pub printer: ReceiptPrinter,
    pub events: Arc<Mutex<Vec<PrinterEvent>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_overrides(ConnectionOptionsOverride::default())
    }

    pub fn with_overrides(overrides: ConnectionOptionsOverride) -> Self {
        let registry = Arc::new(MemoryRegistry::new());
        let printer = ReceiptPrinter::new(registry.clone(), overrides).unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));

        let journal = registry.journal();
        for name in [EventName::Connected, EventName::Disconnected, EventName::Data] {
            let events = events.clone();
            let journal = journal.clone();
            printer.add_event_listener(name, move |event| {
                journal.record(&format!("event.{}", event.name()));
                events.lock().unwrap().push(event.clone());
            });
        }

        Self {
            registry,
            printer,
            events,
        }
    }

    /// Authorized port that the chooser also hands out
    pub fn chosen_port(&self, name: &str, info: PortInfo) -> Arc<MemoryTransport> {
        let port = self.registry.add_port(name, info);
        self.registry.choose(Some(port.clone()));
        port
    }

    pub async fn connected(info: PortInfo) -> (Self, Arc<MemoryTransport>) {
        let harness = Self::new();
        let port = harness.chosen_port("mem0", info);
        harness.printer.connect().await;
        (harness, port)
    }

    pub fn journal(&self) -> Journal {
        self.registry.journal()
    }

    pub fn events(&self) -> Vec<PrinterEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, name: EventName) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }

    pub fn data(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                PrinterEvent::Data(bytes) => Some(bytes.to_vec()),
                _ => None,
            })
            .collect()
    }
}

/// Let spawned tasks run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

/// Poll `condition` for up to a second
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
