use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use domain::{EventName, PrinterEvent};

/// Callback invoked for every matching event
pub type EventHandler = Arc<dyn Fn(&PrinterEvent) + Send + Sync>;

/// Synchronous publish/subscribe keyed by event name.
///
/// Handlers run on the emitting task, in registration order.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventName, Vec<EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `name`. The same handler may be registered twice.
    pub fn on<F>(&self, name: EventName, handler: F)
    where
        F: Fn(&PrinterEvent) + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        handlers.entry(name).or_default().push(Arc::new(handler));
    }

    /// Invoke every handler registered for the event's name
    pub fn emit(&self, event: PrinterEvent) {
        let name = event.name();

        // Snapshot so handlers may register further handlers without deadlocking
        let handlers: Vec<EventHandler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
            .cloned()
            .unwrap_or_default();

        tracing::trace!(event = %name, handlers = handlers.len(), "Emitting event");

        for handler in &handlers {
            handler(&event);
        }
    }

    pub fn handler_count(&self, name: EventName) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::Mutex;

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let calls = calls.clone();
            bus.on(EventName::Disconnected, move |_| {
                calls.lock().unwrap().push(i);
            });
        }

        bus.emit(PrinterEvent::Disconnected);
        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_only_matching_handlers_run() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let data = received.clone();
        bus.on(EventName::Data, move |event| {
            if let PrinterEvent::Data(bytes) = event {
                data.lock().unwrap().push(bytes.clone());
            }
        });
        bus.on(EventName::Connected, |_| panic!("connected handler must not run"));

        bus.emit(PrinterEvent::Data(Bytes::from_static(&[0x10, 0x04])));
        bus.emit(PrinterEvent::Disconnected);

        assert_eq!(
            *received.lock().unwrap(),
            vec![Bytes::from_static(&[0x10, 0x04])]
        );
    }

    #[test]
    fn test_duplicate_registration_runs_twice() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let handler = {
            let count = count.clone();
            move |_: &PrinterEvent| *count.lock().unwrap() += 1
        };
        bus.on(EventName::Disconnected, handler.clone());
        bus.on(EventName::Disconnected, handler);

        bus.emit(PrinterEvent::Disconnected);
        assert_eq!(*count.lock().unwrap(), 2);
        assert_eq!(bus.handler_count(EventName::Disconnected), 2);
    }

    #[test]
    fn test_emit_without_handlers_is_noop() {
        let bus = EventBus::new();
        bus.emit(PrinterEvent::Disconnected);
        assert_eq!(bus.handler_count(EventName::Data), 0);
    }

    #[test]
    fn test_handler_may_register_during_emit() {
        let bus = Arc::new(EventBus::new());
        let inner = bus.clone();
        bus.on(EventName::Disconnected, move |_| {
            inner.on(EventName::Data, |_| {});
        });

        bus.emit(PrinterEvent::Disconnected);
        assert_eq!(bus.handler_count(EventName::Data), 1);
    }
}
