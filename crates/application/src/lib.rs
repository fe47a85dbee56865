//! Application layer - Printer connection lifecycle, command dispatch and events

pub mod connection;
pub mod event;
pub mod printer;

pub use connection::ConnectionManager;
pub use event::{EventBus, EventHandler};
pub use printer::{DispatchHandle, ReceiptPrinter, WriteDispatcher};
