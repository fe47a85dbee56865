//! Domain layer - Printer connection model with no external integrations
//!
//! This crate contains:
//! - Connection model (ConnectionState, ConnectionOptions, DeviceIdentity)
//! - Printer events
//! - Port interfaces (traits) implemented by the infrastructure layer
//!
//! Principles:
//! - No dependencies on infrastructure
//! - State transitions enforced at domain level
//! - Bytes are opaque: nothing here parses printer commands or replies

pub mod connection;
pub mod error;
pub mod event;
pub mod port;

// Re-export commonly used types
pub use connection::{
    ConnectionOptions, ConnectionOptionsOverride, ConnectionState, DeviceIdentity, PortInfo,
};
pub use error::DomainError;
pub use event::{EventName, PrinterEvent};
pub use port::{PortHandle, PortRegistry, PortTransport};
