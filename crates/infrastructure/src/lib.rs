//! Infrastructure layer - Serial ports, configuration and persistence

pub mod config;
pub mod identity_store;
pub mod memory;
pub mod serial;

pub use config::AgentConfig;
pub use identity_store::IdentityStore;
pub use memory::{Journal, MemoryRegistry, MemoryTransport};
pub use serial::{SerialPortRegistry, SerialTransport};
