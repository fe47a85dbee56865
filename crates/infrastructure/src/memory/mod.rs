//! In-process ports for tests and dry runs

mod journal;
mod registry;
mod transport;

pub use journal::Journal;
pub use registry::MemoryRegistry;
pub use transport::MemoryTransport;
