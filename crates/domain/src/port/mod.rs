mod registry;
mod transport;

pub use registry::{PortRegistry, select_unique};
pub use transport::{PortHandle, PortReader, PortTransport, PortWriter, ReadChunk};

#[cfg(test)]
pub use transport::MockPortTransport;
