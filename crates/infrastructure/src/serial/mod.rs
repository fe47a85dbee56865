mod registry;
mod transport;

pub use registry::SerialPortRegistry;
pub use transport::SerialTransport;
