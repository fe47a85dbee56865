mod connection_state;
mod identity;
mod options;

pub use connection_state::ConnectionState;
pub use identity::{DeviceIdentity, PortInfo};
pub use options::{ConnectionOptions, ConnectionOptionsOverride, FlowControl, Parity};
