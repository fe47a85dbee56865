pub mod agent;

pub use agent::{Agent, PortListing, hex, list_ports};
