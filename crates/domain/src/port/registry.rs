use async_trait::async_trait;
use tokio::sync::broadcast;

use super::transport::PortHandle;
use crate::connection::DeviceIdentity;
use crate::error::DomainError;

/// Host environment that hands out ports.
///
/// Stands in for the device chooser, the list of already authorized ports and the
/// process-wide disconnect notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortRegistry: Send + Sync {
    /// Let the user pick a port. `None` means nothing was picked.
    async fn request_port(&self) -> Result<Option<PortHandle>, DomainError>;

    /// Ports the user already authorized
    async fn authorized_ports(&self) -> Result<Vec<PortHandle>, DomainError>;

    /// Physical disconnect notices for every port this registry handed out.
    /// Dropping the receiver unsubscribes.
    fn subscribe_disconnects(&self) -> broadcast::Receiver<PortHandle>;
}

/// The one port reporting `identity`, or `None` when zero or several do
pub fn select_unique(ports: Vec<PortHandle>, identity: &DeviceIdentity) -> Option<PortHandle> {
    if !identity.is_complete() {
        return None;
    }

    let mut matches = ports
        .into_iter()
        .filter(|port| identity.matches(&port.info()));

    match (matches.next(), matches.next()) {
        (Some(port), None) => Some(port),
        _ => None,
    }
}
