use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::connection::PortInfo;
use crate::error::DomainError;

/// Payload of the `connected` event.
///
/// `language` and `codepage_mapping` are reserved for a printer profile layered on top
/// and are always `None` here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub language: Option<String>,
    pub codepage_mapping: Option<String>,
}

impl ConnectedEvent {
    pub fn serial(info: PortInfo) -> Self {
        Self {
            kind: "serial".to_string(),
            vendor_id: info.usb_vendor_id,
            product_id: info.usb_product_id,
            language: None,
            codepage_mapping: None,
        }
    }
}

/// Events emitted by a printer connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterEvent {
    /// A session opened
    Connected(ConnectedEvent),
    /// A session ended, orderly or because the device went away
    Disconnected,
    /// One chunk exactly as the transport delivered it
    Data(Bytes),
}

impl PrinterEvent {
    pub fn connected(info: PortInfo) -> Self {
        Self::Connected(ConnectedEvent::serial(info))
    }

    pub fn name(&self) -> EventName {
        match self {
            Self::Connected(_) => EventName::Connected,
            Self::Disconnected => EventName::Disconnected,
            Self::Data(_) => EventName::Data,
        }
    }
}

/// Names handlers register under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventName {
    Connected,
    Disconnected,
    Data,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Data => "data",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(Self::Connected),
            "disconnected" => Ok(Self::Disconnected),
            "data" => Ok(Self::Data),
            other => Err(DomainError::InvalidConfiguration(format!(
                "Unknown event name: {}",
                other
            ))),
        }
    }
}
