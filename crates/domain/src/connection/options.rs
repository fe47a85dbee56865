use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    #[default]
    None,
    Hardware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Serial line settings handed to the transport when a session opens.
///
/// Immutable once built. Defaults are `9600 8N1`, no flow control, 255 byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    #[serde(default = "default_baud_rate")]
    baud_rate: u32,
    #[serde(default = "default_buffer_size")]
    buffer_size: u32,
    #[serde(default = "default_data_bits")]
    data_bits: u8,
    #[serde(default)]
    flow_control: FlowControl,
    #[serde(default)]
    parity: Parity,
    #[serde(default = "default_stop_bits")]
    stop_bits: u8,
}

fn default_baud_rate() -> u32 {
    9600
}
fn default_buffer_size() -> u32 {
    255
}
fn default_data_bits() -> u8 {
    8
}
fn default_stop_bits() -> u8 {
    1
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            buffer_size: default_buffer_size(),
            data_bits: default_data_bits(),
            flow_control: FlowControl::default(),
            parity: Parity::default(),
            stop_bits: default_stop_bits(),
        }
    }
}

/// Caller-supplied fields layered over the defaults, one field at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionOptionsOverride {
    #[serde(default)]
    pub baud_rate: Option<u32>,
    #[serde(default)]
    pub buffer_size: Option<u32>,
    #[serde(default)]
    pub data_bits: Option<u8>,
    #[serde(default)]
    pub flow_control: Option<FlowControl>,
    #[serde(default)]
    pub parity: Option<Parity>,
    #[serde(default)]
    pub stop_bits: Option<u8>,
}

impl ConnectionOptions {
    /// Merge `overrides` over the defaults and validate the result
    pub fn with_overrides(overrides: ConnectionOptionsOverride) -> Result<Self, DomainError> {
        let defaults = Self::default();
        let options = Self {
            baud_rate: overrides.baud_rate.unwrap_or(defaults.baud_rate),
            buffer_size: overrides.buffer_size.unwrap_or(defaults.buffer_size),
            data_bits: overrides.data_bits.unwrap_or(defaults.data_bits),
            flow_control: overrides.flow_control.unwrap_or(defaults.flow_control),
            parity: overrides.parity.unwrap_or(defaults.parity),
            stop_bits: overrides.stop_bits.unwrap_or(defaults.stop_bits),
        };
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.baud_rate == 0 {
            return Err(DomainError::InvalidConfiguration(
                "Baud rate must be greater than zero".to_string(),
            ));
        }
        if self.buffer_size == 0 {
            return Err(DomainError::InvalidConfiguration(
                "Buffer size must be greater than zero".to_string(),
            ));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(DomainError::InvalidConfiguration(format!(
                "Invalid data bits: {}",
                self.data_bits
            )));
        }
        if !matches!(self.stop_bits, 1 | 2) {
            return Err(DomainError::InvalidConfiguration(format!(
                "Invalid stop bits: {}",
                self.stop_bits
            )));
        }
        Ok(())
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Opaque to the core; transports decide what it sizes
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn data_bits(&self) -> u8 {
        self.data_bits
    }

    pub fn flow_control(&self) -> FlowControl {
        self.flow_control
    }

    pub fn parity(&self) -> Parity {
        self.parity
    }

    pub fn stop_bits(&self) -> u8 {
        self.stop_bits
    }
}
