use serde::{Deserialize, Serialize};

/// Lifecycle state of a printer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No transport held
    #[default]
    Disconnected,
    /// Transport held and (being) opened
    Open,
    /// Orderly teardown in progress: reader being cancelled, transport about to close
    Closing,
}

impl ConnectionState {
    /// Check if state allows a new session to start
    pub fn can_open(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Check if the session is open for reads and writes
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Check if an orderly teardown is underway
    pub fn is_closing(&self) -> bool {
        matches!(self, Self::Closing)
    }

    /// Transition to open state (first transition of a fresh session)
    pub fn to_open(&self) -> Result<Self, &'static str> {
        if self.can_open() {
            Ok(Self::Open)
        } else {
            Err("Can only open from Disconnected state")
        }
    }

    /// Transition to closing state
    pub fn to_closing(&self) -> Result<Self, &'static str> {
        match self {
            Self::Open => Ok(Self::Closing),
            _ => Err("Can only start closing from Open state"),
        }
    }

    /// Transition to disconnected state (teardown complete, failed open, or device gone)
    pub fn to_disconnected(&self) -> Self {
        Self::Disconnected
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Open => "open",
            Self::Closing => "closing",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
