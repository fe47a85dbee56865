use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid connection configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to open port: {0}")]
    OpenFailed(String),

    #[error("Failed to close port: {0}")]
    CloseFailed(String),

    #[error("Read error: {0}")]
    ReadFailed(String),

    #[error("Write error: {0}")]
    WriteFailed(String),

    #[error("Port is not open")]
    NotOpen,

    #[error("Port stream is locked: {0}")]
    Locked(String),

    #[error("Port registry error: {0}")]
    Registry(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let error = DomainError::OpenFailed("/dev/ttyUSB0: Permission denied".to_string());
        let msg = error.to_string();
        assert!(msg.contains("/dev/ttyUSB0"));
        assert!(msg.contains("Permission denied"));
    }

    #[test]
    fn test_not_open_message() {
        assert_eq!(DomainError::NotOpen.to_string(), "Port is not open");
    }
}
