use std::path::{Path, PathBuf};

use domain::{DeviceIdentity, DomainError};
use tracing::{debug, info};

/// Single persisted record of the last connected printer, stored as JSON
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when nothing was saved yet
    pub async fn load(&self) -> Result<Option<DeviceIdentity>, DomainError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "No saved printer identity");
                return Ok(None);
            }
            Err(e) => {
                return Err(DomainError::Persistence(format!(
                    "Failed to read {:?}: {}",
                    self.path, e
                )));
            }
        };

        let identity = serde_json::from_str(&raw).map_err(|e| {
            DomainError::Persistence(format!("Invalid identity file {:?}: {}", self.path, e))
        })?;
        Ok(Some(identity))
    }

    /// Replace the saved record
    pub async fn save(&self, identity: &DeviceIdentity) -> Result<(), DomainError> {
        let json = serde_json::to_vec_pretty(identity)
            .map_err(|e| DomainError::Persistence(e.to_string()))?;

        tokio::fs::write(&self.path, json).await.map_err(|e| {
            DomainError::Persistence(format!("Failed to write {:?}: {}", self.path, e))
        })?;

        info!(path = ?self.path, identity = %identity, "✅ Printer identity saved");
        Ok(())
    }
}
