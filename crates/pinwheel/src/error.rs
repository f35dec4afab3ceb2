use crate::storage::StorageError;
use spinctl::types::ConfigName;
use thiserror::Error;

/// Errors surfaced by wheel operations. All of them are recovered at the operation
/// boundary and shown to the user as a notice; none ends the session.
#[derive(Debug, Error)]
pub enum WheelError {
    /// Required text was empty. Nothing was changed.
    #[error("{0}")]
    Validation(&'static str),
    /// Unknown configuration name. Nothing was changed.
    #[error("Configuration \"{0}\" not found")]
    NotFound(ConfigName),
    /// The change is live in memory but could not be written to storage.
    #[error("Could not save {what}. Storage might be full ({source})")]
    StorageQuota {
        what: &'static str,
        #[source]
        source: StorageError,
    },
    #[error("Malformed data: {0}")]
    Malformed(String),
}

impl WheelError {
    /// Whether the failed operation still took effect for the running session.
    pub fn is_non_fatal(&self) -> bool {
        matches!(self, Self::StorageQuota { .. })
    }
}

impl From<serde_json::Error> for WheelError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}
