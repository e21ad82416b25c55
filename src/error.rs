use thiserror::Error;

use crate::host::HostError;

/// Errors raised by farm bookkeeping and reset orchestration.
#[derive(Debug, Error)]
pub enum FarmResetError {
    /// No farm is registered under this name.
    #[error("farm not found: {0}")]
    FarmNotFound(String),

    /// The world a farm lives in is not loaded.
    #[error("world '{world}' for farm '{farm}' not found")]
    WorldNotFound { farm: String, world: String },

    /// A manual reset was requested while another reset is running.
    #[error("a farm reset is already running ({0})")]
    AlreadyInProgress(String),

    /// The host refused or failed to recreate a world.
    #[error("could not create world '{world}': {reason}")]
    WorldCreateFailed { world: String, reason: String },

    /// State or farm files could not be read or written.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Rejected farm definition (bad name, corners in different worlds, ...).
    #[error("invalid farm: {0}")]
    InvalidFarm(String),

    /// Farm creation attempted before both corners were selected.
    #[error("corner {0} has not been set")]
    MissingCorner(u8),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Any other failure reported by the host runtime.
    #[error("host error: {0}")]
    Host(#[from] HostError),
}

impl From<std::io::Error> for FarmResetError {
    fn from(e: std::io::Error) -> Self {
        FarmResetError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for FarmResetError {
    fn from(e: serde_json::Error) -> Self {
        FarmResetError::Persistence(e.to_string())
    }
}

pub type Result<T, E = FarmResetError> = std::result::Result<T, E>;
