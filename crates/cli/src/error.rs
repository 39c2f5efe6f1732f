//! CLI error type.

use cartsync::{ConfigError, Rejection, SyncError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Sync(#[from] SyncError),

    /// An engine call left the collection unchanged.
    #[error("{operation} failed: {source}")]
    Failed {
        operation: &'static str,
        source: SyncError,
    },

    #[error("{operation} rejected: {rejection}")]
    Rejected {
        operation: &'static str,
        rejection: Rejection,
    },

    #[error("Invalid token: {0}")]
    InvalidToken(&'static str),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),
}
