//! Error and outcome types for engine operations.
//!
//! Layers return `Result<T, SyncError>` internally. At the engine boundary
//! every mutating call resolves to an [`Outcome`] instead of an error, so UI
//! collaborators can react to failures without the engine ever failing the
//! call.

use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Errors that can occur while synchronizing a collection.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Collection service request failed.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Guest storage could not be written.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Guest snapshot could not be serialized.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The backend refused the input after reading the collection.
    #[error("Rejected: {0}")]
    Rejected(#[from] Rejection),
}

impl SyncError {
    /// Whether repeating the same call may succeed without other changes.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(e) => e.is_retryable(),
            Self::Storage(_) => true,
            Self::Serialize(_) | Self::Rejected(_) => false,
        }
    }
}

/// Input refused before any storage or network access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Quantities below one are never applied.
    #[error("quantity must be at least 1 (got {0})")]
    QuantityBelowOne(i64),

    /// Quantity does not fit a line's counter.
    #[error("quantity too large (got {0})")]
    QuantityTooLarge(i64),
}

/// Result of a mutating engine call.
#[derive(Debug)]
#[must_use]
pub enum Outcome {
    /// The mutation was applied and the in-memory view reflects it.
    Applied,

    /// The collection service accepted the mutation but the follow-up reload
    /// failed. The in-memory view is stale until the next successful reload.
    Unconfirmed(SyncError),

    /// Nothing changed and repeating the call may succeed. The in-memory
    /// view is left at its pre-call value.
    RetryableFailure(SyncError),

    /// Nothing changed and repeating the call as is will fail again (expired
    /// credential, refused request, unreadable response).
    Failed(SyncError),

    /// The input was invalid. Nothing was attempted.
    Rejected(Rejection),
}

impl Outcome {
    /// Wrap an error that left the view unchanged, classified by
    /// [`SyncError::is_retryable`].
    pub fn failure(error: SyncError) -> Self {
        if error.is_retryable() {
            Self::RetryableFailure(error)
        } else {
            Self::Failed(error)
        }
    }

    /// Whether the call completed with its effect visible in the view.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    /// The underlying error, for failed or unconfirmed calls.
    #[must_use]
    pub const fn error(&self) -> Option<&SyncError> {
        match self {
            Self::Unconfirmed(e) | Self::RetryableFailure(e) | Self::Failed(e) => Some(e),
            Self::Applied | Self::Rejected(_) => None,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Unconfirmed(e) => write!(f, "applied, reload failed: {e}"),
            Self::RetryableFailure(e) => write!(f, "failed, may be retried: {e}"),
            Self::Failed(e) => write!(f, "failed: {e}"),
            Self::Rejected(r) => write!(f, "rejected: {r}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_display() {
        let r = Rejection::QuantityBelowOne(-3);
        assert_eq!(r.to_string(), "quantity must be at least 1 (got -3)");
        assert_eq!(
            Outcome::Rejected(r).to_string(),
            "rejected: quantity must be at least 1 (got -3)"
        );
    }

    #[test]
    fn test_outcome_error_accessor() {
        let failed = Outcome::RetryableFailure(SyncError::Remote(RemoteError::RateLimited(5)));
        assert!(!failed.is_applied());
        assert!(failed.error().is_some_and(SyncError::is_retryable));

        assert!(Outcome::Applied.is_applied());
        assert!(Outcome::Applied.error().is_none());
    }

    #[test]
    fn test_unauthorized_is_not_retryable() {
        let err = SyncError::Remote(RemoteError::Unauthorized("expired".to_string()));
        assert!(!err.is_retryable());
        assert!(matches!(
            Outcome::failure(err),
            Outcome::Failed(SyncError::Remote(RemoteError::Unauthorized(_)))
        ));
    }

    #[test]
    fn test_failure_classification() {
        let outcome = Outcome::failure(SyncError::Remote(RemoteError::Api {
            status: 503,
            message: "down".to_string(),
        }));
        assert!(matches!(outcome, Outcome::RetryableFailure(_)));

        let outcome = Outcome::failure(SyncError::Remote(RemoteError::Api {
            status: 400,
            message: "bad line".to_string(),
        }));
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(outcome.to_string(), "failed: Remote error: API error: 400 - bad line");
    }
}
