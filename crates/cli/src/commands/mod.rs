//! Command implementations.

pub mod cart;
pub mod session;
pub mod wishlist;

use cartsync::Outcome;

use crate::error::CliError;

/// Turn an engine outcome into a command result.
///
/// An unconfirmed mutation reached the service, so it is reported but not
/// treated as a failure.
pub fn finish(operation: &'static str, outcome: Outcome) -> Result<(), CliError> {
    match outcome {
        Outcome::Applied => Ok(()),
        Outcome::Unconfirmed(e) => {
            tracing::warn!(operation, error = %e, "Applied, but the view could not be refreshed");
            Ok(())
        }
        Outcome::RetryableFailure(source) | Outcome::Failed(source) => {
            Err(CliError::Failed { operation, source })
        }
        Outcome::Rejected(rejection) => Err(CliError::Rejected {
            operation,
            rejection,
        }),
    }
}

pub fn warn_unless_applied(operation: &'static str, outcome: &Outcome) {
    if !outcome.is_applied() {
        tracing::warn!(operation, outcome = %outcome, "Showing a possibly stale collection");
    }
}
