//! Merge-on-login coordinator.
//!
//! Runs once at the login transition for one collection:
//! 1. read the guest snapshot
//! 2. if it is empty, stop (no network call)
//! 3. submit the whole snapshot as one bulk sync
//! 4. clear the snapshot and reload the authenticated view
//!
//! The collection service deduplicates incoming lines against existing
//! authenticated lines by identity key and sums quantities; the coordinator
//! never fetches the authenticated collection first.
//!
//! Under [`MergePolicy::ClearAlways`] step 4 runs whether or not the bulk
//! sync succeeded, so a failed sync discards the guest lines.
//! [`MergePolicy::RetainOnFailure`] keeps the snapshot after a failed sync so
//! the next login can retry it.

use secrecy::SecretString;
use tracing::{info, instrument, warn};

use crate::collection::CollectionKind;
use crate::engine::CollectionEngine;
use crate::error::{Outcome, SyncError};

/// What happens to the guest snapshot when the bulk sync fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MergePolicy {
    /// Clear the snapshot regardless of the bulk sync outcome.
    #[default]
    ClearAlways,
    /// Clear the snapshot only after a successful bulk sync.
    RetainOnFailure,
}

impl std::fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClearAlways => write!(f, "clear_always"),
            Self::RetainOnFailure => write!(f, "retain_on_failure"),
        }
    }
}

impl std::str::FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clear_always" => Ok(Self::ClearAlways),
            "retain_on_failure" => Ok(Self::RetainOnFailure),
            _ => Err(format!("invalid merge policy: {s}")),
        }
    }
}

/// Result of the bulk sync step.
#[derive(Debug)]
pub enum MergeStatus {
    /// Snapshot was empty; nothing was sent.
    Skipped,
    /// The service accepted the bulk sync.
    Synced,
    /// The bulk sync failed.
    Failed(SyncError),
}

/// Everything a merge did.
#[derive(Debug)]
pub struct MergeReport {
    /// Guest lines read from the snapshot.
    pub submitted: usize,
    pub status: MergeStatus,
    /// Whether the guest snapshot was removed.
    pub snapshot_cleared: bool,
    /// Reload of the authenticated view. `None` when the merge was skipped.
    pub reload: Option<Outcome>,
}

impl MergeReport {
    /// Whether guest lines were dropped without reaching the service.
    #[must_use]
    pub fn lost_guest_lines(&self) -> bool {
        matches!(self.status, MergeStatus::Failed(_)) && self.snapshot_cleared
    }
}

/// Merges the guest snapshot of collection `C` into the authenticated one.
#[derive(Debug)]
pub struct MergeCoordinator<C: CollectionKind> {
    engine: CollectionEngine<C>,
    policy: MergePolicy,
}

impl<C: CollectionKind> MergeCoordinator<C> {
    #[must_use]
    pub const fn new(engine: CollectionEngine<C>, policy: MergePolicy) -> Self {
        Self { engine, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Merge the guest snapshot using `credential`.
    ///
    /// Holds the engine's gate for the whole sequence, so no mutation can
    /// interleave between reading and clearing the snapshot.
    #[instrument(skip(self, credential), fields(collection = C::RESOURCE, policy = %self.policy))]
    pub async fn sync_on_login(&self, credential: &SecretString) -> MergeReport {
        let _gate = self.engine.lock().await;
        let snapshot = self.engine.snapshot();
        let client = self.engine.client();

        let guest_items = snapshot.load();
        if guest_items.is_empty() {
            return MergeReport {
                submitted: 0,
                status: MergeStatus::Skipped,
                snapshot_cleared: false,
                reload: None,
            };
        }

        let lines: Vec<C::Line> = guest_items
            .iter()
            .map(|item| C::line(item, C::quantity(item)))
            .collect();

        let status = match client.bulk_sync::<C>(credential, &lines).await {
            Ok(()) => {
                info!(
                    collection = C::RESOURCE,
                    lines = lines.len(),
                    "Merged guest collection"
                );
                MergeStatus::Synced
            }
            Err(e) => {
                warn!(
                    collection = C::RESOURCE,
                    lines = lines.len(),
                    error = %e,
                    "Bulk sync of guest collection failed"
                );
                MergeStatus::Failed(e.into())
            }
        };

        let retain = matches!(status, MergeStatus::Failed(_))
            && self.policy == MergePolicy::RetainOnFailure;
        let snapshot_cleared = !retain
            && snapshot
                .clear()
                .inspect_err(|e| {
                    warn!(collection = C::RESOURCE, error = %e, "Failed to clear guest snapshot");
                })
                .is_ok();

        let reload = match client.list::<C>(credential).await {
            Ok(items) => {
                self.engine.replace_view(items);
                Outcome::Applied
            }
            Err(e) => {
                warn!(collection = C::RESOURCE, error = %e, "Reload after merge failed");
                Outcome::failure(e.into())
            }
        };

        MergeReport {
            submitted: guest_items.len(),
            status,
            snapshot_cleared,
            reload: Some(reload),
        }
    }
}
