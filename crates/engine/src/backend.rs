//! Storage backends behind the dual-mode engine.
//!
//! [`LocalBackend`] mutates the guest snapshot synchronously and hands the
//! new view straight back. [`RemoteBackend`] forwards each mutation to the
//! collection service and asks the engine to reload, never merging the
//! mutation's result into the view itself. [`select_backend`] picks one from
//! the session at call time.

use async_trait::async_trait;
use cartsync_core::ItemId;
use chrono::Utc;
use secrecy::SecretString;
use tracing::debug;

use crate::collection::CollectionKind;
use crate::error::{Rejection, SyncError};
use crate::remote::CollectionClient;
use crate::session::{Mode, Session};
use crate::snapshot::SnapshotStore;

/// What the engine must do with its view after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect<T> {
    /// Replace the view with these items.
    View(Vec<T>),
    /// Reload the view from the backend.
    Reload,
}

/// Capability interface shared by guest and authenticated storage.
#[async_trait]
pub trait CollectionBackend<C: CollectionKind>: Send + Sync {
    fn mode(&self) -> Mode;

    /// Read the full collection.
    async fn load(&self) -> Result<Vec<C::Item>, SyncError>;

    /// Add `quantity` units of `item`, aggregating with an existing line of
    /// the same identity key.
    async fn add(&self, item: C::Item, quantity: u32) -> Result<Effect<C::Item>, SyncError>;

    /// Remove the line `id`. Absent ids are not an error.
    async fn remove(&self, id: &ItemId) -> Result<Effect<C::Item>, SyncError>;

    /// Set the quantity of line `id` to `quantity` (at least 1).
    async fn set_quantity(
        &self,
        id: &ItemId,
        quantity: u32,
    ) -> Result<Effect<C::Item>, SyncError>;

    /// Remove every line.
    async fn clear(&self) -> Result<Effect<C::Item>, SyncError>;
}

/// Pick the backend for the session's current credential.
#[must_use]
pub fn select_backend<C: CollectionKind>(
    session: &Session,
    snapshot: &SnapshotStore<C>,
    client: &CollectionClient,
) -> Box<dyn CollectionBackend<C>> {
    match session.credential() {
        Some(credential) => {
            debug!(collection = C::RESOURCE, "Using authenticated backend");
            Box::new(RemoteBackend::new(client.clone(), credential))
        }
        None => {
            debug!(collection = C::RESOURCE, "Using guest backend");
            Box::new(LocalBackend::new(snapshot.clone()))
        }
    }
}

// =============================================================================
// LocalBackend
// =============================================================================

/// Guest storage: the snapshot is both the source and the destination of
/// every mutation.
pub struct LocalBackend<C: CollectionKind> {
    snapshot: SnapshotStore<C>,
}

impl<C: CollectionKind> LocalBackend<C> {
    #[must_use]
    pub const fn new(snapshot: SnapshotStore<C>) -> Self {
        Self { snapshot }
    }

    fn persist(&self, items: Vec<C::Item>) -> Result<Effect<C::Item>, SyncError> {
        self.snapshot.save(&items)?;
        Ok(Effect::View(items))
    }
}

#[async_trait]
impl<C: CollectionKind> CollectionBackend<C> for LocalBackend<C> {
    fn mode(&self) -> Mode {
        Mode::Guest
    }

    async fn load(&self) -> Result<Vec<C::Item>, SyncError> {
        Ok(self.snapshot.load())
    }

    async fn add(&self, item: C::Item, quantity: u32) -> Result<Effect<C::Item>, SyncError> {
        let mut items = self.snapshot.load();

        if let Some(existing) = items.iter_mut().find(|line| C::same_key(line, &item)) {
            if C::AGGREGATES_QUANTITY {
                let current = C::quantity(existing);
                let total = current.checked_add(quantity).ok_or_else(|| {
                    Rejection::QuantityTooLarge(i64::from(current) + i64::from(quantity))
                })?;
                C::set_quantity(existing, total);
            }
        } else {
            let mut item = item;
            C::prepare_guest(&mut item, Utc::now());
            C::set_quantity(&mut item, quantity);
            items.push(item);
        }

        self.persist(items)
    }

    async fn remove(&self, id: &ItemId) -> Result<Effect<C::Item>, SyncError> {
        let mut items = self.snapshot.load();
        items.retain(|line| C::id(line) != id);
        self.persist(items)
    }

    async fn set_quantity(
        &self,
        id: &ItemId,
        quantity: u32,
    ) -> Result<Effect<C::Item>, SyncError> {
        let mut items = self.snapshot.load();
        for line in items.iter_mut().filter(|line| C::id(line) == id) {
            C::set_quantity(line, quantity);
        }
        self.persist(items)
    }

    async fn clear(&self) -> Result<Effect<C::Item>, SyncError> {
        self.snapshot.clear()?;
        Ok(Effect::View(Vec::new()))
    }
}

// =============================================================================
// RemoteBackend
// =============================================================================

/// Authenticated storage: the collection service owns the collection.
pub struct RemoteBackend {
    client: CollectionClient,
    credential: SecretString,
}

impl RemoteBackend {
    #[must_use]
    pub const fn new(client: CollectionClient, credential: SecretString) -> Self {
        Self { client, credential }
    }
}

#[async_trait]
impl<C: CollectionKind> CollectionBackend<C> for RemoteBackend {
    fn mode(&self) -> Mode {
        Mode::Authenticated
    }

    async fn load(&self) -> Result<Vec<C::Item>, SyncError> {
        Ok(self.client.list::<C>(&self.credential).await?)
    }

    async fn add(&self, item: C::Item, quantity: u32) -> Result<Effect<C::Item>, SyncError> {
        let line = C::line(&item, quantity);
        self.client.add::<C>(&self.credential, &line).await?;
        Ok(Effect::Reload)
    }

    async fn remove(&self, id: &ItemId) -> Result<Effect<C::Item>, SyncError> {
        self.client.remove::<C>(&self.credential, id).await?;
        Ok(Effect::Reload)
    }

    async fn set_quantity(
        &self,
        id: &ItemId,
        quantity: u32,
    ) -> Result<Effect<C::Item>, SyncError> {
        self.client
            .set_quantity::<C>(&self.credential, id, quantity)
            .await?;
        Ok(Effect::Reload)
    }

    async fn clear(&self) -> Result<Effect<C::Item>, SyncError> {
        self.client.clear_all::<C>(&self.credential).await?;
        // Clearing has a deterministic result, no reload needed
        Ok(Effect::View(Vec::new()))
    }
}
