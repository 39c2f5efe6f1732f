//! Guest snapshot of one collection.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::warn;

use crate::collection::CollectionKind;
use crate::error::SyncError;
use crate::storage::Storage;

/// Reads and writes the guest snapshot of collection `C` as a JSON array
/// under `C::STORAGE_KEY`.
pub struct SnapshotStore<C: CollectionKind> {
    storage: Arc<dyn Storage>,
    _collection: PhantomData<C>,
}

impl<C: CollectionKind> Clone for SnapshotStore<C> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            _collection: PhantomData,
        }
    }
}

impl<C: CollectionKind> SnapshotStore<C> {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            _collection: PhantomData,
        }
    }

    /// Load the snapshot.
    ///
    /// Missing, unreadable, or malformed content yields an empty collection.
    #[must_use]
    pub fn load(&self) -> Vec<C::Item> {
        let raw = match self.storage.get(C::STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(key = C::STORAGE_KEY, error = %e, "Failed to read guest snapshot");
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(key = C::STORAGE_KEY, error = %e, "Discarding malformed guest snapshot");
            Vec::new()
        })
    }

    /// Overwrite the snapshot with `items`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if serialization or the storage write fails.
    pub fn save(&self, items: &[C::Item]) -> Result<(), SyncError> {
        let raw = serde_json::to_string(items)?;
        self.storage.set(C::STORAGE_KEY, &raw)?;
        Ok(())
    }

    /// Delete the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the storage area cannot be modified.
    pub fn clear(&self) -> Result<(), SyncError> {
        self.storage.remove(C::STORAGE_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cartsync_core::{CartItem, ProductId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::collection::Cart;
    use crate::storage::MemoryStorage;

    fn store() -> (Arc<MemoryStorage>, SnapshotStore<Cart>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = SnapshotStore::new(Arc::clone(&storage) as Arc<dyn Storage>);
        (storage, store)
    }

    #[test]
    fn test_missing_snapshot_is_empty() {
        let (storage, store) = store();
        assert!(store.load().is_empty());
        assert!(storage.get("guest_cart").expect("get").is_none());
    }

    #[test]
    fn test_corrupt_snapshot_is_empty() {
        let (storage, store) = store();
        storage.set("guest_cart", "{not json").expect("set");
        assert!(store.load().is_empty());

        storage
            .set("guest_cart", r#"{"productId": 1}"#)
            .expect("set");
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_save_then_clear() {
        let (storage, store) = store();
        let items = vec![CartItem::new(ProductId::new(1), "A", Decimal::ONE)];

        store.save(&items).expect("save");
        assert_eq!(store.load(), items);
        assert!(storage.get("guest_cart").expect("get").is_some());

        store.clear().expect("clear");
        assert!(storage.get("guest_cart").expect("get").is_none());
        assert!(store.load().is_empty());
    }
}
