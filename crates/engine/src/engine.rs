//! Dual-mode collection engine.
//!
//! One generic engine serves both the cart and the wishlist. Every mutating
//! call re-reads the session, picks a backend, applies the mutation and
//! replaces the in-memory view:
//!
//! - guest: the snapshot is mutated and the new view applied directly
//! - authenticated: the service is mutated, then the view is reloaded in
//!   full (no optimistic update)
//!
//! Mutations and reloads on one engine pass through a FIFO gate, so a reload
//! can never be overwritten by an older one.
//!
//! # Example
//!
//! ```rust,ignore
//! let cart = CollectionEngine::<Cart>::new(session, storage, client);
//!
//! cart.add(CartItem::new(ProductId::new(10), "Tee", price), 1).await;
//! cart.add(CartItem::new(ProductId::new(10), "Tee", price), 2).await;
//! assert_eq!(cart.count(), 3);
//! ```

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use cartsync_core::{CartItem, ItemId, ProductId, WishlistItem};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{instrument, warn};

use crate::aggregates;
use crate::backend::{CollectionBackend, Effect, select_backend};
use crate::collection::{Cart, CollectionKind, Wishlist};
use crate::error::{Outcome, Rejection, SyncError};
use crate::remote::CollectionClient;
use crate::session::{Mode, Session};
use crate::snapshot::SnapshotStore;
use crate::storage::Storage;

/// Engine for one collection type.
///
/// Cheap to clone; clones share the view and the gate.
pub struct CollectionEngine<C: CollectionKind> {
    inner: Arc<EngineInner<C>>,
}

struct EngineInner<C: CollectionKind> {
    session: Session,
    snapshot: SnapshotStore<C>,
    client: CollectionClient,
    view: RwLock<Vec<C::Item>>,
    gate: Mutex<()>,
}

impl<C: CollectionKind> Clone for CollectionEngine<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: CollectionKind> std::fmt::Debug for CollectionEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionEngine")
            .field("collection", &C::RESOURCE)
            .field("mode", &self.mode())
            .field("lines", &self.view().len())
            .finish_non_exhaustive()
    }
}

impl<C: CollectionKind> CollectionEngine<C> {
    /// Create an engine.
    ///
    /// A guest session starts from the stored snapshot; an authenticated one
    /// starts empty until [`reload`](Self::reload) completes.
    #[must_use]
    pub fn new(session: Session, storage: Arc<dyn Storage>, client: CollectionClient) -> Self {
        let snapshot = SnapshotStore::new(storage);
        let initial = match session.mode() {
            Mode::Guest => snapshot.load(),
            Mode::Authenticated => Vec::new(),
        };

        Self {
            inner: Arc::new(EngineInner {
                session,
                snapshot,
                client,
                view: RwLock::new(initial),
                gate: Mutex::new(()),
            }),
        }
    }

    /// Mode the next call will use.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.inner.session.mode()
    }

    /// Copy of the current view.
    #[must_use]
    pub fn items(&self) -> Vec<C::Item> {
        self.view().clone()
    }

    /// Total units in the current view.
    #[must_use]
    pub fn count(&self) -> u64 {
        aggregates::item_count::<C>(&self.view())
    }

    /// Whether the current view references `product_id`.
    #[must_use]
    pub fn is_in_collection(&self, product_id: ProductId) -> bool {
        aggregates::contains::<C>(&self.view(), product_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.view().is_empty()
    }

    /// Remove line `id`. Removing an absent id leaves the collection as is.
    #[instrument(skip(self), fields(collection = C::RESOURCE, item_id = %id))]
    pub async fn remove(&self, id: &ItemId) -> Outcome {
        let _gate = self.lock().await;
        let backend = self.backend();
        let result = backend.remove(id).await;
        self.settle(backend.as_ref(), result, "remove").await
    }

    /// Remove every line.
    #[instrument(skip(self), fields(collection = C::RESOURCE))]
    pub async fn clear(&self) -> Outcome {
        let _gate = self.lock().await;
        let backend = self.backend();
        let result = backend.clear().await;
        self.settle(backend.as_ref(), result, "clear").await
    }

    /// Replace the view from the authoritative store for the current mode.
    ///
    /// On failure the view keeps its previous value.
    #[instrument(skip(self), fields(collection = C::RESOURCE))]
    pub async fn reload(&self) -> Outcome {
        let _gate = self.lock().await;
        let backend = self.backend();
        match backend.load().await {
            Ok(items) => {
                self.replace_view(items);
                Outcome::Applied
            }
            Err(e) => {
                warn!(collection = C::RESOURCE, mode = %backend.mode(), error = %e, "Reload failed");
                Outcome::failure(e)
            }
        }
    }

    async fn add_item(&self, item: C::Item, quantity: i64) -> Outcome {
        let quantity = match validate_quantity(quantity) {
            Ok(quantity) => quantity,
            Err(rejection) => return Outcome::Rejected(rejection),
        };

        let _gate = self.lock().await;
        let backend = self.backend();
        let result = backend.add(item, quantity).await;
        self.settle(backend.as_ref(), result, "add").await
    }

    /// Apply a backend result to the view.
    async fn settle(
        &self,
        backend: &dyn CollectionBackend<C>,
        result: Result<Effect<C::Item>, SyncError>,
        operation: &'static str,
    ) -> Outcome {
        match result {
            Ok(Effect::View(items)) => {
                self.replace_view(items);
                Outcome::Applied
            }
            Ok(Effect::Reload) => match backend.load().await {
                Ok(items) => {
                    self.replace_view(items);
                    Outcome::Applied
                }
                Err(e) => {
                    warn!(
                        collection = C::RESOURCE,
                        operation,
                        error = %e,
                        "Mutation accepted but reload failed, view is stale"
                    );
                    Outcome::Unconfirmed(e)
                }
            },
            Err(SyncError::Rejected(rejection)) => {
                warn!(collection = C::RESOURCE, operation, %rejection, "Mutation rejected");
                Outcome::Rejected(rejection)
            }
            Err(e) => {
                warn!(
                    collection = C::RESOURCE,
                    operation,
                    mode = %backend.mode(),
                    error = %e,
                    "Mutation failed, view unchanged"
                );
                Outcome::failure(e)
            }
        }
    }

    fn backend(&self) -> Box<dyn CollectionBackend<C>> {
        select_backend(&self.inner.session, &self.inner.snapshot, &self.inner.client)
    }

    fn view(&self) -> RwLockReadGuard<'_, Vec<C::Item>> {
        self.inner.view.read().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Crate-internal access for the merge coordinator
    // =========================================================================

    /// Wait for the gate. Holders have exclusive mutation rights.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.inner.gate.lock().await
    }

    pub(crate) fn replace_view(&self, items: Vec<C::Item>) {
        *self
            .inner
            .view
            .write()
            .unwrap_or_else(PoisonError::into_inner) = items;
    }

    pub(crate) fn snapshot(&self) -> &SnapshotStore<C> {
        &self.inner.snapshot
    }

    pub(crate) fn client(&self) -> &CollectionClient {
        &self.inner.client
    }
}

fn validate_quantity(quantity: i64) -> Result<u32, Rejection> {
    if quantity < 1 {
        return Err(Rejection::QuantityBelowOne(quantity));
    }
    u32::try_from(quantity).map_err(|_| Rejection::QuantityTooLarge(quantity))
}

// =============================================================================
// Cart
// =============================================================================

impl CollectionEngine<Cart> {
    /// Add `quantity` units of `item`. A line with the same product and
    /// variant selection is incremented instead of duplicated.
    #[instrument(skip(self, item), fields(collection = Cart::RESOURCE, product_id = %item.product_id))]
    pub async fn add(&self, item: CartItem, quantity: i64) -> Outcome {
        self.add_item(item, quantity).await
    }

    /// Set the quantity of line `id`. Quantities below 1 are rejected.
    #[instrument(skip(self), fields(collection = Cart::RESOURCE, item_id = %id))]
    pub async fn update_quantity(&self, id: &ItemId, quantity: i64) -> Outcome {
        let quantity = match validate_quantity(quantity) {
            Ok(quantity) => quantity,
            Err(rejection) => return Outcome::Rejected(rejection),
        };

        let _gate = self.lock().await;
        let backend = self.backend();
        let result = backend.set_quantity(id, quantity).await;
        self.settle(backend.as_ref(), result, "update_quantity").await
    }

    /// Σ price × quantity over the current view.
    #[must_use]
    pub fn total(&self) -> Decimal {
        aggregates::total_price::<Cart>(&self.view())
    }
}

// =============================================================================
// Wishlist
// =============================================================================

impl CollectionEngine<Wishlist> {
    /// Add `item`. Adding a product already on the wishlist does nothing.
    #[instrument(skip(self, item), fields(collection = Wishlist::RESOURCE, product_id = %item.product_id))]
    pub async fn add(&self, item: WishlistItem) -> Outcome {
        self.add_item(item, 1).await
    }

    /// Add `item` if absent, remove its line if present.
    #[instrument(skip(self, item), fields(collection = Wishlist::RESOURCE, product_id = %item.product_id))]
    pub async fn toggle(&self, item: WishlistItem) -> Outcome {
        let existing = self
            .view()
            .iter()
            .find(|line| line.product_id == item.product_id)
            .map(|line| line.id.clone());

        match existing {
            Some(id) => self.remove(&id).await,
            None => self.add_item(item, 1).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use cartsync_core::VariantSelection;
    use secrecy::SecretString;
    use url::Url;

    use super::*;
    use crate::storage::MemoryStorage;

    fn unreachable_client() -> CollectionClient {
        // Port 9 (discard) on loopback: requests fail fast with a connect error
        CollectionClient::new(Url::parse("http://127.0.0.1:9").expect("url")).expect("client")
    }

    fn guest_engine<C: CollectionKind>() -> (Arc<MemoryStorage>, Session, CollectionEngine<C>) {
        let storage = Arc::new(MemoryStorage::new());
        let session = Session::guest();
        let engine = CollectionEngine::new(
            session.clone(),
            Arc::clone(&storage) as Arc<dyn Storage>,
            unreachable_client(),
        );
        (storage, session, engine)
    }

    fn tee() -> CartItem {
        CartItem::new(ProductId::new(10), "Tee", Decimal::new(1500, 2))
    }

    #[tokio::test]
    async fn test_guest_add_aggregates_quantity() {
        let (_, _, cart) = guest_engine::<Cart>();

        assert!(cart.add(tee(), 1).await.is_applied());
        assert!(cart.add(tee(), 2).await.is_applied());

        let items = cart.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
        assert_eq!(cart.count(), 3);
        assert_eq!(cart.total(), Decimal::new(4500, 2));
        assert!(cart.is_in_collection(ProductId::new(10)));
    }

    #[tokio::test]
    async fn test_guest_add_persists_snapshot() {
        let (storage, session, cart) = guest_engine::<Cart>();
        let _ = cart.add(tee(), 2).await;

        let raw = storage.get("guest_cart").expect("get").expect("snapshot saved");
        let saved: Vec<CartItem> = serde_json::from_str(&raw).expect("valid snapshot");
        assert_eq!(saved, cart.items());

        // A fresh engine over the same storage starts from the snapshot
        let reopened = CollectionEngine::<Cart>::new(
            session,
            storage as Arc<dyn Storage>,
            unreachable_client(),
        );
        assert_eq!(reopened.count(), 2);
    }

    #[tokio::test]
    async fn test_update_quantity_floor() {
        let (_, _, cart) = guest_engine::<Cart>();
        let _ = cart.add(tee(), 2).await;
        let id = cart.items()[0].id.clone();

        for bad in [0, -3] {
            let outcome = cart.update_quantity(&id, bad).await;
            assert!(matches!(
                outcome,
                Outcome::Rejected(Rejection::QuantityBelowOne(q)) if q == bad
            ));
            assert_eq!(cart.items()[0].quantity, 2);
        }

        assert!(cart.update_quantity(&id, 5).await.is_applied());
        assert_eq!(cart.count(), 5);
    }

    #[tokio::test]
    async fn test_add_rejects_non_positive_quantity() {
        let (storage, _, cart) = guest_engine::<Cart>();
        assert!(matches!(
            cart.add(tee(), 0).await,
            Outcome::Rejected(Rejection::QuantityBelowOne(0))
        ));
        assert!(cart.is_empty());
        assert!(storage.get("guest_cart").expect("get").is_none());
    }

    #[tokio::test]
    async fn test_guest_aggregation_overflow_is_rejected() {
        let (storage, _, cart) = guest_engine::<Cart>();
        assert!(cart.add(tee(), 4_000_000_000).await.is_applied());

        let outcome = cart.add(tee(), 1_000_000_000).await;
        assert!(matches!(
            outcome,
            Outcome::Rejected(Rejection::QuantityTooLarge(5_000_000_000))
        ));
        assert_eq!(cart.count(), 4_000_000_000);

        let raw = storage.get("guest_cart").expect("get").expect("snapshot saved");
        let saved: Vec<CartItem> = serde_json::from_str(&raw).expect("valid snapshot");
        assert_eq!(saved[0].quantity, 4_000_000_000);
    }

    #[tokio::test]
    async fn test_total_of_oversized_prices_saturates() {
        let (_, _, cart) = guest_engine::<Cart>();
        let yacht = CartItem::new(ProductId::new(99), "Yacht", Decimal::MAX);

        assert!(cart.add(yacht, 2).await.is_applied());
        assert_eq!(cart.total(), Decimal::MAX);
    }

    #[tokio::test]
    async fn test_remove_absent_id_is_noop() {
        let (_, _, cart) = guest_engine::<Cart>();
        let _ = cart.add(tee(), 1).await;
        let before = cart.items();

        assert!(cart.remove(&ItemId::new("nope")).await.is_applied());
        assert_eq!(cart.items(), before);
    }

    #[tokio::test]
    async fn test_guest_remove_and_clear() {
        let (storage, _, cart) = guest_engine::<Cart>();
        let _ = cart.add(tee(), 1).await;
        let _ = cart
            .add(
                tee().with_variant(VariantSelection {
                    selected_color: Some("red".to_string()),
                    ..VariantSelection::default()
                }),
                1,
            )
            .await;
        assert_eq!(cart.items().len(), 2);

        let id = cart.items()[0].id.clone();
        assert!(cart.remove(&id).await.is_applied());
        assert_eq!(cart.items().len(), 1);

        assert!(cart.clear().await.is_applied());
        assert!(cart.is_empty());
        assert!(storage.get("guest_cart").expect("get").is_none());
    }

    #[tokio::test]
    async fn test_wishlist_set_semantics_and_toggle() {
        let (_, _, wishlist) = guest_engine::<Wishlist>();
        let lamp = WishlistItem::new(ProductId::new(4), "Lamp", Decimal::TEN);

        let _ = wishlist.add(lamp.clone()).await;
        let _ = wishlist.add(lamp.clone()).await;
        assert_eq!(wishlist.items().len(), 1);
        assert_eq!(wishlist.count(), 1);

        assert!(wishlist.toggle(lamp.clone()).await.is_applied());
        assert!(!wishlist.is_in_collection(ProductId::new(4)));

        assert!(wishlist.toggle(lamp).await.is_applied());
        assert!(wishlist.is_in_collection(ProductId::new(4)));
    }

    #[tokio::test]
    async fn test_remote_failure_leaves_view_unchanged() {
        let (_, session, cart) = guest_engine::<Cart>();
        let _ = cart.add(tee(), 1).await;
        let before = cart.items();

        session.login(SecretString::from("tok"));
        assert_eq!(cart.mode(), Mode::Authenticated);

        let outcome = cart.add(tee(), 1).await;
        assert!(matches!(outcome, Outcome::RetryableFailure(SyncError::Remote(_))));
        assert_eq!(cart.items(), before);

        let outcome = cart.clear().await;
        assert!(matches!(outcome, Outcome::RetryableFailure(_)));
        assert_eq!(cart.items(), before);
    }

    #[tokio::test]
    async fn test_logout_is_honored_on_next_call() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let session = Session::authenticated(SecretString::from("tok"));
        let cart = CollectionEngine::<Cart>::new(session.clone(), storage, unreachable_client());
        assert!(cart.is_empty());

        session.logout();
        assert!(cart.add(tee(), 1).await.is_applied());
        assert_eq!(cart.count(), 1);
    }
}
