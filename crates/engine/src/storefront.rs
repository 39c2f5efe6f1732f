//! Shopper-facing facade over the cart and the wishlist.
//!
//! Owns one [`Session`], both engines and both merge coordinators, and wires
//! the login transition to the merges.

use std::sync::Arc;

use cartsync_core::CurrencyCode;
use secrecy::SecretString;
use tracing::{info, instrument};

use crate::collection::{Cart, CollectionKind, Wishlist};
use crate::config::SyncConfig;
use crate::engine::CollectionEngine;
use crate::error::{Outcome, SyncError};
use crate::merge::{MergeCoordinator, MergePolicy, MergeReport, MergeStatus};
use crate::remote::CollectionClient;
use crate::session::{Mode, Session};
use crate::storage::{FileStorage, Storage};

/// Merge results for both collections.
#[derive(Debug)]
pub struct LoginReport {
    pub cart: MergeReport,
    pub wishlist: MergeReport,
}

impl LoginReport {
    /// Whether either collection dropped guest lines.
    #[must_use]
    pub fn lost_guest_lines(&self) -> bool {
        self.cart.lost_guest_lines() || self.wishlist.lost_guest_lines()
    }
}

#[derive(Debug)]
pub struct Storefront {
    session: Session,
    currency: CurrencyCode,
    cart: CollectionEngine<Cart>,
    wishlist: CollectionEngine<Wishlist>,
    cart_merge: MergeCoordinator<Cart>,
    wishlist_merge: MergeCoordinator<Wishlist>,
}

impl Storefront {
    /// Build a storefront persisting to `config.storage_dir`.
    ///
    /// A credential stored by an earlier process is picked up.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(&config.storage_dir));
        let client = CollectionClient::new(config.api_base_url.clone())?;
        let session = Session::persistent(Arc::clone(&storage));

        Ok(Self::with_parts(session, storage, client, config.merge_policy)
            .with_currency(config.currency))
    }

    /// Build a storefront from explicit parts.
    #[must_use]
    pub fn with_parts(
        session: Session,
        storage: Arc<dyn Storage>,
        client: CollectionClient,
        policy: MergePolicy,
    ) -> Self {
        let cart = CollectionEngine::new(session.clone(), Arc::clone(&storage), client.clone());
        let wishlist = CollectionEngine::new(session.clone(), storage, client);

        Self {
            session,
            currency: CurrencyCode::default(),
            cart_merge: MergeCoordinator::new(cart.clone(), policy),
            wishlist_merge: MergeCoordinator::new(wishlist.clone(), policy),
            cart,
            wishlist,
        }
    }

    #[must_use]
    pub const fn with_currency(mut self, currency: CurrencyCode) -> Self {
        self.currency = currency;
        self
    }

    #[must_use]
    pub const fn cart(&self) -> &CollectionEngine<Cart> {
        &self.cart
    }

    #[must_use]
    pub const fn wishlist(&self) -> &CollectionEngine<Wishlist> {
        &self.wishlist
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.session.mode()
    }

    /// Store `credential` and merge both guest collections into the
    /// authenticated ones.
    ///
    /// When a collection had no guest lines its merge is skipped, and the
    /// view is reloaded from the service instead.
    #[instrument(skip_all)]
    pub async fn login(&self, credential: SecretString) -> LoginReport {
        self.session.login(credential.clone());

        let (cart, wishlist) = tokio::join!(
            merge_or_reload(&self.cart_merge, &self.cart, &credential),
            merge_or_reload(&self.wishlist_merge, &self.wishlist, &credential),
        );

        info!(
            cart_lines = cart.submitted,
            wishlist_lines = wishlist.submitted,
            "Logged in"
        );
        LoginReport { cart, wishlist }
    }

    /// Drop the credential and show the guest collections again.
    #[instrument(skip_all)]
    pub async fn logout(&self) -> (Outcome, Outcome) {
        self.session.logout();
        info!("Logged out");
        self.restore().await
    }

    /// Reload both views from the store of the current mode.
    pub async fn restore(&self) -> (Outcome, Outcome) {
        tokio::join!(self.cart.reload(), self.wishlist.reload())
    }
}

async fn merge_or_reload<C: CollectionKind>(
    coordinator: &MergeCoordinator<C>,
    engine: &CollectionEngine<C>,
    credential: &SecretString,
) -> MergeReport {
    let mut report = coordinator.sync_on_login(credential).await;
    if matches!(report.status, MergeStatus::Skipped) {
        report.reload = Some(engine.reload().await);
    }
    report
}
