//! Integration test harness for cartsync.
//!
//! [`MockService`] is an in-process collection service speaking the same
//! HTTP contract as the real one:
//!
//! - `GET /{collection}` - list the caller's lines
//! - `POST /{collection}` - add a line, aggregating by identity key
//! - `PUT /cart/{itemId}` - set a line's quantity
//! - `DELETE /{collection}/{itemId}` - remove a line
//! - `DELETE /{collection}` - remove every line
//! - `POST /{collection}/sync` - merge a batch, summing quantities
//!
//! Collections are keyed by bearer token. [`Failure`] switches make chosen
//! routes answer `503` so failure handling can be exercised.
//!
//! [`TestShop`] wires a [`Storefront`] to a fresh service and a temporary
//! storage directory.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartsync-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use cartsync::remote::QuantityUpdate;
use cartsync::{MergePolicy, Storefront, SyncConfig};
use cartsync_core::{
    CartItem, CartLineInput, ItemId, ProductId, WishlistItem, WishlistLineInput,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Boxed error for test helpers.
pub type TestError = Box<dyn std::error::Error + Send + Sync>;

/// Token the service always rejects with `401`.
pub const REVOKED_TOKEN: &str = "revoked";

/// Which requests the service should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Failure {
    #[default]
    None,
    /// Every request.
    All,
    /// Only `POST /{collection}/sync`.
    Sync,
    /// Only `GET /{collection}`.
    List,
    /// Add, update, remove and clear.
    Mutations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    List,
    Mutate,
    Sync,
}

#[derive(Debug, Default, Clone)]
struct Account {
    cart: Vec<CartItem>,
    wishlist: Vec<WishlistItem>,
}

#[derive(Debug, Default)]
struct Store {
    catalog: HashMap<ProductId, (String, Decimal)>,
    accounts: HashMap<String, Account>,
    failure: Failure,
    wrap_lists: bool,
    requests: usize,
    sync_requests: usize,
}

impl Store {
    fn product(&self, id: ProductId) -> (String, Decimal) {
        self.catalog
            .get(&id)
            .cloned()
            .unwrap_or_else(|| (format!("Product {id}"), Decimal::ONE))
    }

    fn cart_item(&self, line: &CartLineInput) -> CartItem {
        let (title, price) = self.product(line.product_id);
        let mut item =
            CartItem::new(line.product_id, title, price).with_variant(line.variant.canonical());
        item.id = ItemId::new(Uuid::new_v4().to_string());
        item.quantity = line.quantity.unwrap_or(1);
        item
    }

    fn wishlist_item(&self, line: WishlistLineInput) -> WishlistItem {
        let (title, price) = self.product(line.product_id);
        let mut item = WishlistItem::new(line.product_id, title, price);
        item.id = ItemId::new(Uuid::new_v4().to_string());
        item
    }

    fn merge_cart(&mut self, token: &str, line: &CartLineInput) {
        let item = self.cart_item(line);
        let cart = &mut self.accounts.entry(token.to_string()).or_default().cart;
        match cart.iter_mut().find(|existing| existing.same_line(&item)) {
            Some(existing) => existing.quantity += item.quantity,
            None => cart.push(item),
        }
    }

    fn merge_wishlist(&mut self, token: &str, line: WishlistLineInput) {
        let item = self.wishlist_item(line);
        let wishlist = &mut self.accounts.entry(token.to_string()).or_default().wishlist;
        if !wishlist.iter().any(|existing| existing.product_id == item.product_id) {
            wishlist.push(item);
        }
    }

    fn account(&mut self, token: &str) -> &mut Account {
        self.accounts.entry(token.to_string()).or_default()
    }
}

#[derive(Debug, Clone, Default)]
struct MockState(Arc<Mutex<Store>>);

impl MockState {
    fn lock(&self) -> MutexGuard<'_, Store> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the request, apply the failure switch, then check the bearer.
    fn enter(
        &self,
        headers: &HeaderMap,
        call: Call,
    ) -> Result<(MutexGuard<'_, Store>, String), StatusCode> {
        let mut store = self.lock();
        store.requests += 1;
        if call == Call::Sync {
            store.sync_requests += 1;
        }

        let failing = match store.failure {
            Failure::None => false,
            Failure::All => true,
            Failure::Sync => call == Call::Sync,
            Failure::List => call == Call::List,
            Failure::Mutations => call == Call::Mutate,
        };
        if failing {
            debug!(?call, "Mock service failing request");
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }

        let token = bearer(headers)?;
        Ok((store, token))
    }
}

fn bearer(headers: &HeaderMap) -> Result<String, StatusCode> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token == REVOKED_TOKEN {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(token.to_string())
}

#[derive(Serialize)]
struct Wrapped<T> {
    items: Vec<T>,
}

#[derive(Deserialize)]
struct SyncBody<L> {
    items: Vec<L>,
}

fn listing<T: Serialize>(items: Vec<T>, wrap: bool) -> Response {
    if wrap {
        Json(Wrapped { items }).into_response()
    } else {
        Json(items).into_response()
    }
}

// =============================================================================
// Cart routes
// =============================================================================

async fn list_cart(
    State(state): State<MockState>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    let (mut store, token) = state.enter(&headers, Call::List)?;
    let wrap = store.wrap_lists;
    let items = store.account(&token).cart.clone();
    Ok(listing(items, wrap))
}

async fn add_cart(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(line): Json<CartLineInput>,
) -> Result<StatusCode, StatusCode> {
    let (mut store, token) = state.enter(&headers, Call::Mutate)?;
    if line.quantity == Some(0) {
        return Err(StatusCode::BAD_REQUEST);
    }
    store.merge_cart(&token, &line);
    Ok(StatusCode::CREATED)
}

async fn update_cart(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<QuantityUpdate>,
) -> Result<StatusCode, StatusCode> {
    let (mut store, token) = state.enter(&headers, Call::Mutate)?;
    if update.quantity == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let line = store
        .account(&token)
        .cart
        .iter_mut()
        .find(|item| item.id.as_str() == id)
        .ok_or(StatusCode::NOT_FOUND)?;
    line.quantity = update.quantity;
    Ok(StatusCode::OK)
}

async fn remove_cart(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let (mut store, token) = state.enter(&headers, Call::Mutate)?;
    store.account(&token).cart.retain(|item| item.id.as_str() != id);
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_cart(
    State(state): State<MockState>,
    headers: HeaderMap,
) -> Result<StatusCode, StatusCode> {
    let (mut store, token) = state.enter(&headers, Call::Mutate)?;
    store.account(&token).cart.clear();
    Ok(StatusCode::NO_CONTENT)
}

async fn sync_cart(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<SyncBody<CartLineInput>>,
) -> Result<StatusCode, StatusCode> {
    let (mut store, token) = state.enter(&headers, Call::Sync)?;
    for line in &body.items {
        store.merge_cart(&token, line);
    }
    Ok(StatusCode::OK)
}

// =============================================================================
// Wishlist routes
// =============================================================================

async fn list_wishlist(
    State(state): State<MockState>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    let (mut store, token) = state.enter(&headers, Call::List)?;
    let wrap = store.wrap_lists;
    let items = store.account(&token).wishlist.clone();
    Ok(listing(items, wrap))
}

async fn add_wishlist(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(line): Json<WishlistLineInput>,
) -> Result<StatusCode, StatusCode> {
    let (mut store, token) = state.enter(&headers, Call::Mutate)?;
    store.merge_wishlist(&token, line);
    Ok(StatusCode::CREATED)
}

async fn remove_wishlist(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let (mut store, token) = state.enter(&headers, Call::Mutate)?;
    store
        .account(&token)
        .wishlist
        .retain(|item| item.id.as_str() != id);
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_wishlist(
    State(state): State<MockState>,
    headers: HeaderMap,
) -> Result<StatusCode, StatusCode> {
    let (mut store, token) = state.enter(&headers, Call::Mutate)?;
    store.account(&token).wishlist.clear();
    Ok(StatusCode::NO_CONTENT)
}

async fn sync_wishlist(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<SyncBody<WishlistLineInput>>,
) -> Result<StatusCode, StatusCode> {
    let (mut store, token) = state.enter(&headers, Call::Sync)?;
    for line in body.items {
        store.merge_wishlist(&token, line);
    }
    Ok(StatusCode::OK)
}

fn routes() -> Router<MockState> {
    Router::new()
        .route("/cart", get(list_cart).post(add_cart).delete(clear_cart))
        .route("/cart/sync", post(sync_cart))
        .route("/cart/{id}", put(update_cart).delete(remove_cart))
        .route(
            "/wishlist",
            get(list_wishlist).post(add_wishlist).delete(clear_wishlist),
        )
        .route("/wishlist/sync", post(sync_wishlist))
        .route("/wishlist/{id}", delete(remove_wishlist))
}

// =============================================================================
// MockService
// =============================================================================

/// A running mock collection service. Stops with the test runtime.
#[derive(Debug, Clone)]
pub struct MockService {
    state: MockState,
    base_url: Url,
}

impl MockService {
    /// Bind `127.0.0.1:0` and serve the routes under `/api`.
    ///
    /// # Errors
    ///
    /// Returns error if the listener cannot be bound.
    pub async fn start() -> Result<Self, TestError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = MockState::default();

        let app = Router::new()
            .nest("/api", routes())
            .with_state(state.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Mock collection service stopped");
            }
        });

        let base_url = Url::parse(&format!("http://{addr}/api/"))?;
        Ok(Self { state, base_url })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Register display data for a product.
    pub fn add_product(&self, id: i32, title: &str, price: Decimal) {
        self.state
            .lock()
            .catalog
            .insert(ProductId::new(id), (title.to_string(), price));
    }

    /// Put lines into `token`'s cart as if added earlier from another device.
    pub fn seed_cart(&self, token: &str, lines: &[CartLineInput]) {
        let mut store = self.state.lock();
        for line in lines {
            store.merge_cart(token, line);
        }
    }

    pub fn seed_wishlist(&self, token: &str, products: &[i32]) {
        let mut store = self.state.lock();
        for &product_id in products {
            store.merge_wishlist(
                token,
                WishlistLineInput {
                    product_id: ProductId::new(product_id),
                },
            );
        }
    }

    #[must_use]
    pub fn cart(&self, token: &str) -> Vec<CartItem> {
        self.state.lock().account(token).cart.clone()
    }

    #[must_use]
    pub fn wishlist(&self, token: &str) -> Vec<WishlistItem> {
        self.state.lock().account(token).wishlist.clone()
    }

    pub fn set_failure(&self, failure: Failure) {
        self.state.lock().failure = failure;
    }

    /// Answer listings as `{"items": [...]}` instead of a bare array.
    pub fn set_wrap_lists(&self, wrap: bool) {
        self.state.lock().wrap_lists = wrap;
    }

    /// Requests received so far, including failed ones.
    #[must_use]
    pub fn requests(&self) -> usize {
        self.state.lock().requests
    }

    #[must_use]
    pub fn sync_requests(&self) -> usize {
        self.state.lock().sync_requests
    }
}

// =============================================================================
// TestShop
// =============================================================================

/// A storefront persisting to a temporary directory, talking to a fresh
/// [`MockService`].
pub struct TestShop {
    pub service: MockService,
    pub shop: Storefront,
    storage: TempDir,
    policy: MergePolicy,
}

impl TestShop {
    /// # Errors
    ///
    /// Returns error if the service cannot start or the storefront cannot be
    /// built.
    pub async fn start(policy: MergePolicy) -> Result<Self, TestError> {
        let service = MockService::start().await?;
        let storage = tempfile::tempdir()?;
        let shop = open(&service, &storage, policy)?;
        Ok(Self {
            service,
            shop,
            storage,
            policy,
        })
    }

    /// A second storefront over the same storage, as a restarted process
    /// would see it.
    ///
    /// # Errors
    ///
    /// Returns error if the storefront cannot be built.
    pub fn reopen(&self) -> Result<Storefront, TestError> {
        open(&self.service, &self.storage, self.policy)
    }

    /// Directory holding the guest snapshots and the credential.
    #[must_use]
    pub fn storage_dir(&self) -> &std::path::Path {
        self.storage.path()
    }
}

fn open(
    service: &MockService,
    storage: &TempDir,
    policy: MergePolicy,
) -> Result<Storefront, TestError> {
    let base_url = service.base_url().to_string();
    let storage_dir = storage.path().to_string_lossy().into_owned();
    let policy = policy.to_string();

    let config = SyncConfig::from_vars(|key| match key {
        "CARTSYNC_API_BASE_URL" => Some(base_url.clone()),
        "CARTSYNC_STORAGE_DIR" => Some(storage_dir.clone()),
        "CARTSYNC_MERGE_POLICY" => Some(policy.clone()),
        _ => None,
    })?;
    Ok(Storefront::new(&config)?)
}
