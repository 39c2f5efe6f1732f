//! Collection capabilities: what differs between the cart and the wishlist.
//!
//! The engine, backends and merge coordinator are generic over
//! [`CollectionKind`]. [`Cart`] and [`Wishlist`] differ only in item shape,
//! identity key, and whether adding a duplicate aggregates quantity.

use std::fmt::Debug;

use cartsync_core::{
    CartItem, CartLineInput, ItemId, ProductId, WishlistItem, WishlistLineInput,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

/// Capability interface for one collection type.
pub trait CollectionKind: Send + Sync + 'static {
    /// Item stored in the collection.
    type Item: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync;

    /// Request line sent for `add` and for each `bulk_sync` entry.
    type Line: Clone + Debug + Serialize + Send + Sync;

    /// Resource path segment on the collection service (`/{RESOURCE}`).
    const RESOURCE: &'static str;

    /// Storage key of the guest snapshot.
    const STORAGE_KEY: &'static str;

    /// Whether a duplicate add increments quantity (cart) or is ignored
    /// (wishlist).
    const AGGREGATES_QUANTITY: bool;

    fn id(item: &Self::Item) -> &ItemId;

    fn product_id(item: &Self::Item) -> ProductId;

    /// Whether two items share the identity key.
    fn same_key(a: &Self::Item, b: &Self::Item) -> bool;

    /// Units of this line. Always 1 for collections without quantity.
    fn quantity(item: &Self::Item) -> u32;

    /// Set the units of this line. Ignored for collections without quantity.
    fn set_quantity(item: &mut Self::Item, quantity: u32);

    fn unit_price(item: &Self::Item) -> Decimal;

    /// Give a new guest item its local identity and creation stamp.
    fn prepare_guest(item: &mut Self::Item, created_at: DateTime<Utc>);

    /// Request line for `quantity` units of `item`.
    fn line(item: &Self::Item, quantity: u32) -> Self::Line;
}

/// The shopping cart.
#[derive(Debug, Clone, Copy)]
pub struct Cart;

/// The wishlist.
#[derive(Debug, Clone, Copy)]
pub struct Wishlist;

impl CollectionKind for Cart {
    type Item = CartItem;
    type Line = CartLineInput;

    const RESOURCE: &'static str = "cart";
    const STORAGE_KEY: &'static str = "guest_cart";
    const AGGREGATES_QUANTITY: bool = true;

    fn id(item: &CartItem) -> &ItemId {
        &item.id
    }

    fn product_id(item: &CartItem) -> ProductId {
        item.product_id
    }

    fn same_key(a: &CartItem, b: &CartItem) -> bool {
        a.same_line(b)
    }

    fn quantity(item: &CartItem) -> u32 {
        item.quantity
    }

    fn set_quantity(item: &mut CartItem, quantity: u32) {
        item.quantity = quantity;
    }

    fn unit_price(item: &CartItem) -> Decimal {
        item.price
    }

    fn prepare_guest(item: &mut CartItem, created_at: DateTime<Utc>) {
        item.variant = item.variant.canonical();
        let fingerprint = variant_fingerprint(&item.variant);
        item.id = ItemId::new(format!(
            "{}{}-{fingerprint}-{}",
            ItemId::GUEST_PREFIX,
            item.product_id,
            created_at.timestamp_millis()
        ));
        item.added_at.get_or_insert(created_at);
    }

    fn line(item: &CartItem, quantity: u32) -> CartLineInput {
        CartLineInput::from_item(item, quantity)
    }
}

impl CollectionKind for Wishlist {
    type Item = WishlistItem;
    type Line = WishlistLineInput;

    const RESOURCE: &'static str = "wishlist";
    const STORAGE_KEY: &'static str = "guest_wishlist";
    const AGGREGATES_QUANTITY: bool = false;

    fn id(item: &WishlistItem) -> &ItemId {
        &item.id
    }

    fn product_id(item: &WishlistItem) -> ProductId {
        item.product_id
    }

    fn same_key(a: &WishlistItem, b: &WishlistItem) -> bool {
        a.product_id == b.product_id
    }

    fn quantity(_item: &WishlistItem) -> u32 {
        1
    }

    fn set_quantity(_item: &mut WishlistItem, _quantity: u32) {}

    fn unit_price(item: &WishlistItem) -> Decimal {
        item.price
    }

    fn prepare_guest(item: &mut WishlistItem, created_at: DateTime<Utc>) {
        item.id = ItemId::new(format!(
            "{}{}-{}",
            ItemId::GUEST_PREFIX,
            item.product_id,
            created_at.timestamp_millis()
        ));
        item.added_at.get_or_insert(created_at);
    }

    fn line(item: &WishlistItem, _quantity: u32) -> WishlistLineInput {
        WishlistLineInput {
            product_id: item.product_id,
        }
    }
}

/// First 8 hex chars of the SHA-256 of the canonical variant JSON.
fn variant_fingerprint(variant: &cartsync_core::VariantSelection) -> String {
    // Serializing a struct of strings, ids and a BTreeMap cannot fail
    let canonical = serde_json::to_vec(variant).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    hex::encode(digest).chars().take(8).collect()
}
