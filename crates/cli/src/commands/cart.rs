//! Cart commands.

use cartsync::Storefront;
use cartsync_core::{CartItem, ItemId, ProductId, VariantSelection};

use super::finish;
use crate::ProductArgs;
use crate::error::CliError;
use crate::output::{self, Format};

/// Build a cart item from command-line product fields.
pub fn item(product: ProductArgs, color: Option<String>, size: Option<String>) -> CartItem {
    let mut item = CartItem::new(
        ProductId::new(product.product_id),
        product.title,
        product.price,
    )
    .with_variant(VariantSelection {
        selected_color: color,
        selected_size: size,
        ..VariantSelection::default()
    });
    item.image = product.image;
    item.slug = product.slug;
    item
}

pub fn list(shop: &Storefront, format: Format) -> Result<(), CliError> {
    output::cart(&shop.cart().items(), shop.currency(), format)
}

pub async fn add(
    shop: &Storefront,
    item: CartItem,
    quantity: i64,
    format: Format,
) -> Result<(), CliError> {
    finish("cart add", shop.cart().add(item, quantity).await)?;
    list(shop, format)
}

pub async fn update(
    shop: &Storefront,
    id: &str,
    quantity: i64,
    format: Format,
) -> Result<(), CliError> {
    let outcome = shop
        .cart()
        .update_quantity(&ItemId::new(id), quantity)
        .await;
    finish("cart update", outcome)?;
    list(shop, format)
}

pub async fn remove(shop: &Storefront, id: &str, format: Format) -> Result<(), CliError> {
    finish("cart remove", shop.cart().remove(&ItemId::new(id)).await)?;
    list(shop, format)
}

pub async fn clear(shop: &Storefront, format: Format) -> Result<(), CliError> {
    finish("cart clear", shop.cart().clear().await)?;
    list(shop, format)
}

pub fn total(shop: &Storefront) {
    let cart = shop.cart();
    output::totals(cart.count(), cart.total(), shop.currency());
}
