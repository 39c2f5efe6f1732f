//! Wishlist commands.

use cartsync::Storefront;
use cartsync_core::{ItemId, ProductId, WishlistItem};

use super::finish;
use crate::ProductArgs;
use crate::error::CliError;
use crate::output::{self, Format};

pub fn item(product: ProductArgs) -> WishlistItem {
    let mut item = WishlistItem::new(
        ProductId::new(product.product_id),
        product.title,
        product.price,
    );
    item.image = product.image;
    item.slug = product.slug;
    item
}

pub fn list(shop: &Storefront, format: Format) -> Result<(), CliError> {
    output::wishlist(&shop.wishlist().items(), shop.currency(), format)
}

pub async fn add(shop: &Storefront, item: WishlistItem, format: Format) -> Result<(), CliError> {
    finish("wishlist add", shop.wishlist().add(item).await)?;
    list(shop, format)
}

pub async fn toggle(
    shop: &Storefront,
    item: WishlistItem,
    format: Format,
) -> Result<(), CliError> {
    finish("wishlist toggle", shop.wishlist().toggle(item).await)?;
    list(shop, format)
}

pub async fn remove(shop: &Storefront, id: &str, format: Format) -> Result<(), CliError> {
    finish("wishlist remove", shop.wishlist().remove(&ItemId::new(id)).await)?;
    list(shop, format)
}

pub async fn clear(shop: &Storefront, format: Format) -> Result<(), CliError> {
    finish("wishlist clear", shop.wishlist().clear().await)?;
    list(shop, format)
}
