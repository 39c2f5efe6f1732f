//! Terminal rendering of collections.

#![allow(clippy::print_stdout)]

use cartsync_core::{CartItem, CurrencyCode, Price, WishlistItem};
use rust_decimal::Decimal;

use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl Format {
    pub const fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Text }
    }
}

pub fn message(text: &str) {
    println!("{text}");
}

pub fn cart(items: &[CartItem], currency: CurrencyCode, format: Format) -> Result<(), CliError> {
    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("Cart is empty");
        return Ok(());
    }

    for item in items {
        let mut attributes = Vec::new();
        if let Some(color) = &item.variant.selected_color {
            attributes.push(color.as_str());
        }
        if let Some(size) = &item.variant.selected_size {
            attributes.push(size.as_str());
        }
        if let Some(variant) = &item.variant.selected_variant {
            attributes.push(variant.name.as_str());
        }
        let attributes = if attributes.is_empty() {
            String::new()
        } else {
            format!(" ({})", attributes.join(", "))
        };

        println!(
            "{id}  #{product} {title}{attributes}  {quantity} x {price} = {total}",
            id = item.id,
            product = item.product_id,
            title = item.title,
            quantity = item.quantity,
            price = Price::new(item.price, currency),
            total = Price::new(item.line_total(), currency),
        );
    }
    Ok(())
}

pub fn wishlist(
    items: &[WishlistItem],
    currency: CurrencyCode,
    format: Format,
) -> Result<(), CliError> {
    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("Wishlist is empty");
        return Ok(());
    }

    for item in items {
        println!(
            "{id}  #{product} {title}  {price}",
            id = item.id,
            product = item.product_id,
            title = item.title,
            price = Price::new(item.price, currency),
        );
    }
    Ok(())
}

pub fn totals(count: u64, total: Decimal, currency: CurrencyCode) {
    println!("{count} item(s), total {}", Price::new(total, currency));
}
