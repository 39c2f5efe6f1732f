//! Core types for cartsync.
//!
//! This module provides type-safe wrappers for cart and wishlist concepts.

pub mod id;
pub mod item;
pub mod price;

pub use id::*;
pub use item::{
    CartItem, CartLineInput, SelectedVariant, VariantSelection, WishlistItem, WishlistLineInput,
};
pub use price::{CurrencyCode, ParseCurrencyError, Price};
