//! cartsync core - Shared types library.
//!
//! This crate provides the item shapes used by every cartsync component:
//! - `cartsync` - Dual-mode cart and wishlist engine
//! - `cartsync-cli` - Command-line driver for the engine
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, and cart/wishlist item shapes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
