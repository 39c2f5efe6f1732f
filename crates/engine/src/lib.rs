//! cartsync - Dual-mode cart and wishlist engine.
//!
//! A shopper's cart and wishlist live in one of two places: a guest snapshot
//! in local storage while anonymous, or the remote collection service once a
//! credential is present. The engine picks the store on every call and, at
//! login, merges the guest snapshot into the authenticated collection.
//!
//! # Modules
//!
//! - [`storefront`] - Facade owning the session, both engines and the merges
//! - [`engine`] - Generic engine: mutations, view, derived aggregates
//! - [`merge`] - Merge-on-login coordinator
//! - [`backend`] - Guest and authenticated backends
//! - [`remote`] - HTTP client for the collection service
//! - [`storage`] / [`snapshot`] - Local key-value storage and guest snapshots

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod aggregates;
pub mod backend;
pub mod collection;
pub mod config;
pub mod engine;
pub mod error;
pub mod merge;
pub mod remote;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod storefront;

pub use collection::{Cart, CollectionKind, Wishlist};
pub use config::{ConfigError, SyncConfig};
pub use engine::CollectionEngine;
pub use error::{Outcome, Rejection, SyncError};
pub use merge::{MergeCoordinator, MergePolicy, MergeReport, MergeStatus};
pub use remote::{CollectionClient, RemoteError};
pub use session::{Mode, Session};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
pub use storefront::{LoginReport, Storefront};
