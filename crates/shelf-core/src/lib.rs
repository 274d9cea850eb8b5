//! shelf-core - Core library for Shelf
//!
//! This crate contains the product model, the local libSQL store, the remote
//! `/api/products` client, and the two data collections used by the Shelf
//! interfaces: a remote-query cache and an offline-first replicated store.

pub mod collection;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod replication;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

pub use collection::{Inventory, MutationHandle, ProductCollection, SyncMode};
pub use error::{Error, Result};
pub use models::{NewProduct, Product, ProductId, SyncConflict};
