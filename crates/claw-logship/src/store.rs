//! Traits for the remote key/value store.
//!
//! This module provides the [`StoreClient`] trait for the store operations
//! the shipper needs, and [`StoreConnector`] for building clients from
//! resolved credentials.

use crate::credentials::Credentials;
use crate::error::StoreError;
use crate::types::Item;

/// A connected client for a schema-less key/value store.
pub trait StoreClient: Send {
    /// Writes a batch of items into `collection`.
    ///
    /// Attributes are appended, never replaced, so repeated names are kept.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CollectionNotFound`] if the collection does not
    /// exist and [`StoreError::Client`] for any other failure.
    fn put_batch(&mut self, collection: &str, items: &[Item]) -> Result<(), StoreError>;

    /// Creates `collection`. Creating an existing collection succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Client`] if the store rejects the call.
    fn create_collection(&mut self, collection: &str) -> Result<(), StoreError>;

    /// Runs a select query and returns matching items.
    ///
    /// # Errors
    ///
    /// Returns an error if the query is invalid or the store fails.
    fn select(&mut self, query: &str) -> Result<Vec<Item>, StoreError>;

    /// Binds the client to `region`. Idempotent.
    fn set_region(&mut self, region: &str);

    /// Releases connections held by the client. Idempotent.
    fn shutdown(&mut self);
}

/// Builds store clients.
pub trait StoreConnector: Send + Sync {
    /// Connects to the store in `region` using `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Client`] if no client can be built.
    fn connect(
        &self,
        credentials: &Credentials,
        region: &str,
    ) -> Result<Box<dyn StoreClient>, StoreError>;
}
