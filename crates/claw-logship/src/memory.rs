//! In-memory store backend.
//!
//! [`MemoryStore`] keeps collections in process and hands out clients via
//! [`MemoryConnector`]. It mirrors the remote store's observable behavior:
//! writes to unknown collections fail with
//! [`StoreError::CollectionNotFound`], attributes accumulate per item id,
//! and batches are capped at [`MAX_ITEMS_PER_BATCH`]. Faults can be injected
//! to exercise retry paths.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;

use crate::credentials::Credentials;
use crate::error::StoreError;
use crate::store::{StoreClient, StoreConnector};
use crate::types::{Item, MAX_ITEMS_PER_BATCH};

const SELECT_PATTERN: &str =
    r"(?i)^\s*select\s+\*\s+from\s+`([^`]+)`(?:\s+where\s+(\w+)\s*=\s*'((?:[^']|'')*)')?\s*$";

/// Number of calls observed by a [`MemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// Successful and failed `connect` calls
    pub connects: u64,
    /// `put_batch` calls
    pub put_batches: u64,
    /// `create_collection` calls
    pub creates: u64,
    /// `select` calls
    pub selects: u64,
    /// `set_region` calls
    pub region_binds: u64,
    /// `shutdown` calls
    pub shutdowns: u64,
}

#[derive(Debug, Default)]
struct Faults {
    failing_puts: bool,
    next_puts: u32,
    next_creates: u32,
    next_connects: u32,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<String, Vec<Item>>,
    /// Collection names in creation order
    order: Vec<String>,
    faults: Faults,
    calls: CallCounts,
}

impl MemoryState {
    fn ensure_collection(&mut self, name: &str) {
        if !self.collections.contains_key(name) {
            self.collections.insert(name.to_string(), Vec::new());
            self.order.push(name.to_string());
        }
    }
}

/// Shared in-memory store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a connector producing clients for this store.
    #[must_use]
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            store: self.clone(),
        }
    }

    /// Creates a collection directly, bypassing faults and counters.
    pub fn create_collection(&self, name: &str) {
        self.state.lock().ensure_collection(name);
    }

    /// Removes a collection and its items.
    pub fn delete_collection(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        state.order.retain(|n| n != name);
        state.collections.remove(name).is_some()
    }

    /// Collection names in creation order.
    #[must_use]
    pub fn collections(&self) -> Vec<String> {
        self.state.lock().order.clone()
    }

    /// Items stored in `collection`, in first-write order.
    #[must_use]
    pub fn items(&self, collection: &str) -> Vec<Item> {
        self.state
            .lock()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of stored items across all collections.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.state
            .lock()
            .collections
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Calls observed so far.
    #[must_use]
    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }

    /// Makes the next `n` writes fail with a client error.
    pub fn fail_next_puts(&self, n: u32) {
        self.state.lock().faults.next_puts = n;
    }

    /// Makes every write fail with a client error until turned off.
    pub fn fail_puts(&self, failing: bool) {
        self.state.lock().faults.failing_puts = failing;
    }

    /// Makes the next `n` collection creations fail.
    pub fn fail_next_creates(&self, n: u32) {
        self.state.lock().faults.next_creates = n;
    }

    /// Makes the next `n` connections fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.state.lock().faults.next_connects = n;
    }
}

/// Builds [`MemoryClient`]s bound to one [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    store: MemoryStore,
}

impl StoreConnector for MemoryConnector {
    fn connect(
        &self,
        credentials: &Credentials,
        region: &str,
    ) -> Result<Box<dyn StoreClient>, StoreError> {
        {
            let mut state = self.store.state.lock();
            state.calls.connects += 1;
            if take_fault(&mut state.faults.next_connects) {
                return Err(StoreError::Client("connection refused".to_string()));
            }
        }
        tracing::debug!(
            access_key_id = %credentials.access_key_id,
            region,
            "memory store client connected"
        );
        Ok(Box::new(MemoryClient {
            store: self.store.clone(),
            region: region.to_string(),
            shut_down: false,
        }))
    }
}

/// A client handle onto a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryClient {
    store: MemoryStore,
    region: String,
    shut_down: bool,
}

impl MemoryClient {
    /// Region the client is bound to.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.shut_down {
            return Err(StoreError::Client("client has been shut down".to_string()));
        }
        Ok(())
    }
}

impl StoreClient for MemoryClient {
    fn put_batch(&mut self, collection: &str, items: &[Item]) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut state = self.store.state.lock();
        state.calls.put_batches += 1;

        if state.faults.failing_puts || take_fault(&mut state.faults.next_puts) {
            return Err(StoreError::Client("service unavailable".to_string()));
        }
        if items.len() > MAX_ITEMS_PER_BATCH {
            return Err(StoreError::Client(format!(
                "too many items in batch: {} > {MAX_ITEMS_PER_BATCH}",
                items.len()
            )));
        }

        let stored = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        for item in items {
            let index = match stored.iter().position(|s| s.item_id == item.item_id) {
                Some(index) => index,
                None => {
                    stored.push(Item {
                        item_id: item.item_id.clone(),
                        attributes: Vec::new(),
                    });
                    stored.len() - 1
                }
            };
            let entry = &mut stored[index];
            for attr in &item.attributes {
                if attr.replace {
                    entry.attributes.retain(|a| a.name != attr.name);
                }
                entry.attributes.push(attr.clone());
            }
        }
        Ok(())
    }

    fn create_collection(&mut self, collection: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut state = self.store.state.lock();
        state.calls.creates += 1;
        if take_fault(&mut state.faults.next_creates) {
            return Err(StoreError::Client(format!(
                "failed to create collection {collection}"
            )));
        }
        state.ensure_collection(collection);
        Ok(())
    }

    fn select(&mut self, query: &str) -> Result<Vec<Item>, StoreError> {
        self.ensure_open()?;
        let pattern =
            Regex::new(SELECT_PATTERN).map_err(|e| StoreError::Client(e.to_string()))?;
        let captures = pattern
            .captures(query)
            .ok_or_else(|| StoreError::Client(format!("invalid query: {query}")))?;

        let collection = &captures[1];
        let condition = captures
            .get(2)
            .zip(captures.get(3))
            .map(|(name, value)| (name.as_str(), value.as_str().replace("''", "'")));

        let mut state = self.store.state.lock();
        state.calls.selects += 1;
        let stored = state
            .collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        Ok(stored
            .iter()
            .filter(|item| match &condition {
                Some((name, value)) => item
                    .attributes
                    .iter()
                    .any(|a| a.name == *name && a.value == *value),
                None => true,
            })
            .cloned()
            .collect())
    }

    fn set_region(&mut self, region: &str) {
        self.store.state.lock().calls.region_binds += 1;
        region.clone_into(&mut self.region);
    }

    fn shutdown(&mut self) {
        if !self.shut_down {
            self.shut_down = true;
            self.store.state.lock().calls.shutdowns += 1;
        }
    }
}

fn take_fault(remaining: &mut u32) -> bool {
    if *remaining == 0 {
        return false;
    }
    *remaining -= 1;
    true
}
