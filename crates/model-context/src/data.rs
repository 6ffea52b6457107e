//! The live mapping of a single namespace.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use model_builder_types::{Key, Value};
use parking_lot::RwLock;

/// Id -> value mapping of one namespace, plus the ids a batch builder has
/// already been asked for.
///
/// Thread-safe via internal RwLocks. Population is insert-if-absent: once an
/// id is present its value is never replaced.
#[derive(Default)]
pub struct NamespaceData {
    entries: RwLock<HashMap<Key, Value>>,
    requested: RwLock<HashSet<Key>>,
}

impl NamespaceData {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mapping pre-populated with `entries` (first occurrence wins).
    pub fn from_entries(entries: impl IntoIterator<Item = (Key, Value)>) -> Self {
        let data = Self::new();
        data.extend(entries);
        data
    }

    // ==================== Reads ====================

    /// Get the value for `key`.
    pub fn get(&self, key: &Key) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    /// Get the value for `key` as a typed shared handle.
    ///
    /// Returns `None` when the id is absent or holds a different type.
    pub fn get_as<T: std::any::Any + Send + Sync>(&self, key: impl Into<Key>) -> Option<Arc<T>> {
        self.get(&key.into()).and_then(|v| v.downcast::<T>())
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &Key) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Whether `key` is present or was already requested from a builder.
    pub fn is_known(&self, key: &Key) -> bool {
        self.contains(key) || self.is_requested(key)
    }

    /// All present ids.
    pub fn keys(&self) -> Vec<Key> {
        self.entries.read().keys().cloned().collect()
    }

    /// All present values.
    pub fn values(&self) -> Vec<Value> {
        self.entries.read().values().cloned().collect()
    }

    /// Number of present ids.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no id is present.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copy of the current mapping.
    pub fn snapshot(&self) -> HashMap<Key, Value> {
        self.entries.read().clone()
    }

    // ==================== Writes ====================

    /// Insert `value` under `key` unless the id is already present.
    ///
    /// Returns whether the value was inserted.
    pub fn insert(&self, key: Key, value: Value) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, value);
        true
    }

    /// Insert every absent entry. Returns how many were inserted.
    pub fn extend(&self, items: impl IntoIterator<Item = (Key, Value)>) -> usize {
        self.extend_new(items).len()
    }

    /// Insert every absent entry, returning the values that were inserted.
    pub fn extend_new(&self, items: impl IntoIterator<Item = (Key, Value)>) -> Vec<Value> {
        let mut entries = self.entries.write();
        let mut inserted = Vec::new();
        for (key, value) in items {
            if let std::collections::hash_map::Entry::Vacant(slot) = entries.entry(key) {
                inserted.push(value.clone());
                slot.insert(value);
            }
        }
        inserted
    }

    // ==================== Requested ledger ====================

    /// Whether a builder was already asked for `key`.
    pub fn is_requested(&self, key: &Key) -> bool {
        self.requested.read().contains(key)
    }

    /// Record that a builder was asked for `keys`.
    pub fn mark_requested(&self, keys: impl IntoIterator<Item = Key>) {
        self.requested.write().extend(keys);
    }

    /// Ids a builder was asked for (whether or not it returned them).
    pub fn requested(&self) -> Vec<Key> {
        self.requested.read().iter().cloned().collect()
    }
}

impl fmt::Debug for NamespaceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceData")
            .field("entries", &self.len())
            .field("requested", &self.requested.read().len())
            .finish()
    }
}
