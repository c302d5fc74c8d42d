use std::collections::HashMap;

use tracing::{debug, info};

use crate::{KeySchema, LookupFuture, MappingEntryConfig, MappingKey, MappingStore};

/// In-memory mapping store backed by a `HashMap`.
///
/// Useful for statically configured deployments and for testing.
#[derive(Debug, Clone, Default)]
pub struct MemoryMappingStore {
    entries: HashMap<MappingKey, Vec<String>>,
}

impl MemoryMappingStore {
    /// Creates a new empty [`MemoryMappingStore`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from configured entries, keyed according to `schema`.
    pub fn from_entries(schema: KeySchema, entries: &[MappingEntryConfig]) -> Self {
        let mut store = Self::new();
        for entry in entries {
            store.insert(
                schema.key(&entry.local_part, &entry.domain),
                entry.destinations.clone(),
            );
        }
        info!(entries = store.len(), "Memory mapping store initialized");
        store
    }

    /// Inserts (or replaces) the entry stored under `key`.
    pub fn insert(&mut self, key: MappingKey, destinations: Vec<String>) {
        self.entries.insert(key, destinations);
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with_entry(mut self, key: MappingKey, destinations: &[&str]) -> Self {
        self.insert(key, destinations.iter().map(|d| d.to_string()).collect());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MappingStore for MemoryMappingStore {
    fn get<'a>(&'a self, key: &'a MappingKey) -> LookupFuture<'a> {
        Box::pin(async move {
            let entry = self.entries.get(key).cloned();
            debug!(key = %key, hit = entry.is_some(), "Memory mapping lookup");
            Ok(entry)
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
