//! In-memory storage backend using `DashMap`

use dashmap::DashMap;

use crate::store::StorageBackend;
use crate::Result;

/// Volatile storage backend: one `DashMap` per collection, created lazily.
///
/// Suitable for tests and for embedding the engine where durability is
/// handled elsewhere. Reads and writes never block each other across
/// collections; within a collection, `DashMap` shards the locking.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: DashMap<String, DashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Create a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held in a collection.
    #[must_use]
    pub fn count(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |c| c.len())
    }

    /// Drop every collection.
    pub fn clear(&self) {
        self.collections.clear();
    }
}

impl StorageBackend for MemoryBackend {
    async fn put(&self, collection: &str, key: &str, value: Vec<u8>) -> Result<()> {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|c| c.get(key).map(|v| v.value().clone())))
    }

    async fn scan_all(&self, collection: &str) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self.collections.get(collection).map_or_else(Vec::new, |c| {
            c.iter()
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect()
        }))
    }
}
