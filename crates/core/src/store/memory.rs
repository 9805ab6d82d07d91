//! In-memory reference store.
//!
//! Backs the `CacheStorage` trait with a HashMap behind a tokio RwLock.
//! No durability and no eviction; suitable for tests and embedded hosts
//! that accept process-lifetime caching.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheStorage, ResponseSnapshot};
use crate::Error;

type Namespaces = HashMap<String, HashMap<String, ResponseSnapshot>>;

/// In-memory `CacheStorage` implementation.
///
/// Clone is cheap; all clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    namespaces: Arc<RwLock<Namespaces>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a namespace, 0 if it does not exist.
    pub async fn entry_count(&self, namespace: &str) -> usize {
        let namespaces = self.namespaces.read().await;
        namespaces.get(namespace).map(HashMap::len).unwrap_or(0)
    }
}

#[async_trait]
impl CacheStorage for MemoryStore {
    async fn open(&self, namespace: &str) -> Result<(), Error> {
        let mut namespaces = self.namespaces.write().await;
        namespaces.entry(namespace.to_string()).or_default();
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<ResponseSnapshot>, Error> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).and_then(|entries| entries.get(key)).cloned())
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        snapshot: ResponseSnapshot,
    ) -> Result<(), Error> {
        let mut namespaces = self.namespaces.write().await;
        // Writes into an unopened namespace create it, matching host caches
        // that open-on-write.
        namespaces.entry(namespace.to_string()).or_default().insert(key.to_string(), snapshot);
        Ok(())
    }

    async fn namespaces(&self) -> Result<Vec<String>, Error> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.keys().cloned().collect())
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool, Error> {
        let mut namespaces = self.namespaces.write().await;
        Ok(namespaces.remove(namespace).is_some())
    }
}
