//! Namespaced opaque cache storage.
//!
//! The host environment owns storage semantics; this module only defines
//! the surface the interceptor talks to, plus an in-memory reference store
//! for tests and embedded hosts.

pub mod memory;
pub mod snapshot;

use async_trait::async_trait;

use crate::Error;

pub use memory::MemoryStore;
pub use snapshot::{Request, ResponseSnapshot};

/// Opaque namespaced key-value cache supplied by the host.
///
/// A namespace is a versioned logical store; entries map a request URL to
/// a stored response snapshot. Implementations must be safe for concurrent
/// readers and writers; no locking is performed by callers.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a namespace, creating it if absent.
    async fn open(&self, namespace: &str) -> Result<(), Error>;

    /// Look up a stored snapshot.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<ResponseSnapshot>, Error>;

    /// Store a snapshot, replacing any existing entry wholesale.
    async fn put(
        &self,
        namespace: &str,
        key: &str,
        snapshot: ResponseSnapshot,
    ) -> Result<(), Error>;

    /// Enumerate every namespace currently present.
    async fn namespaces(&self) -> Result<Vec<String>, Error>;

    /// Delete a whole namespace with all its entries.
    ///
    /// Returns whether the namespace existed. Individual entries are never
    /// deleted; purging happens at namespace granularity only.
    async fn delete_namespace(&self, namespace: &str) -> Result<bool, Error>;
}
