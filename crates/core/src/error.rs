//! Unified error types for sciops-offline.
//!
//! Display strings carry a stable `CODE: detail` prefix so hosts can match
//! on failure classes without depending on enum layout.

/// Unified error type shared by the store, the fetch client and the
/// interceptor.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One or more precache manifest resources could not be installed.
    /// Fatal to install; the worker must not activate until a retry succeeds.
    #[error("PRECACHE_FAILED: {0}")]
    PrecacheFailed(String),

    /// Transport-level fetch failure (connect, timeout, TLS).
    #[error("FETCH_FAILED: {0}")]
    Fetch(String),

    /// The opaque cache store rejected an operation.
    #[error("CACHE_ERROR: {0}")]
    Storage(String),

    /// URL could not be parsed or resolved.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),
}
