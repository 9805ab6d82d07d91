//! Host lifecycle seam.
//!
//! The interceptor produces two signals toward its hosting environment:
//! a request for immediate activation after a successful install, and a
//! request to take over all open clients after activation. Both are
//! best-effort from the interceptor's point of view.

use async_trait::async_trait;

/// Lifecycle signals the interceptor sends to its host.
#[async_trait]
pub trait LifecycleHost: Send + Sync {
    /// Ask the host to activate this worker version immediately instead of
    /// waiting for the previous version's clients to disconnect.
    async fn skip_waiting(&self);

    /// Ask the host to route all open clients through this worker without
    /// requiring a reload.
    async fn claim_clients(&self);
}

/// Host stub for embeddings without lifecycle plumbing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHost;

#[async_trait]
impl LifecycleHost for NoopHost {
    async fn skip_waiting(&self) {}

    async fn claim_clients(&self) {}
}
