//! Offline-caching request interceptor for sciops-offline.
//!
//! This crate provides the HTTP fetch pipeline, the host lifecycle seam,
//! and the Request Interceptor that serves a web document set cache-first
//! with selective persistence of remote resources.

pub mod fetch;
pub mod host;
pub mod interceptor;

pub use fetch::{FetchClient, FetchConfig, FetchResponse, Fetcher};
pub use host::{LifecycleHost, NoopHost};
pub use interceptor::{InterceptOutcome, RequestInterceptor, offline_placeholder};
