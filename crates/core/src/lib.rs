//! Core types and shared functionality for sciops-offline.
//!
//! This crate provides:
//! - The namespaced cache storage abstraction and an in-memory reference store
//! - Unified error types
//! - Worker configuration with layered loading
//! - The persistence predicate for dynamically fetched resources

pub mod config;
pub mod error;
pub mod rules;
pub mod store;

pub use config::WorkerConfig;
pub use error::Error;
pub use rules::PersistRules;
pub use store::{CacheStorage, MemoryStore, Request, ResponseSnapshot};
