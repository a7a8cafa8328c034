//! Job record store.
//!
//! This crate provides:
//! - The [`JobStore`] trait every request handler reads and writes through
//! - Atomic, monotonic status transitions and finalization leases
//! - A bounded in-memory store for single-instance deployments
//! - A Redis store with optimistic-concurrency writes for multi-instance deployments

pub mod config;
pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use config::{connect, StoreBackend, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryJobStore;
pub use redis_store::RedisJobStore;
pub use store::{Claim, JobStore, LeaseToken, Transition};
