//! Concrete [`MappingStore`](crate::MappingStore) implementations.
//!
//! Contains [`MemoryMappingStore`] for statically configured entries,
//! [`SqliteMappingStore`] for a table-backed mapping and
//! [`RedisMappingStore`] (feature-gated behind `redis`) for set-based
//! lookups in Redis.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod sqlite;

pub use memory::*;
#[cfg(feature = "redis")]
pub use redis::*;
pub use sqlite::*;
