//! Concrete implementations of the `external` trait boundaries: an
//! in-memory store for tests and local runs, and a Redis-backed store
//! for production (spec §6 "Persisted state layout").

pub mod memory_kv;
pub mod redis_kv;

pub use memory_kv::InMemoryKvStore;
pub use redis_kv::{RedisKvStore, RedisKvStoreConfig};
