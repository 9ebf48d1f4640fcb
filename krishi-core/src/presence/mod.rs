// krishi-core/src/presence/mod.rs

pub mod memory;
pub mod redis;

pub use memory::MemoryPresenceStore;
pub use redis::RedisPresenceStore;
