// krishi-core/src/bus/mod.rs

pub mod local;
pub mod redis;

pub use local::LocalBus;
pub use redis::RedisBus;
