// krishi-core/src/repositories/mod.rs

pub mod memory;
pub mod postgres;

pub use memory::{MemoryCallRequestRepository, MemoryMessageLogRepository};
pub use postgres::{PostgresCallRequestRepository, PostgresMessageLogRepository};
