// krishi-core/src/repositories/postgres/mod.rs

pub mod call_requests;
pub mod message_log;

pub use call_requests::PostgresCallRequestRepository;
pub use message_log::PostgresMessageLogRepository;
