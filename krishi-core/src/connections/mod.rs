// krishi-core/src/connections/mod.rs

pub mod manager;

pub use manager::{ActiveConversation, ConnectionHandle, ConnectionManager, OutboundFrame};
