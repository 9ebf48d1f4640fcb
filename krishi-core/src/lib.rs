// krishi-core/src/lib.rs

pub mod bus;
pub mod calls;
pub mod connections;
pub mod db;
pub mod notifier;
pub mod presence;
pub mod relay;
pub mod repositories;

pub use db::Database;
pub use krishi_common::Error;
pub use relay::ChatRelay;
