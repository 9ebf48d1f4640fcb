// krishi-common/src/traits/mod.rs

pub mod relay_traits;
pub mod repository_traits;

pub use relay_traits::{BroadcastBus, DeviceTokenStore, PresenceStore, PushNotifier};
pub use repository_traits::{CallRequestRepository, MessageLogRepository};
