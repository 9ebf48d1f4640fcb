// krishi-common/src/models/mod.rs

pub mod call_request;
pub mod chat;
pub mod notification;
pub mod presence;

pub use call_request::{CallRequest, CallStatus, NewCallRequest};
pub use chat::{ChatEnvelope, ChatMessage, ChatRole, MessageBody, RelayEvent};
pub use notification::{PushOutcome, PushRequest};
pub use presence::PresenceEntry;
