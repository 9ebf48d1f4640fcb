// krishi-common/src/traits/repository_traits.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::models::call_request::{CallRequest, CallStatus};
use crate::models::chat::ChatMessage;

/// Append-only per-conversation message log.
#[async_trait]
pub trait MessageLogRepository: Send + Sync {
    /// Append one message to the conversation's log.
    async fn append(&self, msg: &ChatMessage) -> Result<(), Error>;

    /// Full history for a conversation, ascending by timestamp. An unknown
    /// conversation yields an empty vec, not an error.
    async fn read_history(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, Error>;
}

#[async_trait]
pub trait CallRequestRepository: Send + Sync {
    async fn insert(&self, request: &CallRequest) -> Result<(), Error>;

    async fn get(&self, id: &str) -> Result<Option<CallRequest>, Error>;

    async fn list_all(&self) -> Result<Vec<CallRequest>, Error>;

    /// Partial update moving a request out of `requested` into a terminal
    /// status. Returns `false` when the record is missing or already
    /// terminal; terminal states are final.
    async fn mark_terminal(
        &self,
        id: &str,
        status: CallStatus,
        remarks: Option<&str>,
        fulfilled_time: Option<DateTime<Utc>>,
    ) -> Result<bool, Error>;
}
