// krishi-core/src/repositories/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use krishi_common::Error;
use krishi_common::models::call_request::{CallRequest, CallStatus};
use krishi_common::models::chat::ChatMessage;
use krishi_common::traits::repository_traits::{CallRequestRepository, MessageLogRepository};

/// In-memory message log for single-process deployments and tests. History
/// does not survive a restart.
pub struct MemoryMessageLogRepository {
    logs: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl MemoryMessageLogRepository {
    pub fn new() -> Self {
        Self {
            logs: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryMessageLogRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageLogRepository for MemoryMessageLogRepository {
    async fn append(&self, msg: &ChatMessage) -> Result<(), Error> {
        let mut logs = self.logs.lock().await;
        logs.entry(msg.conversation_id.clone())
            .or_default()
            .push(msg.clone());
        Ok(())
    }

    async fn read_history(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, Error> {
        let logs = self.logs.lock().await;
        let mut history = logs.get(conversation_id).cloned().unwrap_or_default();
        history.sort_by_key(|m| m.timestamp);
        Ok(history)
    }
}

pub struct MemoryCallRequestRepository {
    records: Mutex<HashMap<String, CallRequest>>,
}

impl MemoryCallRequestRepository {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCallRequestRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallRequestRepository for MemoryCallRequestRepository {
    async fn insert(&self, request: &CallRequest) -> Result<(), Error> {
        let mut records = self.records.lock().await;
        records.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<CallRequest>, Error> {
        let records = self.records.lock().await;
        Ok(records.get(id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<CallRequest>, Error> {
        let records = self.records.lock().await;
        let mut all: Vec<CallRequest> = records.values().cloned().collect();
        all.sort_by(|a, b| b.request_time.cmp(&a.request_time));
        Ok(all)
    }

    async fn mark_terminal(
        &self,
        id: &str,
        status: CallStatus,
        remarks: Option<&str>,
        fulfilled_time: Option<DateTime<Utc>>,
    ) -> Result<bool, Error> {
        let mut records = self.records.lock().await;
        match records.get_mut(id) {
            Some(record) if record.status == CallStatus::Requested => {
                record.status = status;
                record.remarks = remarks.map(str::to_string);
                record.fulfilled_time = fulfilled_time;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
