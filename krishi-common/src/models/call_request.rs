// krishi-common/src/models/call_request.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a call request. `Fulfilled` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Requested,
    Fulfilled,
    Cancelled,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Requested => "requested",
            CallStatus::Fulfilled => "fulfilled",
            CallStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, CallStatus::Requested)
    }
}

/// A user's request for a voice call, tracked independently of chat messages
/// but initiated through the chat channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRequest {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub message: String,
    pub request_time: DateTime<Utc>,
    pub status: CallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfilled_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// Fields a client supplies when initiating a call request over the chat
/// socket. The server stamps the request time and initial status.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCallRequest {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl NewCallRequest {
    pub fn into_record(self, request_time: DateTime<Utc>) -> CallRequest {
        CallRequest {
            id: self.id,
            user_id: self.user_id,
            user_name: self.user_name,
            paid: self.paid,
            agent_id: self.agent_id,
            message: self.message,
            request_time,
            status: CallStatus::Requested,
            fulfilled_time: None,
            remarks: None,
        }
    }
}
