// krishi-common/src/models/notification.rs

use serde::{Deserialize, Serialize};

/// One push notification addressed to all of a user's registered devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRequest {
    pub user_id: String,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Outcome of a push attempt. Zero registered devices is reported, not an
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Sent(usize),
    NoDevices,
}
