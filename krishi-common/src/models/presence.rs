// krishi-common/src/models/presence.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cross-process record of one connected participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub user_id: String,
    pub connection_id: String,
    pub connected_at: DateTime<Utc>,
}
