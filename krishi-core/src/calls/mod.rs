// krishi-core/src/calls/mod.rs

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, warn};

use krishi_common::Error;
use krishi_common::models::call_request::{CallRequest, CallStatus, NewCallRequest};
use krishi_common::traits::repository_traits::CallRequestRepository;

/// Tracks the call-request workflow: `requested` moves to `fulfilled` or
/// `cancelled`, both terminal. Mutating operations report success as a bool;
/// persistence failures are logged, never propagated, so the chat socket
/// loop stays fire-and-forget.
pub struct CallTracker {
    repo: Arc<dyn CallRequestRepository>,
}

impl CallTracker {
    pub fn new(repo: Arc<dyn CallRequestRepository>) -> Self {
        Self { repo }
    }

    /// Create a new request record unconditionally. A user may have several
    /// outstanding requests; there is no duplicate suppression.
    pub async fn initiate(&self, new_request: NewCallRequest) -> bool {
        let record = new_request.into_record(Utc::now());
        match self.repo.insert(&record).await {
            Ok(()) => {
                debug!("[Calls] call request {} initiated", record.id);
                true
            }
            Err(e) => {
                error!("[Calls] failed to initiate call request {}: {:?}", record.id, e);
                false
            }
        }
    }

    pub async fn fulfill(&self, id: &str, remarks: Option<&str>) -> bool {
        match self
            .repo
            .mark_terminal(id, CallStatus::Fulfilled, remarks, Some(Utc::now()))
            .await
        {
            Ok(true) => {
                debug!("[Calls] call request {} fulfilled", id);
                true
            }
            Ok(false) => {
                warn!("[Calls] call request {} missing or already terminal", id);
                false
            }
            Err(e) => {
                error!("[Calls] failed to fulfill call request {}: {:?}", id, e);
                false
            }
        }
    }

    pub async fn cancel(&self, id: &str, remarks: Option<&str>) -> bool {
        match self
            .repo
            .mark_terminal(id, CallStatus::Cancelled, remarks, None)
            .await
        {
            Ok(true) => {
                debug!("[Calls] call request {} cancelled", id);
                true
            }
            Ok(false) => {
                warn!("[Calls] call request {} missing or already terminal", id);
                false
            }
            Err(e) => {
                error!("[Calls] failed to cancel call request {}: {:?}", id, e);
                false
            }
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<CallRequest>, Error> {
        self.repo.get(id).await
    }

    pub async fn list_all(&self) -> Result<Vec<CallRequest>, Error> {
        self.repo.list_all().await
    }
}
