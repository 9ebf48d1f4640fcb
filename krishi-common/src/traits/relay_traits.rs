// krishi-common/src/traits/relay_traits.rs

use async_trait::async_trait;
use futures_core::stream::BoxStream;

use crate::error::Error;
use crate::models::notification::{PushOutcome, PushRequest};

/// Cross-process table of which participant is connected via which
/// transport connection. Remotely hosted in production; every call is a
/// fallible network operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PresenceStore: Send + Sync {
    async fn add_connected(&self, user_id: &str, connection_id: &str) -> Result<(), Error>;
    async fn remove_connected(&self, user_id: &str, connection_id: &str) -> Result<(), Error>;
    async fn list_connected(&self) -> Result<Vec<String>, Error>;
}

/// Publish/subscribe channel used to reach connections held by other
/// processes.
#[async_trait]
pub trait BroadcastBus: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), Error>;

    /// Lazy, infinite stream of payloads on a channel. Implementations
    /// resubscribe internally when the underlying transport drops.
    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>, Error>;
}

/// Per-user set of registered device push tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceTokenStore: Send + Sync {
    async fn register_token(&self, user_id: &str, token: &str) -> Result<(), Error>;
    async fn list_tokens(&self, user_id: &str) -> Result<Vec<String>, Error>;
}

/// Fire-and-forget push delivery to all of a user's devices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn push_to_user(&self, request: &PushRequest) -> Result<PushOutcome, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_notifier_reports_no_devices() {
        let mut notifier = MockPushNotifier::new();
        notifier
            .expect_push_to_user()
            .returning(|_| Ok(PushOutcome::NoDevices));

        let request = PushRequest {
            user_id: "u1".into(),
            title: "New Message".into(),
            body: "hello".into(),
            data: None,
        };
        assert_eq!(
            notifier.push_to_user(&request).await.unwrap(),
            PushOutcome::NoDevices
        );
    }
}
