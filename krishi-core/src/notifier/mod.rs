// krishi-core/src/notifier/mod.rs

pub mod tokens;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use krishi_common::Error;
use krishi_common::models::notification::{PushOutcome, PushRequest};
use krishi_common::traits::relay_traits::{DeviceTokenStore, PushNotifier};

pub use tokens::{MemoryDeviceTokenStore, RedisDeviceTokenStore};

pub const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

fn is_expo_token(token: &str) -> bool {
    token.starts_with("ExponentPushToken[") || token.starts_with("ExpoPushToken[")
}

/// Best-effort push delivery through the Expo push service. Looks up the
/// user's registered device tokens, batches one message per valid token, and
/// posts them in a single request.
pub struct ExpoPushNotifier {
    client: reqwest::Client,
    push_url: String,
    tokens: Arc<dyn DeviceTokenStore>,
}

impl ExpoPushNotifier {
    pub fn new(tokens: Arc<dyn DeviceTokenStore>) -> Self {
        Self::with_push_url(tokens, EXPO_PUSH_URL.to_string())
    }

    pub fn with_push_url(tokens: Arc<dyn DeviceTokenStore>, push_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            push_url,
            tokens,
        }
    }
}

#[async_trait]
impl PushNotifier for ExpoPushNotifier {
    async fn push_to_user(&self, request: &PushRequest) -> Result<PushOutcome, Error> {
        debug!("[Notifier] pushing to user {}", request.user_id);
        let tokens = self.tokens.list_tokens(&request.user_id).await?;
        if tokens.is_empty() {
            info!("[Notifier] no push tokens for user {}", request.user_id);
            return Ok(PushOutcome::NoDevices);
        }

        let mut messages = Vec::with_capacity(tokens.len());
        for token in &tokens {
            if is_expo_token(token) {
                messages.push(json!({
                    "to": token,
                    "sound": "default",
                    "title": request.title,
                    "body": request.body,
                    "data": request.data.clone().unwrap_or_else(|| json!({})),
                }));
            } else {
                warn!(
                    "[Notifier] invalid push token format for user {}: {}",
                    request.user_id, token
                );
            }
        }
        if messages.is_empty() {
            return Ok(PushOutcome::NoDevices);
        }

        let response = self
            .client
            .post(&self.push_url)
            .json(&messages)
            .send()
            .await?;
        response.error_for_status_ref()?;
        debug!(
            "[Notifier] pushed {} message(s) to user {}",
            messages.len(),
            request.user_id
        );
        Ok(PushOutcome::Sent(messages.len()))
    }
}
