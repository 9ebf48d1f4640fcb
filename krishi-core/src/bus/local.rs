// krishi-core/src/bus/local.rs

use async_trait::async_trait;
use dashmap::DashMap;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use krishi_common::Error;
use krishi_common::traits::relay_traits::BroadcastBus;

const CHANNEL_CAPACITY: usize = 1024;

/// In-process bus backed by tokio broadcast channels, one per channel name.
/// Used when no cross-process backbone is configured: the relay degrades to
/// local-only delivery, and tests get a deterministic bus.
pub struct LocalBus {
    channels: DashMap<String, broadcast::Sender<String>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BroadcastBus for LocalBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), Error> {
        // A send error just means nobody is subscribed right now.
        let _ = self.sender(channel).send(payload.to_string());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>, Error> {
        let rx = self.sender(channel).subscribe();
        let channel = channel.to_string();
        let stream = BroadcastStream::new(rx).filter_map(move |item| {
            let channel = channel.clone();
            async move {
                match item {
                    Ok(payload) => Some(payload),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!("[Bus] local subscriber on {} lagged by {}", channel, skipped);
                        None
                    }
                }
            }
        });
        Ok(stream.boxed())
    }
}
