// krishi-core/src/bus/redis.rs

use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager as RedisConnectionManager;
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use krishi_common::Error;
use krishi_common::traits::relay_traits::BroadcastBus;

const SUBSCRIBE_BUFFER: usize = 1024;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Redis pub/sub backbone. Publishing goes through a multiplexed connection
/// manager; each subscription owns a dedicated pub/sub connection driven by
/// a background task that resubscribes whenever the transport drops, so the
/// stream handed to the caller is infinite and restartable.
pub struct RedisBus {
    client: redis::Client,
    publish_conn: RedisConnectionManager,
}

impl RedisBus {
    pub fn new(client: redis::Client, publish_conn: RedisConnectionManager) -> Self {
        Self {
            client,
            publish_conn,
        }
    }

    pub async fn connect(url: &str) -> Result<Self, Error> {
        let client = redis::Client::open(url)?;
        let publish_conn = client.get_connection_manager().await?;
        Ok(Self::new(client, publish_conn))
    }
}

#[async_trait]
impl BroadcastBus for RedisBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), Error> {
        let mut conn = self.publish_conn.clone();
        let _: () = conn.publish(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>, Error> {
        let (tx, rx) = mpsc::channel(SUBSCRIBE_BUFFER);
        let client = self.client.clone();
        let channel = channel.to_string();

        tokio::spawn(async move {
            loop {
                let mut pubsub = match client.get_async_pubsub().await {
                    Ok(pubsub) => pubsub,
                    Err(e) => {
                        error!("[Bus] redis pubsub connect error: {}", e);
                        sleep(RECONNECT_DELAY).await;
                        continue;
                    }
                };
                if let Err(e) = pubsub.subscribe(&channel).await {
                    error!("[Bus] subscribe to {} failed: {}", channel, e);
                    sleep(RECONNECT_DELAY).await;
                    continue;
                }
                info!("[Bus] subscribed to {}", channel);

                let mut messages = pubsub.into_on_message();
                while let Some(msg) = messages.next().await {
                    match msg.get_payload::<String>() {
                        Ok(payload) => {
                            if tx.send(payload).await.is_err() {
                                // Subscriber dropped the stream; stop for good.
                                return;
                            }
                        }
                        Err(e) => debug!("[Bus] non-text payload on {}: {}", channel, e),
                    }
                }
                warn!("[Bus] pubsub stream for {} ended; reconnecting", channel);
                sleep(RECONNECT_DELAY).await;
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}
