//! krishi-server/src/context.rs
//!
//! Builds the global context for the server: storage, bus, presence, push
//! delivery, and the relay wired on top of them.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use krishi_common::Error;
use krishi_common::traits::relay_traits::{BroadcastBus, DeviceTokenStore, PresenceStore, PushNotifier};
use krishi_common::traits::repository_traits::{CallRequestRepository, MessageLogRepository};
use krishi_core::ChatRelay;
use krishi_core::calls::CallTracker;
use krishi_core::connections::ConnectionManager;
use krishi_core::bus::{LocalBus, RedisBus};
use krishi_core::db::Database;
use krishi_core::notifier::{ExpoPushNotifier, MemoryDeviceTokenStore, RedisDeviceTokenStore};
use krishi_core::presence::{MemoryPresenceStore, RedisPresenceStore};
use krishi_core::repositories::{
    MemoryCallRequestRepository, MemoryMessageLogRepository, PostgresCallRequestRepository,
    PostgresMessageLogRepository,
};

use crate::Args;

pub struct ServerContext {
    pub relay: Arc<ChatRelay>,
    pub tokens: Arc<dyn DeviceTokenStore>,
    pub notifier: Arc<dyn PushNotifier>,
    pub idle_timeout: Duration,
}

impl ServerContext {
    pub async fn new(args: &Args) -> Result<Self, Error> {
        let db_url = args
            .db_url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok());
        let redis_url = args
            .redis_url
            .clone()
            .or_else(|| std::env::var("REDIS_URL").ok());

        let (message_log, call_repo): (
            Arc<dyn MessageLogRepository>,
            Arc<dyn CallRequestRepository>,
        ) = match db_url {
            Some(url) => {
                let db = Database::new(&url).await?;
                db.migrate().await?;
                (
                    Arc::new(PostgresMessageLogRepository::new(db.pool().clone())),
                    Arc::new(PostgresCallRequestRepository::new(db.pool().clone())),
                )
            }
            None => {
                warn!("[Context] no database URL; chat history will not survive a restart");
                (
                    Arc::new(MemoryMessageLogRepository::new()),
                    Arc::new(MemoryCallRequestRepository::new()),
                )
            }
        };

        let (bus, presence, tokens): (
            Arc<dyn BroadcastBus>,
            Arc<dyn PresenceStore>,
            Arc<dyn DeviceTokenStore>,
        ) = match redis_url {
            Some(url) => {
                let bus = RedisBus::connect(&url).await?;
                let presence = RedisPresenceStore::connect(&url).await?;
                let tokens = RedisDeviceTokenStore::connect(&url).await?;
                info!("[Context] redis backbone connected");
                (Arc::new(bus), Arc::new(presence), Arc::new(tokens))
            }
            None => {
                warn!("[Context] no redis URL; relay degrades to local-only delivery");
                (
                    Arc::new(LocalBus::new()),
                    Arc::new(MemoryPresenceStore::new()),
                    Arc::new(MemoryDeviceTokenStore::new()),
                )
            }
        };

        let notifier: Arc<dyn PushNotifier> = match &args.push_url {
            Some(url) => Arc::new(ExpoPushNotifier::with_push_url(tokens.clone(), url.clone())),
            None => Arc::new(ExpoPushNotifier::new(tokens.clone())),
        };

        let relay = Arc::new(ChatRelay::new(
            Arc::new(ConnectionManager::new()),
            presence,
            bus,
            message_log,
            Arc::new(CallTracker::new(call_repo)),
            notifier.clone(),
        ));
        info!("[Context] relay ready (process {})", relay.process_id());

        Ok(Self {
            relay,
            tokens,
            notifier,
            idle_timeout: Duration::from_secs(args.idle_timeout_secs),
        })
    }
}
