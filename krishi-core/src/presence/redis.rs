// krishi-core/src/presence/redis.rs

use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager as RedisConnectionManager;

use krishi_common::Error;
use krishi_common::traits::relay_traits::PresenceStore;

const USERS_KEY: &str = "ws:users";

/// Crash backstop: there is no heartbeat, so an ungraceful disconnect leaves
/// its entry behind until this TTL or the user's next reconnect.
const PRESENCE_TTL_SECS: i64 = 86_400;

fn user_key(user_id: &str) -> String {
    format!("ws:user:{user_id}")
}

fn socket_key(connection_id: &str) -> String {
    format!("ws:socket:{connection_id}")
}

/// Redis-backed presence registry shared by all server processes. Keeps a
/// set of connected user ids plus a hash per user and per connection for
/// reverse lookups.
pub struct RedisPresenceStore {
    conn: RedisConnectionManager,
}

impl RedisPresenceStore {
    pub fn new(conn: RedisConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(url: &str) -> Result<Self, Error> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl PresenceStore for RedisPresenceStore {
    async fn add_connected(&self, user_id: &str, connection_id: &str) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let connected_at = Utc::now().timestamp().to_string();
        let user_key = user_key(user_id);
        let socket_key = socket_key(connection_id);

        let _: () = conn.sadd(USERS_KEY, user_id).await?;
        let _: () = conn
            .hset_multiple(
                &user_key,
                &[
                    ("connection_id", connection_id),
                    ("connected_at", connected_at.as_str()),
                ],
            )
            .await?;
        let _: () = conn
            .hset_multiple(
                &socket_key,
                &[
                    ("user_id", user_id),
                    ("connected_at", connected_at.as_str()),
                ],
            )
            .await?;
        let _: () = conn.expire(&user_key, PRESENCE_TTL_SECS).await?;
        let _: () = conn.expire(&socket_key, PRESENCE_TTL_SECS).await?;
        Ok(())
    }

    async fn remove_connected(&self, user_id: &str, connection_id: &str) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let _: () = conn.srem(USERS_KEY, user_id).await?;
        let _: () = conn.del(user_key(user_id)).await?;
        let _: () = conn.del(socket_key(connection_id)).await?;
        Ok(())
    }

    async fn list_connected(&self) -> Result<Vec<String>, Error> {
        let mut conn = self.conn.clone();
        let users: Vec<String> = conn.smembers(USERS_KEY).await?;
        Ok(users)
    }
}
