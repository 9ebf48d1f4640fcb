// krishi-core/src/notifier/tokens.rs

use std::collections::BTreeSet;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use redis::aio::ConnectionManager as RedisConnectionManager;

use krishi_common::Error;
use krishi_common::traits::relay_traits::DeviceTokenStore;

fn tokens_key(user_id: &str) -> String {
    format!("expo_tokens:{user_id}")
}

/// In-process token registry for single-process deployments and tests.
pub struct MemoryDeviceTokenStore {
    tokens: DashMap<String, BTreeSet<String>>,
}

impl MemoryDeviceTokenStore {
    pub fn new() -> Self {
        Self {
            tokens: DashMap::new(),
        }
    }
}

impl Default for MemoryDeviceTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceTokenStore for MemoryDeviceTokenStore {
    async fn register_token(&self, user_id: &str, token: &str) -> Result<(), Error> {
        self.tokens
            .entry(user_id.to_string())
            .or_default()
            .insert(token.to_string());
        Ok(())
    }

    async fn list_tokens(&self, user_id: &str) -> Result<Vec<String>, Error> {
        Ok(self
            .tokens
            .get(user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }
}

/// Redis-backed token registry. A set per user deduplicates repeated
/// registrations of the same device.
pub struct RedisDeviceTokenStore {
    conn: RedisConnectionManager,
}

impl RedisDeviceTokenStore {
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
impl DeviceTokenStore for RedisDeviceTokenStore {
    async fn register_token(&self, user_id: &str, token: &str) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(tokens_key(user_id), token).await?;
        Ok(())
    }

    async fn list_tokens(&self, user_id: &str) -> Result<Vec<String>, Error> {
        let mut conn = self.conn.clone();
        let tokens: Vec<String> = conn.smembers(tokens_key(user_id)).await?;
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_registrations_are_collapsed() {
        let store = MemoryDeviceTokenStore::new();
        store.register_token("u1", "ExpoPushToken[a]").await.unwrap();
        store.register_token("u1", "ExpoPushToken[a]").await.unwrap();
        store.register_token("u1", "ExpoPushToken[b]").await.unwrap();

        let tokens = store.list_tokens("u1").await.unwrap();
        assert_eq!(tokens.len(), 2);
        assert!(store.list_tokens("u2").await.unwrap().is_empty());
    }
}
