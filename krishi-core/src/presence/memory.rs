// krishi-core/src/presence/memory.rs

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use krishi_common::Error;
use krishi_common::models::presence::PresenceEntry;
use krishi_common::traits::relay_traits::PresenceStore;

/// In-process presence table. Single-process deployments and tests only; a
/// multi-instance deployment needs the redis-backed store.
pub struct MemoryPresenceStore {
    users: DashMap<String, PresenceEntry>,
    sockets: DashMap<String, String>,
}

impl MemoryPresenceStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            sockets: DashMap::new(),
        }
    }

    pub fn entry_for(&self, user_id: &str) -> Option<PresenceEntry> {
        self.users.get(user_id).map(|e| e.clone())
    }
}

impl Default for MemoryPresenceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn add_connected(&self, user_id: &str, connection_id: &str) -> Result<(), Error> {
        self.users.insert(
            user_id.to_string(),
            PresenceEntry {
                user_id: user_id.to_string(),
                connection_id: connection_id.to_string(),
                connected_at: Utc::now(),
            },
        );
        self.sockets
            .insert(connection_id.to_string(), user_id.to_string());
        Ok(())
    }

    async fn remove_connected(&self, user_id: &str, connection_id: &str) -> Result<(), Error> {
        // Only clear the user entry while it still points at this
        // connection; a replacement may have raced ahead of this cleanup.
        self.users
            .remove_if(user_id, |_, entry| entry.connection_id == connection_id);
        self.sockets.remove(connection_id);
        Ok(())
    }

    async fn list_connected(&self) -> Result<Vec<String>, Error> {
        Ok(self.users.iter().map(|e| e.key().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_remove() {
        let store = MemoryPresenceStore::new();
        store.add_connected("u1", "c1").await.unwrap();
        assert_eq!(store.list_connected().await.unwrap(), vec!["u1".to_string()]);

        store.remove_connected("u1", "c1").await.unwrap();
        assert!(store.list_connected().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_cleanup_does_not_evict_replacement() {
        let store = MemoryPresenceStore::new();
        store.add_connected("u1", "c1").await.unwrap();
        store.add_connected("u1", "c2").await.unwrap();

        // The old connection disconnects after the user already reconnected.
        store.remove_connected("u1", "c1").await.unwrap();
        assert_eq!(store.list_connected().await.unwrap(), vec!["u1".to_string()]);
        assert_eq!(store.entry_for("u1").unwrap().connection_id, "c2");
    }
}
