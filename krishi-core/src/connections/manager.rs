// krishi-core/src/connections/manager.rs

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use krishi_common::models::chat::ChatRole;

/// Frame queued for a connection's writer task. All writes to one socket go
/// through a single mpsc consumer, so frames are never interleaved even when
/// the local receive loop and the bus consumer deliver concurrently.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    Close,
}

/// Write half of one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    connection_id: Uuid,
    sender: mpsc::Sender<OutboundFrame>,
}

impl ConnectionHandle {
    pub fn new(connection_id: Uuid, sender: mpsc::Sender<OutboundFrame>) -> Self {
        Self {
            connection_id,
            sender,
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Queue a text frame. Returns false when the writer task is gone.
    pub async fn send_text(&self, text: String) -> bool {
        self.sender.send(OutboundFrame::Text(text)).await.is_ok()
    }

    async fn close(&self) {
        let _ = self.sender.send(OutboundFrame::Close).await;
    }
}

#[derive(Default)]
struct RoleSlots {
    user: Option<ConnectionHandle>,
    agent: Option<ConnectionHandle>,
}

impl RoleSlots {
    fn slot(&self, role: ChatRole) -> &Option<ConnectionHandle> {
        match role {
            ChatRole::User => &self.user,
            ChatRole::Agent => &self.agent,
        }
    }

    fn slot_mut(&mut self, role: ChatRole) -> &mut Option<ConnectionHandle> {
        match role {
            ChatRole::User => &mut self.user,
            ChatRole::Agent => &mut self.agent,
        }
    }

    fn is_empty(&self) -> bool {
        self.user.is_none() && self.agent.is_none()
    }
}

/// One conversation with at least one live local connection.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveConversation {
    pub conversation_id: String,
    pub user_connected: bool,
    pub agent_connected: bool,
}

/// In-process map of conversation id to the live connection per role.
/// Shared between every connection's lifecycle and the bus consumer task,
/// hence the concurrent map.
pub struct ConnectionManager {
    active: DashMap<String, RoleSlots>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
        }
    }

    /// Register a connection for (conversation, role). A previous connection
    /// for the same pair is told to close before the new one takes the slot.
    pub async fn register(&self, conversation_id: &str, role: ChatRole, handle: ConnectionHandle) {
        let prior = {
            let mut entry = self.active.entry(conversation_id.to_string()).or_default();
            entry.slot_mut(role).replace(handle)
        };
        if let Some(stale) = prior {
            debug!(
                "[Connections] replacing live {} connection for chat {}",
                role, conversation_id
            );
            stale.close().await;
        }
    }

    /// Remove a connection. Guarded by connection id so a stale cleanup
    /// never evicts a newer registration for the same (conversation, role).
    pub fn unregister(&self, conversation_id: &str, role: ChatRole, connection_id: Uuid) {
        if let Some(mut entry) = self.active.get_mut(conversation_id) {
            let slot = entry.slot_mut(role);
            if slot.as_ref().map(|h| h.connection_id) == Some(connection_id) {
                *slot = None;
            }
        }
        self.active
            .remove_if(conversation_id, |_, slots| slots.is_empty());
    }

    /// Deliver a text frame to the given role. Returns whether a local
    /// connection accepted it; "no peer here" is a plain `false`, not an
    /// error.
    pub async fn send_to_role(&self, conversation_id: &str, role: ChatRole, text: &str) -> bool {
        let handle = self
            .active
            .get(conversation_id)
            .and_then(|entry| entry.slot(role).clone());
        match handle {
            Some(handle) => handle.send_text(text.to_string()).await,
            None => false,
        }
    }

    /// True when either side of the conversation is connected here.
    pub fn has_conversation(&self, conversation_id: &str) -> bool {
        self.active.contains_key(conversation_id)
    }

    /// Conversations with at least one live local connection.
    pub fn list_active(&self) -> Vec<ActiveConversation> {
        self.active
            .iter()
            .map(|entry| ActiveConversation {
                conversation_id: entry.key().clone(),
                user_connected: entry.value().user.is_some(),
                agent_connected: entry.value().agent.is_some(),
            })
            .collect()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (ConnectionHandle, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(8);
        (ConnectionHandle::new(Uuid::new_v4(), tx), rx)
    }

    #[tokio::test]
    async fn register_and_deliver() {
        let manager = ConnectionManager::new();
        let (agent, mut agent_rx) = handle();
        manager.register("u1", ChatRole::Agent, agent).await;

        assert!(manager.send_to_role("u1", ChatRole::Agent, "hello").await);
        assert_eq!(
            agent_rx.recv().await,
            Some(OutboundFrame::Text("hello".into()))
        );

        // Nobody on the user side yet.
        assert!(!manager.send_to_role("u1", ChatRole::User, "hello").await);
    }

    #[tokio::test]
    async fn replacing_a_connection_closes_the_old_one() {
        let manager = ConnectionManager::new();
        let (first, mut first_rx) = handle();
        let (second, mut second_rx) = handle();
        manager.register("u1", ChatRole::User, first).await;
        manager.register("u1", ChatRole::User, second).await;

        assert_eq!(first_rx.recv().await, Some(OutboundFrame::Close));

        assert!(manager.send_to_role("u1", ChatRole::User, "hi").await);
        assert_eq!(
            second_rx.recv().await,
            Some(OutboundFrame::Text("hi".into()))
        );
    }

    #[tokio::test]
    async fn unregister_is_guarded_by_connection_id() {
        let manager = ConnectionManager::new();
        let (first, _first_rx) = handle();
        let (second, mut second_rx) = handle();
        let stale_id = first.connection_id();
        manager.register("u1", ChatRole::User, first).await;
        manager.register("u1", ChatRole::User, second).await;

        // The replaced connection's cleanup must not evict its successor.
        manager.unregister("u1", ChatRole::User, stale_id);
        assert!(manager.send_to_role("u1", ChatRole::User, "still here").await);
        assert_eq!(
            second_rx.recv().await,
            Some(OutboundFrame::Text("still here".into()))
        );
    }

    #[tokio::test]
    async fn unregister_drops_empty_conversations() {
        let manager = ConnectionManager::new();
        let (conn, _rx) = handle();
        let id = conn.connection_id();
        manager.register("u1", ChatRole::User, conn).await;
        assert!(manager.has_conversation("u1"));

        manager.unregister("u1", ChatRole::User, id);
        assert!(!manager.has_conversation("u1"));
        assert!(!manager.send_to_role("u1", ChatRole::User, "gone").await);
        assert!(manager.list_active().is_empty());
    }
}
