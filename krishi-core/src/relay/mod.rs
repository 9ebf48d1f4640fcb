// krishi-core/src/relay/mod.rs
//
// The chat session protocol: accepts role-tagged connections for a
// conversation, exchanges JSON frames with the correct peer regardless of
// which process the peer is attached to, and records every message in the
// durable log. Delivery is at-most-once and best-effort: persistence and
// fan-out are independent, and the sender never receives an ack.

pub mod wire;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use serde_json::json;
use tokio::time::{Duration, sleep};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use krishi_common::Error;
use krishi_common::models::chat::{ChatEnvelope, ChatMessage, ChatRole, RelayEvent};
use krishi_common::models::notification::PushRequest;
use krishi_common::traits::relay_traits::{BroadcastBus, PresenceStore, PushNotifier};
use krishi_common::traits::repository_traits::MessageLogRepository;

use crate::calls::CallTracker;
use crate::connections::{ConnectionHandle, ConnectionManager};

/// Channel every process publishes undeliverable messages on. Scoped per
/// process, not per conversation, to bound the subscription count.
pub const RELAY_CHANNEL: &str = "chat:relay";

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

pub struct ChatRelay {
    connections: Arc<ConnectionManager>,
    presence: Arc<dyn PresenceStore>,
    bus: Arc<dyn BroadcastBus>,
    message_log: Arc<dyn MessageLogRepository>,
    calls: Arc<CallTracker>,
    notifier: Arc<dyn PushNotifier>,
    process_id: Uuid,
    consumer_started: AtomicBool,
}

impl ChatRelay {
    pub fn new(
        connections: Arc<ConnectionManager>,
        presence: Arc<dyn PresenceStore>,
        bus: Arc<dyn BroadcastBus>,
        message_log: Arc<dyn MessageLogRepository>,
        calls: Arc<CallTracker>,
        notifier: Arc<dyn PushNotifier>,
    ) -> Self {
        Self {
            connections,
            presence,
            bus,
            message_log,
            calls,
            notifier,
            process_id: Uuid::new_v4(),
            consumer_started: AtomicBool::new(false),
        }
    }

    pub fn process_id(&self) -> Uuid {
        self.process_id
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    pub fn calls(&self) -> &Arc<CallTracker> {
        &self.calls
    }

    /// Register a connection for (conversation, role), publish its presence
    /// entry, and make sure this process consumes the relay channel. The
    /// first connection starts the process-wide consumer task; its
    /// subscription is established before this call returns.
    pub async fn connect(
        self: &Arc<Self>,
        conversation_id: &str,
        role: ChatRole,
        participant_id: &str,
        handle: ConnectionHandle,
    ) {
        let connection_id = handle.connection_id();
        self.connections.register(conversation_id, role, handle).await;
        info!(
            "[Relay] {} connected to chat {} (connection {})",
            role, conversation_id, connection_id
        );

        if let Err(e) = self
            .presence
            .add_connected(participant_id, &connection_id.to_string())
            .await
        {
            warn!("[Relay] presence add failed for {}: {:?}", participant_id, e);
        }

        if !self.consumer_started.swap(true, Ordering::SeqCst) {
            let initial = match self.bus.subscribe(RELAY_CHANNEL).await {
                Ok(stream) => Some(stream),
                Err(e) => {
                    error!("[Relay] initial bus subscribe failed: {:?}", e);
                    None
                }
            };
            let relay = Arc::clone(self);
            tokio::spawn(async move {
                relay.run_consumer(initial).await;
            });
        }
    }

    /// Tear down a connection. The local entry goes immediately; presence
    /// removal is best-effort and failures are swallowed, so a crashed
    /// cleanup leaves a stale entry until the participant reconnects.
    pub async fn disconnect(
        &self,
        conversation_id: &str,
        role: ChatRole,
        participant_id: &str,
        connection_id: Uuid,
    ) {
        self.connections
            .unregister(conversation_id, role, connection_id);
        if let Err(e) = self
            .presence
            .remove_connected(participant_id, &connection_id.to_string())
            .await
        {
            warn!(
                "[Relay] presence remove failed for {}: {:?}",
                participant_id, e
            );
        }
        debug!("[Relay] {} ({}) disconnected", role, conversation_id);
    }

    /// Process one inbound frame from a connected client. Fire-and-forget
    /// from the sender's point of view: malformed frames are dropped, and
    /// persistence or delivery failures are logged, never surfaced.
    pub async fn handle_inbound(
        &self,
        conversation_id: &str,
        role: ChatRole,
        peer_id: &str,
        raw: &str,
    ) {
        let envelope = match wire::parse_inbound(raw, role, conversation_id) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(
                    "[Relay] dropping frame without payload on chat {}: {}",
                    conversation_id, e
                );
                return;
            }
        };

        if envelope.message.kind == wire::CALL_REQUEST_KIND {
            self.forward_call_request(conversation_id, &envelope).await;
        }

        // Durable append. Failures are logged, not retried, and never block
        // delivery.
        let record = ChatMessage {
            conversation_id: conversation_id.to_string(),
            role,
            body: serde_json::to_value(&envelope.message).unwrap_or(serde_json::Value::Null),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.message_log.append(&record).await {
            error!("[Relay] append failed for chat {}: {:?}", conversation_id, e);
        }

        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(e) => {
                error!("[Relay] envelope serialization failed: {}", e);
                return;
            }
        };
        let receiver = role.opposite();
        if self
            .connections
            .send_to_role(conversation_id, receiver, &text)
            .await
        {
            return;
        }

        // Peer is not on this process. Hand the message to the other
        // processes and nudge the receiver's devices.
        let event = RelayEvent {
            conversation_id: conversation_id.to_string(),
            origin_role: role,
            origin_process: self.process_id,
            envelope: envelope.clone(),
        };
        match serde_json::to_string(&event) {
            Ok(payload) => {
                if let Err(e) = self.bus.publish(RELAY_CHANNEL, &payload).await {
                    warn!("[Relay] publish failed for chat {}: {:?}", conversation_id, e);
                }
            }
            Err(e) => error!("[Relay] relay event serialization failed: {}", e),
        }
        self.notify_peer(conversation_id, role, peer_id, &envelope)
            .await;
    }

    /// Full history readback, ascending by timestamp.
    pub async fn history(&self, conversation_id: &str) -> Result<Vec<ChatMessage>, Error> {
        self.message_log.read_history(conversation_id).await
    }

    async fn forward_call_request(&self, conversation_id: &str, envelope: &ChatEnvelope) {
        let data = envelope
            .message
            .data
            .clone()
            .unwrap_or(serde_json::Value::Null);
        let new_request = match serde_json::from_value(data) {
            Ok(request) => request,
            Err(e) => {
                warn!(
                    "[Relay] call request with bad fields on chat {}: {}",
                    conversation_id, e
                );
                return;
            }
        };
        if !self.calls.initiate(new_request).await {
            warn!(
                "[Relay] call request on chat {} was not persisted",
                conversation_id
            );
        }
    }

    async fn notify_peer(
        &self,
        conversation_id: &str,
        sender: ChatRole,
        peer_id: &str,
        envelope: &ChatEnvelope,
    ) {
        let Some(text) = envelope.message.text.clone() else {
            return;
        };
        let (title, data) = match sender {
            ChatRole::User => (
                format!("New Message ({conversation_id})"),
                json!({ "href": format!("/chat/agentChatDetail?id={conversation_id}") }),
            ),
            ChatRole::Agent => ("New Message (Advisor)".to_string(), json!({ "href": "/chat" })),
        };
        let request = PushRequest {
            user_id: peer_id.to_string(),
            title,
            body: text,
            data: Some(data),
        };
        if let Err(e) = self.notifier.push_to_user(&request).await {
            warn!("[Relay] push to {} failed: {:?}", peer_id, e);
        }
    }

    /// Long-lived consumer for remote-origin messages. One per process;
    /// resubscribes whenever the stream ends.
    async fn run_consumer(&self, initial: Option<BoxStream<'static, String>>) {
        let mut next = initial;
        loop {
            let mut stream = match next.take() {
                Some(stream) => stream,
                None => match self.bus.subscribe(RELAY_CHANNEL).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        error!("[Relay] bus subscribe failed: {:?}", e);
                        sleep(RESUBSCRIBE_DELAY).await;
                        continue;
                    }
                },
            };
            info!("[Relay] consuming {}", RELAY_CHANNEL);
            while let Some(payload) = stream.next().await {
                self.handle_bus_payload(&payload).await;
            }
            warn!("[Relay] relay stream ended; resubscribing");
            sleep(RESUBSCRIBE_DELAY).await;
        }
    }

    async fn handle_bus_payload(&self, payload: &str) {
        let event: RelayEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => {
                debug!("[Relay] ignoring malformed bus payload: {}", e);
                return;
            }
        };
        // Our own publish; local delivery was already attempted here.
        if event.origin_process == self.process_id {
            return;
        }
        // Redundant attempts are harmless, but skip conversations with no
        // local connection at all.
        if !self.connections.has_conversation(&event.conversation_id) {
            return;
        }

        let receiver = event.origin_role.opposite();
        let text = match serde_json::to_string(&event.envelope) {
            Ok(text) => text,
            Err(_) => return,
        };
        let delivered = self
            .connections
            .send_to_role(&event.conversation_id, receiver, &text)
            .await;
        debug!(
            "[Relay] remote {} message for chat {} delivered={}",
            event.origin_role, event.conversation_id, delivered
        );
    }
}
