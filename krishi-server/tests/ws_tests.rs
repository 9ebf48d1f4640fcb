// krishi-server/tests/ws_tests.rs
//
// End-to-end tests over a real listener: WebSocket chat between both roles
// plus the REST routes for call requests and history.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use krishi_common::traits::relay_traits::{DeviceTokenStore, PushNotifier};
use krishi_core::ChatRelay;
use krishi_core::bus::LocalBus;
use krishi_core::calls::CallTracker;
use krishi_core::connections::ConnectionManager;
use krishi_core::notifier::{ExpoPushNotifier, MemoryDeviceTokenStore};
use krishi_core::presence::MemoryPresenceStore;
use krishi_core::repositories::{MemoryCallRequestRepository, MemoryMessageLogRepository};
use krishi_server::context::ServerContext;
use krishi_server::server::router;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

async fn spawn_server() -> SocketAddr {
    spawn_server_with_idle(Duration::from_secs(900)).await
}

async fn spawn_server_with_idle(idle_timeout: Duration) -> SocketAddr {
    let tokens: Arc<dyn DeviceTokenStore> = Arc::new(MemoryDeviceTokenStore::new());
    let notifier: Arc<dyn PushNotifier> = Arc::new(ExpoPushNotifier::new(tokens.clone()));
    let relay = Arc::new(ChatRelay::new(
        Arc::new(ConnectionManager::new()),
        Arc::new(MemoryPresenceStore::new()),
        Arc::new(LocalBus::new()),
        Arc::new(MemoryMessageLogRepository::new()),
        Arc::new(CallTracker::new(Arc::new(
            MemoryCallRequestRepository::new(),
        ))),
        notifier.clone(),
    ));
    let ctx = Arc::new(ServerContext {
        relay,
        tokens,
        notifier,
        idle_timeout,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(ctx);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, user: &str, agent: &str, role: &str) -> WsClient {
    let url = format!("ws://{addr}/chat/ws/{user}/{agent}/{role}");
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn recv_json(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let frame = timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send_json(ws: &mut WsClient, value: serde_json::Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

#[tokio::test]
async fn chat_round_trip_between_roles() {
    let addr = spawn_server().await;

    let mut user = connect(addr, "u1", "agent-1", "user").await;
    let mut agent = connect(addr, "u1", "agent-1", "agent").await;

    let user_greeting = recv_json(&mut user).await;
    assert_eq!(user_greeting["message"]["type"], "info");
    let agent_greeting = recv_json(&mut agent).await;
    assert_eq!(agent_greeting["message"]["type"], "info");

    send_json(
        &mut user,
        serde_json::json!({ "message": { "type": "chat", "text": "when to sow wheat?" } }),
    )
    .await;
    let delivered = recv_json(&mut agent).await;
    assert_eq!(delivered["message"]["text"], "when to sow wheat?");
    assert_eq!(delivered["from_role"], "user");
    assert_eq!(delivered["doc_id"], "u1");

    send_json(
        &mut agent,
        serde_json::json!({ "message": { "type": "chat", "text": "early November" } }),
    )
    .await;
    let reply = recv_json(&mut user).await;
    assert_eq!(reply["message"]["text"], "early November");
    assert_eq!(reply["from_role"], "agent");
}

#[tokio::test]
async fn idle_connections_are_closed_through_the_disconnect_path() {
    let addr = spawn_server_with_idle(Duration::from_millis(300)).await;
    let http = reqwest::Client::new();

    let mut user = connect(addr, "u1", "agent-1", "user").await;
    recv_json(&mut user).await;

    let list: serde_json::Value = http
        .get(format!("http://{addr}/chat/list"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list[0]["conversation_id"], "u1");

    // Stay silent past the idle timeout; the server closes the socket.
    let frame = timeout(RECV_TIMEOUT, user.next())
        .await
        .expect("server never closed the idle socket");
    match frame {
        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {}
        other => panic!("expected the socket to close, got {other:?}"),
    }

    // Expiry runs the normal disconnect path, so the conversation drops out
    // of the active list.
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        let list: serde_json::Value = http
            .get(format!("http://{addr}/chat/list"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if list == serde_json::json!([]) {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "idle conversation never left the active list: {list}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn unknown_roles_are_rejected_before_the_upgrade() {
    let addr = spawn_server().await;
    let url = format!("ws://{addr}/chat/ws/u1/agent-1/admin");

    match connect_async(url).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), 400);
        }
        other => panic!("expected an HTTP 400 rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn history_and_active_list_reflect_the_conversation() {
    let addr = spawn_server().await;
    let http = reqwest::Client::new();

    let mut user = connect(addr, "u1", "agent-1", "user").await;
    recv_json(&mut user).await;

    send_json(
        &mut user,
        serde_json::json!({ "message": { "type": "chat", "text": "hello" } }),
    )
    .await;

    // The socket loop processes frames in order, so one more round trip
    // guarantees the first message has been appended.
    send_json(
        &mut user,
        serde_json::json!({ "message": { "type": "chat", "text": "anyone there?" } }),
    )
    .await;

    let list: serde_json::Value = http
        .get(format!("http://{addr}/chat/list"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list[0]["conversation_id"], "u1");
    assert_eq!(list[0]["user_connected"], true);
    assert_eq!(list[0]["agent_connected"], false);

    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        let history: serde_json::Value = http
            .get(format!("http://{addr}/chat/history/u1"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if history.as_array().map(|h| h.len()) == Some(2) {
            assert_eq!(history[0]["body"]["text"], "hello");
            assert_eq!(history[1]["body"]["text"], "anyone there?");
            assert_eq!(history[0]["role"], "user");
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "history never reached 2 messages: {history}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let empty: serde_json::Value = http
        .get(format!("http://{addr}/chat/history/unknown"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(empty, serde_json::json!([]));
}

#[tokio::test]
async fn call_request_flows_from_socket_to_rest() {
    let addr = spawn_server().await;
    let http = reqwest::Client::new();

    let mut user = connect(addr, "u1", "agent-1", "user").await;
    recv_json(&mut user).await;

    send_json(
        &mut user,
        serde_json::json!({
            "message": {
                "type": "call_request",
                "text": "please call me",
                "data": {
                    "id": "cr-1",
                    "user_id": "u1",
                    "user_name": "Asha",
                    "paid": true,
                    "message": "please call me"
                }
            }
        }),
    )
    .await;

    // Wait until the record is visible.
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        let response = http
            .get(format!("http://{addr}/calls/cr-1"))
            .send()
            .await
            .unwrap();
        if response.status() == 200 {
            let record: serde_json::Value = response.json().await.unwrap();
            assert_eq!(record["status"], "requested");
            assert_eq!(record["user_name"], "Asha");
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "call request never appeared"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let fulfill = http
        .post(format!("http://{addr}/calls/cr-1/fulfill"))
        .json(&serde_json::json!({ "remarks": "advised on irrigation" }))
        .send()
        .await
        .unwrap();
    assert_eq!(fulfill.status(), 200);

    // Terminal records reject further transitions.
    let cancel = http
        .post(format!("http://{addr}/calls/cr-1/cancel"))
        .send()
        .await
        .unwrap();
    assert_eq!(cancel.status(), 409);

    let record: serde_json::Value = http
        .get(format!("http://{addr}/calls/cr-1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(record["status"], "fulfilled");
    assert_eq!(record["remarks"], "advised on irrigation");

    let missing = http
        .get(format!("http://{addr}/calls/nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}
