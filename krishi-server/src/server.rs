//! krishi-server/src/server.rs
//!
//! HTTP surface: the chat WebSocket endpoint plus the REST routes for
//! history, live-conversation listing, call requests, and push devices.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

use krishi_common::Error;
use krishi_common::models::chat::ChatRole;
use krishi_common::models::notification::{PushOutcome, PushRequest};
use krishi_core::connections::{ConnectionHandle, OutboundFrame};

use crate::Args;
use crate::context::ServerContext;

const OUTBOUND_BUFFER: usize = 64;

pub async fn run_server(args: Args) -> Result<(), Error> {
    let ctx = Arc::new(ServerContext::new(&args).await?);
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(&args.bind_addr).await?;
    info!("[Server] listening on {}", args.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(ctx: Arc<ServerContext>) -> Router {
    Router::new()
        .route("/chat/ws/{user_id}/{agent_id}/{role}", get(chat_ws))
        .route("/chat/history/{conversation_id}", get(chat_history))
        .route("/chat/list", get(chat_list))
        .route("/calls", get(list_calls))
        .route("/calls/{id}", get(get_call))
        .route("/calls/{id}/fulfill", post(fulfill_call))
        .route("/calls/{id}/cancel", post(cancel_call))
        .route("/notification/register-device", post(register_device))
        .route("/notification/push", post(push_notification))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn chat_ws(
    Path((user_id, agent_id, role)): Path<(String, String, String)>,
    State(ctx): State<Arc<ServerContext>>,
    ws: WebSocketUpgrade,
) -> Response {
    // Reject unknown roles before the upgrade completes.
    let role: ChatRole = match role.parse() {
        Ok(role) => role,
        Err(_) => return (StatusCode::BAD_REQUEST, "invalid role").into_response(),
    };
    // Conversations are keyed by the user's id; the agent joins the same key.
    let conversation_id = user_id.clone();
    let (participant_id, peer_id) = match role {
        ChatRole::User => (user_id, agent_id),
        ChatRole::Agent => (agent_id, user_id),
    };
    ws.on_upgrade(move |socket| {
        handle_socket(socket, ctx, conversation_id, role, participant_id, peer_id)
    })
}

async fn handle_socket(
    socket: WebSocket,
    ctx: Arc<ServerContext>,
    conversation_id: String,
    role: ChatRole,
    participant_id: String,
    peer_id: String,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_BUFFER);
    let connection_id = Uuid::new_v4();
    let handle = ConnectionHandle::new(connection_id, tx);

    // All frames to this socket flow through one writer task, so the local
    // receive path and the bus consumer never interleave partial writes.
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                OutboundFrame::Text(text) => {
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        return;
                    }
                }
                OutboundFrame::Close => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return;
                }
            }
        }
        // Every handle is gone; close the socket cleanly.
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    ctx.relay
        .connect(&conversation_id, role, &participant_id, handle.clone())
        .await;

    // Greeting goes out only after registration, so a client that has seen
    // it is already routable.
    let greeting = json!({
        "message": {
            "type": "info",
            "text": format!("Connected as {role} for chat {conversation_id}"),
        }
    })
    .to_string();
    let _ = handle.send_text(greeting).await;

    loop {
        match timeout(ctx.idle_timeout, ws_rx.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                ctx.relay
                    .handle_inbound(&conversation_id, role, &peer_id, text.as_str())
                    .await;
            }
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
            // Pings are answered by the library; other frame types carry
            // nothing for us.
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) => {
                debug!("[Server] socket error on chat {}: {}", conversation_id, e);
                break;
            }
            Err(_) => {
                info!(
                    "[Server] closing idle {} connection for chat {}",
                    role, conversation_id
                );
                break;
            }
        }
    }

    ctx.relay
        .disconnect(&conversation_id, role, &participant_id, connection_id)
        .await;
    // Dropping the last handle ends the writer task, which sends the close
    // frame on its way out.
    drop(handle);
}

async fn chat_history(
    Path(conversation_id): Path<String>,
    State(ctx): State<Arc<ServerContext>>,
) -> Response {
    match ctx.relay.history(&conversation_id).await {
        Ok(history) => Json(history).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn chat_list(State(ctx): State<Arc<ServerContext>>) -> Response {
    Json(ctx.relay.connections().list_active()).into_response()
}

async fn list_calls(State(ctx): State<Arc<ServerContext>>) -> Response {
    match ctx.relay.calls().list_all().await {
        Ok(calls) => Json(calls).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn get_call(Path(id): Path<String>, State(ctx): State<Arc<ServerContext>>) -> Response {
    match ctx.relay.calls().get(&id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "no such call request").into_response(),
        Err(e) => internal_error(e),
    }
}

#[derive(Debug, Default, Deserialize)]
struct TerminalBody {
    remarks: Option<String>,
}

async fn fulfill_call(
    Path(id): Path<String>,
    State(ctx): State<Arc<ServerContext>>,
    body: Option<Json<TerminalBody>>,
) -> Response {
    let remarks = body.and_then(|Json(b)| b.remarks);
    if ctx.relay.calls().fulfill(&id, remarks.as_deref()).await {
        StatusCode::OK.into_response()
    } else {
        (StatusCode::CONFLICT, "call request missing or already terminal").into_response()
    }
}

async fn cancel_call(
    Path(id): Path<String>,
    State(ctx): State<Arc<ServerContext>>,
    body: Option<Json<TerminalBody>>,
) -> Response {
    let remarks = body.and_then(|Json(b)| b.remarks);
    if ctx.relay.calls().cancel(&id, remarks.as_deref()).await {
        StatusCode::OK.into_response()
    } else {
        (StatusCode::CONFLICT, "call request missing or already terminal").into_response()
    }
}

#[derive(Debug, Deserialize)]
struct RegisterDeviceBody {
    user_id: String,
    token: String,
}

async fn register_device(
    State(ctx): State<Arc<ServerContext>>,
    Json(body): Json<RegisterDeviceBody>,
) -> Response {
    match ctx.tokens.register_token(&body.user_id, &body.token).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => internal_error(e),
    }
}

async fn push_notification(
    State(ctx): State<Arc<ServerContext>>,
    Json(body): Json<PushRequest>,
) -> Response {
    match ctx.notifier.push_to_user(&body).await {
        Ok(PushOutcome::Sent(count)) => Json(json!({ "sent": count })).into_response(),
        Ok(PushOutcome::NoDevices) => Json(json!({ "sent": 0 })).into_response(),
        Err(e) => internal_error(e),
    }
}

fn internal_error(e: Error) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}
