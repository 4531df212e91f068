//! WebSocket server for real-time notification pushes
//!
//! Each session is bound to the user whose token opened it and only receives
//! that user's notifications.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use crate::auth::JwtVerifier;
use crate::notification::Notification;

/// A notification addressed to one user
#[derive(Debug, Clone)]
pub struct UserPush {
    pub user_id: Uuid,
    pub notification: Notification,
}

/// WebSocket server state
#[derive(Clone)]
pub struct WsState {
    /// Broadcast channel for user pushes
    pub tx: broadcast::Sender<UserPush>,
    /// Connected clients registry
    pub clients: Arc<RwLock<HashMap<String, ClientInfo>>>,
}

/// Client connection information
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub client_id: String,
    pub user_id: Uuid,
}

/// Query string of the upgrade request
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: String,
}

/// Client message types
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    Ping,
}

/// Server message types
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ServerMessage {
    Notification { notification: Notification },
    Pong,
}

impl Default for WsState {
    fn default() -> Self {
        Self::new()
    }
}

impl WsState {
    /// Create new WebSocket state
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self {
            tx,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Push a notification to its user's open sessions, returning how many
    /// sessions it reached.
    pub async fn push(&self, notification: &Notification) -> usize {
        let sessions = self.sessions_for(notification.user_id).await;
        if sessions == 0 {
            return 0;
        }

        let push = UserPush {
            user_id: notification.user_id,
            notification: notification.clone(),
        };
        if let Err(e) = self.tx.send(push) {
            tracing::error!("Failed to push notification: {}", e);
            return 0;
        }
        sessions
    }

    /// Number of live sessions for `user_id`
    pub async fn sessions_for(&self, user_id: Uuid) -> usize {
        let clients = self.clients.read().await;
        clients.values().filter(|c| c.user_id == user_id).count()
    }

    async fn register_client(&self, client_id: String, user_id: Uuid) {
        let mut clients = self.clients.write().await;
        clients.insert(
            client_id.clone(),
            ClientInfo {
                client_id,
                user_id,
            },
        );
    }

    async fn unregister_client(&self, client_id: &str) {
        let mut clients = self.clients.write().await;
        clients.remove(client_id);
        tracing::info!("Client {} disconnected", client_id);
    }
}

/// WebSocket handler - verifies the token and upgrades the connection
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<WsState>,
    State(verifier): State<JwtVerifier>,
    Query(query): Query<WsAuthQuery>,
) -> Response {
    let identity = match verifier.verify(&query.token) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!("Rejected WebSocket upgrade: {}", e);
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, identity.user_id))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: WsState, user_id: Uuid) {
    let client_id = Uuid::new_v4().to_string();
    state.register_client(client_id.clone(), user_id).await;
    tracing::info!(client_id = %client_id, user_id = %user_id, "Client connected");

    let (mut sender, mut receiver) = socket.split();

    let (internal_tx, mut internal_rx) = mpsc::channel::<ServerMessage>(32);

    // Subscribe before the send task starts so nothing pushed after
    // registration is missed
    let mut rx = state.tx.subscribe();

    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                received = rx.recv() => {
                    let push = match received {
                        Ok(push) => push,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(user_id = %user_id, skipped, "WebSocket session lagged");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };
                    if push.user_id != user_id {
                        continue;
                    }
                    let msg = ServerMessage::Notification { notification: push.notification };
                    if let Ok(text) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                }
                Some(msg) = internal_rx.recv() => {
                    if let Ok(text) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                }
                else => break,
            }
        }
    });

    let client_id_recv = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Ok(ClientMessage::Ping) = serde_json::from_str::<ClientMessage>(&text) {
                        tracing::debug!("Ping from client {}", client_id_recv);
                        let _ = internal_tx.send(ServerMessage::Pong).await;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.unregister_client(&client_id).await;
}

// Re-export futures traits for split() and send()
use futures_util::{SinkExt, StreamExt};
