//! services/api/src/web/ws_handler.rs
//!
//! The WebSocket endpoint. Each connection receives the workflow state on
//! connect, then every store notice followed by a fresh state frame.

use crate::web::{protocol::{ClientMessage, ServerMessage}, state::AppState};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::StreamExt, SinkExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established");
    let (mut sender, mut receiver) = socket.split();
    let mut notices = app_state.notifier.subscribe();

    let snapshot = app_state.store.snapshot().await;
    if send(&mut sender, &ServerMessage::state_of(&snapshot)).await.is_err() {
        error!("Failed to send initial state.");
        return;
    }

    loop {
        tokio::select! {
            notice = notices.recv() => {
                let notice = match notice {
                    Ok(notice) => notice,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "WebSocket client fell behind, notices dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let msg = ServerMessage::Notice { level: notice.level, message: notice.message };
                if send(&mut sender, &msg).await.is_err() {
                    break;
                }
                let snapshot = app_state.store.snapshot().await;
                if send(&mut sender, &ServerMessage::state_of(&snapshot)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                let reply = match incoming {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::RefreshState) => {
                            ServerMessage::state_of(&app_state.store.snapshot().await)
                        }
                        Err(e) => {
                            debug!("Unrecognised client message: {}", e);
                            ServerMessage::Error { message: format!("Unrecognised message: {}", e) }
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {}", e);
                        break;
                    }
                };
                if send(&mut sender, &reply).await.is_err() {
                    break;
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

async fn send<S>(sender: &mut S, msg: &ServerMessage) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let json = serde_json::to_string(msg).map_err(|e| error!("Failed to encode message: {}", e))?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| debug!("Client went away while sending"))
}
