//! WebSocket transport for the control channel.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use seedreel_core::SessionManager;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connection::Connection;
use super::messages::ServerMessage;
use crate::server::AppState;

/// Outbound messages buffered per connection before telemetry is dropped.
const OUTBOUND_CAPACITY: usize = 64;

/// `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_socket(socket, state.manager))
}

/// Drives one client until it goes away, then releases its session.
pub async fn run_socket(socket: WebSocket, manager: Arc<SessionManager>) {
    info!("Client connected");
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode server message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut connection = Connection::new(manager, outbound_tx);
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => connection.handle_text(text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
        }
    }

    connection.close().await;
    // A joined session may still publish through this connection's sink.
    writer.abort();
    info!("Client disconnected");
}
